//! Lazy dataset handles
//!
//! A [`LazyDataset`] binds the slice translator to a storage location
//! and defers all data I/O until a region is requested. The handle is
//! immutable after construction and safe to share across threads. The
//! saver counterpart [`LazyWriter`] adds a one-time `initialize` step
//! that creates the physical node.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use dataslice_core::{shape, translate, CoreError, DataType, DslcHeader, ProgressMonitor, SliceSpec};

use crate::array::{DynamicArray, RealizedDataset};
use crate::cache::{CacheKey, ResultCache};
use crate::error::{DatasetError, Result};
use crate::storage::{realized_shape, DslcFile, DslcFileMut};

fn slice_context(slice: &SliceSpec) -> String {
    format!(
        "start {:?} step {:?} count {:?}",
        slice.start(),
        slice.step(),
        slice.count()
    )
}

/// The local host name, when the environment records one
fn local_host() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}

/// Lazy handle to an on-disk dataset.
///
/// Owns the physical shape and element description read from the file
/// header at construction time; the logical shape presented to
/// consumers may differ from the physical one by unit axes only.
#[derive(Debug, Clone)]
pub struct LazyDataset {
    name: String,
    location: PathBuf,
    dataset_path: String,
    physical_shape: Vec<usize>,
    logical_shape: Vec<usize>,
    data_type: DataType,
    multiplicity: usize,
    extend_unsigned: bool,
    host: Option<String>,
}

impl LazyDataset {
    /// Build a handle from an opened file and an internal path
    pub(crate) fn from_dslc(file: &DslcFile, dataset_path: String, name: String) -> Self {
        let physical_shape = file.shape();
        LazyDataset {
            name,
            location: file.path().to_path_buf(),
            dataset_path,
            logical_shape: physical_shape.clone(),
            physical_shape,
            data_type: file.data_type(),
            multiplicity: file.header().item_multiplicity as usize,
            extend_unsigned: file.header().extend_unsigned(),
            host: None,
        }
    }

    /// Open a dataset file and build a lazy handle for its array.
    ///
    /// Only the header is read; data stays on disk until a slice is
    /// requested. The dataset name defaults to the file stem.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = DslcFile::open(path)?;
        let name = file
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        let dataset_path = format!("/{name}");
        Ok(Self::from_dslc(&file, dataset_path, name))
    }

    /// Rename the dataset
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bind the handle to a host; `is_readable` then only holds on that
    /// host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Present the dataset with all unit axes removed
    pub fn squeezed(mut self) -> Self {
        self.logical_shape = shape::squeeze(&self.physical_shape);
        self
    }

    /// Present the dataset under a different logical shape.
    ///
    /// The shape may only differ from the physical one in the position
    /// or presence of unit axes.
    pub fn with_logical_shape(mut self, logical: Vec<usize>) -> Result<Self> {
        if !shape::non_unit_matches(&logical, &self.physical_shape) {
            return Err(CoreError::ShapeMismatch.into());
        }
        self.logical_shape = logical;
        Ok(self)
    }

    /// The dataset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage location of the dataset
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Internal path of the array within the storage location
    pub fn dataset_path(&self) -> &str {
        &self.dataset_path
    }

    /// The immutable on-disk shape
    pub fn physical_shape(&self) -> &[usize] {
        &self.physical_shape
    }

    /// The shape presented to consumers
    pub fn logical_shape(&self) -> &[usize] {
        &self.logical_shape
    }

    /// Element type of the stored data
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Values per element, for compound/complex elements
    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    /// Whether the storage location can currently be read from this
    /// process; never errors.
    pub fn is_readable(&self) -> bool {
        if let (Some(host), Some(local)) = (&self.host, local_host()) {
            if *host != local {
                return false;
            }
        }
        self.location.is_file()
    }

    /// Read a slice of the logical view.
    ///
    /// Translates the request onto the physical shape, performs the
    /// physical read, and reshapes the result back to the logical
    /// request shape with the dataset name attached.
    pub fn read_slice(&self, slice: &SliceSpec) -> Result<RealizedDataset> {
        self.read_impl(slice, None)
    }

    /// As [`read_slice`](Self::read_slice), consulting the monitor
    /// between work units and failing with `Cancelled` when asked to
    /// stop
    pub fn read_slice_monitored(
        &self,
        slice: &SliceSpec,
        monitor: &dyn ProgressMonitor,
    ) -> Result<RealizedDataset> {
        self.read_impl(slice, Some(monitor))
    }

    /// Read the whole logical view
    pub fn read_all(&self) -> Result<RealizedDataset> {
        self.read_slice(&SliceSpec::full(&self.logical_shape))
    }

    /// Read the whole logical view through the result cache.
    ///
    /// Concurrent callers for the same dataset share one underlying
    /// read; retention follows the cache's configured policy.
    pub fn read_all_cached(
        &self,
        cache: &ResultCache<RealizedDataset>,
    ) -> Result<Arc<RealizedDataset>> {
        let key = CacheKey::new(self.location.display().to_string(), self.dataset_path.clone());
        cache.get_or_load(&key, || self.read_all())
    }

    fn read_impl(
        &self,
        slice: &SliceSpec,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> Result<RealizedDataset> {
        self.try_read(slice, monitor).map_err(|e| match e {
            DatasetError::Cancelled => DatasetError::Cancelled,
            other => DatasetError::Read {
                location: self.location.display().to_string(),
                path: self.dataset_path.clone(),
                slice: slice_context(slice),
                source: Box::new(other),
            },
        })
    }

    fn try_read(
        &self,
        slice: &SliceSpec,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> Result<RealizedDataset> {
        if slice.source() != self.logical_shape {
            return Err(CoreError::ShapeMismatch.into());
        }
        let physical = translate(slice, &self.physical_shape)?;
        let file = DslcFile::open(&self.location)?;
        if file.shape() != self.physical_shape || file.data_type() != self.data_type {
            return Err(DatasetError::format(
                &self.location,
                "file no longer matches the handle's shape or type",
            ));
        }
        let arr = file.read_slice(&physical, monitor)?;
        let logical = realized_shape(slice.count(), self.multiplicity);
        let mut arr = arr.into_shape(&logical)?;
        if self.extend_unsigned {
            arr = arr.extend_unsigned();
        }
        Ok(RealizedDataset::new(self.name.clone(), arr))
    }
}

/// Saver handle that creates and fills a physical dataset node.
///
/// `initialize` runs at most once per node; `write_slice` initializes
/// implicitly. Concurrent `initialize`/`write_slice` calls targeting the
/// same node require external serialization by the caller.
#[derive(Debug)]
pub struct LazyWriter {
    location: PathBuf,
    dataset_path: String,
    name: String,
    physical_shape: Vec<usize>,
    logical_shape: Vec<usize>,
    data_type: DataType,
    multiplicity: usize,
    fill: Option<f64>,
    initialized: AtomicBool,
}

impl LazyWriter {
    /// Describe a dataset node to be created at `location`
    pub fn new<P: AsRef<Path>>(
        location: P,
        dataset_path: impl Into<String>,
        shape: Vec<usize>,
        data_type: DataType,
    ) -> Self {
        let dataset_path = dataset_path.into();
        let name = dataset_path.trim_start_matches('/').to_string();
        LazyWriter {
            location: location.as_ref().to_path_buf(),
            dataset_path,
            name,
            logical_shape: shape.clone(),
            physical_shape: shape,
            data_type,
            multiplicity: 1,
            fill: None,
            initialized: AtomicBool::new(false),
        }
    }

    /// Set the fill value written when the node is created
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Set the values-per-element multiplicity of the node
    pub fn with_multiplicity(mut self, multiplicity: usize) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Accept slices against a different logical shape, differing from
    /// the physical one by unit axes only
    pub fn with_logical_shape(mut self, logical: Vec<usize>) -> Result<Self> {
        if !shape::non_unit_matches(&logical, &self.physical_shape) {
            return Err(CoreError::ShapeMismatch.into());
        }
        self.logical_shape = logical;
        Ok(self)
    }

    /// Storage location of the node
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Internal path of the node
    pub fn dataset_path(&self) -> &str {
        &self.dataset_path
    }

    /// Whether the storage location can be created or modified
    pub fn is_writable(&self) -> bool {
        if self.location.exists() {
            return std::fs::metadata(&self.location)
                .map(|m| !m.permissions().readonly())
                .unwrap_or(false);
        }
        self.location
            .parent()
            .map(|parent| parent.is_dir())
            .unwrap_or(false)
    }

    /// Create the physical node exactly once.
    ///
    /// A second call, or a call against an already matching node, is a
    /// no-op. A failed create leaves no node behind.
    pub fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.location.is_file() {
            // Another handle (or an earlier run) already created the
            // node; accept it if it matches the description.
            let existing = DslcFile::open(&self.location)?;
            if existing.shape() != self.physical_shape
                || existing.data_type() != self.data_type
                || existing.header().item_multiplicity as usize != self.multiplicity
            {
                return Err(DatasetError::format(
                    &self.location,
                    "existing node does not match the writer's description",
                ));
            }
            self.initialized.store(true, Ordering::Release);
            return Ok(());
        }

        let dims: Vec<u64> = self.physical_shape.iter().map(|&d| d as u64).collect();
        let header = DslcHeader::with_shape(self.data_type, &dims, self.multiplicity as u32)?;
        DslcFile::create(&self.location, &header, self.fill)?;
        debug!(
            path = %self.location.display(),
            dataset = %self.dataset_path,
            "initialized dataset node"
        );
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Write `data` into the region addressed by a logical slice,
    /// creating the node first if needed.
    ///
    /// `data`'s shape must equal the slice's realized shape.
    pub fn write_slice(&self, slice: &SliceSpec, data: &DynamicArray) -> Result<()> {
        self.initialize()?;
        self.try_write(slice, data).map_err(|e| DatasetError::Write {
            location: self.location.display().to_string(),
            path: self.dataset_path.clone(),
            slice: slice_context(slice),
            source: Box::new(e),
        })
    }

    fn try_write(&self, slice: &SliceSpec, data: &DynamicArray) -> Result<()> {
        if slice.source() != self.logical_shape {
            return Err(CoreError::ShapeMismatch.into());
        }
        if data.shape() != realized_shape(slice.count(), self.multiplicity) {
            return Err(CoreError::ShapeMismatch.into());
        }
        let physical = translate(slice, &self.physical_shape)?;
        let mut file = DslcFileMut::open(&self.location)?;
        file.write_slice(&physical, data)
    }

    /// A lazy read handle for the node; the node must exist
    pub fn to_dataset(&self) -> Result<LazyDataset> {
        let file = DslcFile::open(&self.location)?;
        let handle = LazyDataset::from_dslc(&file, self.dataset_path.clone(), self.name.clone());
        handle.with_logical_shape(self.logical_shape.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FlagMonitor;
    use ndarray::{ArrayD, IxDyn};

    fn counted(shape: &[usize]) -> DynamicArray {
        let total: usize = shape.iter().product();
        DynamicArray::from(
            ArrayD::from_shape_vec(IxDyn(shape), (0..total as i32).collect()).unwrap(),
        )
    }

    #[test]
    fn test_lazy_read_through_squeezed_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.dslc");

        let writer = LazyWriter::new(&path, "/frames", vec![1, 4, 4], DataType::I32);
        writer
            .write_slice(&SliceSpec::full(&[1, 4, 4]), &counted(&[1, 4, 4]))
            .unwrap();

        let ds = LazyDataset::from_file(&path).unwrap().squeezed();
        assert_eq!(ds.physical_shape(), &[1, 4, 4]);
        assert_eq!(ds.logical_shape(), &[4, 4]);

        // rows 1..3 of the squeezed view
        let slice = SliceSpec::new(&[4, 4], vec![1, 0], vec![1, 1], vec![2, 4]).unwrap();
        let out = ds.read_slice(&slice).unwrap();
        assert_eq!(out.name(), "frames");
        assert_eq!(out.shape(), &[2, 4]);
        assert_eq!(out.data().get_f64(&[0, 0]), Some(4.0));
        assert_eq!(out.data().get_f64(&[1, 3]), Some(11.0));
    }

    #[test]
    fn test_extended_logical_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.dslc");

        let writer = LazyWriter::new(&path, "/line", vec![6], DataType::F64);
        writer
            .write_slice(
                &SliceSpec::full(&[6]),
                &DynamicArray::from(
                    ArrayD::from_shape_vec(IxDyn(&[6]), (0..6).map(f64::from).collect()).unwrap(),
                ),
            )
            .unwrap();

        let ds = LazyDataset::from_file(&path)
            .unwrap()
            .with_logical_shape(vec![1, 6])
            .unwrap();
        let slice = SliceSpec::new(&[1, 6], vec![0, 2], vec![1, 1], vec![1, 3]).unwrap();
        let out = ds.read_slice(&slice).unwrap();
        assert_eq!(out.shape(), &[1, 3]);
        assert_eq!(out.data().get_f64(&[0, 0]), Some(2.0));
    }

    #[test]
    fn test_write_through_squeezed_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.dslc");

        // node stored as [1, 3, 4], addressed by writers as [3, 4]
        let writer = LazyWriter::new(&path, "/stack", vec![1, 3, 4], DataType::I32)
            .with_logical_shape(vec![3, 4])
            .unwrap();
        let slice = SliceSpec::new(&[3, 4], vec![1, 0], vec![1, 1], vec![2, 4]).unwrap();
        writer.write_slice(&slice, &counted(&[2, 4])).unwrap();

        let ds = writer.to_dataset().unwrap();
        assert_eq!(ds.logical_shape(), &[3, 4]);
        let out = ds.read_all().unwrap();
        assert_eq!(out.shape(), &[3, 4]);
        // untouched first row keeps the zero fill
        assert_eq!(out.data().get_f64(&[0, 0]), Some(0.0));
        assert_eq!(out.data().get_f64(&[1, 1]), Some(1.0));
        assert_eq!(out.data().get_f64(&[2, 3]), Some(7.0));
    }

    #[test]
    fn test_mismatched_logical_shape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.dslc");
        let writer = LazyWriter::new(&path, "/line", vec![6], DataType::F64);
        writer.initialize().unwrap();

        let ds = LazyDataset::from_file(&path).unwrap();
        assert!(ds.with_logical_shape(vec![3, 2]).is_err());
    }

    #[test]
    fn test_is_readable_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.dslc");
        let writer = LazyWriter::new(&path, "/absent", vec![2], DataType::U8);
        writer.initialize().unwrap();
        let ds = LazyDataset::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!ds.is_readable());
    }

    #[test]
    fn test_is_readable_wrong_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bound.dslc");
        let writer = LazyWriter::new(&path, "/bound", vec![2], DataType::U8);
        writer.initialize().unwrap();
        let ds = LazyDataset::from_file(&path)
            .unwrap()
            .with_host("nonexistent-host-for-test");
        if local_host().is_some() {
            assert!(!ds.is_readable());
        } else {
            // no local identity recorded: the check cannot fail the handle
            assert!(ds.is_readable());
        }
    }

    #[test]
    fn test_initialize_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("once.dslc");
        let writer = LazyWriter::new(&path, "/once", vec![4], DataType::F32);
        writer.initialize().unwrap();
        writer.initialize().unwrap();

        // a fresh handle against the same node also accepts it
        let again = LazyWriter::new(&path, "/once", vec![4], DataType::F32);
        again.initialize().unwrap();

        let ds = LazyDataset::from_file(&path).unwrap();
        assert_eq!(ds.physical_shape(), &[4]);
    }

    #[test]
    fn test_initialize_conflicting_node_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflict.dslc");
        LazyWriter::new(&path, "/a", vec![4], DataType::F32)
            .initialize()
            .unwrap();
        let other = LazyWriter::new(&path, "/a", vec![5], DataType::F32);
        assert!(other.initialize().is_err());
    }

    #[test]
    fn test_write_shape_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strict.dslc");
        let writer = LazyWriter::new(&path, "/strict", vec![4, 4], DataType::I32);
        let slice = SliceSpec::new(&[4, 4], vec![0, 0], vec![1, 1], vec![2, 2]).unwrap();
        let err = writer.write_slice(&slice, &counted(&[2, 3])).unwrap_err();
        assert!(matches!(err, DatasetError::Write { .. }));
    }

    #[test]
    fn test_cancelled_read_reported_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.dslc");
        let writer = LazyWriter::new(&path, "/big", vec![8, 8], DataType::I32);
        writer
            .write_slice(&SliceSpec::full(&[8, 8]), &counted(&[8, 8]))
            .unwrap();

        let monitor = FlagMonitor::new();
        monitor.cancel();
        let ds = LazyDataset::from_file(&path).unwrap();
        let err = ds
            .read_slice_monitored(&SliceSpec::full(&[8, 8]), &monitor)
            .unwrap_err();
        assert!(matches!(err, DatasetError::Cancelled));
    }

    #[test]
    fn test_read_error_carries_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.dslc");
        let writer = LazyWriter::new(&path, "/gone", vec![3], DataType::U8);
        writer.initialize().unwrap();
        let ds = LazyDataset::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = ds.read_all().unwrap_err();
        match err {
            DatasetError::Read { path, slice, .. } => {
                assert_eq!(path, "/gone");
                assert!(slice.contains("count [3]"));
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_unsigned_extension_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.dslc");
        let mut header = DslcHeader::with_shape(DataType::I16, &[2], 1).unwrap();
        header.flags |= dataslice_core::format::flags::EXTEND_UNSIGNED;
        DslcFile::create(&path, &header, None).unwrap();
        let mut file = DslcFileMut::open(&path).unwrap();
        file.write_slice(
            &SliceSpec::full(&[2]),
            &DynamicArray::from(
                ArrayD::from_shape_vec(IxDyn(&[2]), vec![-1i16, 100]).unwrap(),
            ),
        )
        .unwrap();

        let ds = LazyDataset::from_file(&path).unwrap();
        let out = ds.read_all().unwrap();
        assert_eq!(out.data_type(), DataType::U16);
        assert_eq!(out.data().get_f64(&[0]), Some(65535.0));
        assert_eq!(out.data().get_f64(&[1]), Some(100.0));
    }
}
