//! Memory-mapped storage backend for native `.dslc` dataset files
//!
//! A file is a fixed [`DslcHeader`] followed by row-major little-endian
//! element data. Reads go through a read-only memory mapping with the
//! header and data bounds validated up front; writes go through plain
//! file I/O so a reader never observes a partially remapped file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use memmap2::{Mmap, MmapOptions};
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, trace};

use dataslice_core::{shape, CoreError, DataType, DslcHeader, ProgressMonitor, SliceSpec};

use crate::array::DynamicArray;
use crate::error::{DatasetError, Result};

/// Write buffer size for zero/fill initialization
const FILL_CHUNK: usize = 64 * 1024;

/// Row-major strides in element-value units; the innermost stride is the
/// item multiplicity so compound elements stay contiguous.
fn element_strides(dims: &[usize], multiplicity: usize) -> Result<Vec<usize>> {
    let mut strides = vec![0usize; dims.len()];
    let mut acc = multiplicity;
    for axis in (0..dims.len()).rev() {
        strides[axis] = acc;
        acc = acc.checked_mul(dims[axis]).ok_or(CoreError::SizeOverflow)?;
    }
    Ok(strides)
}

/// Gather the elements addressed by a physical slice into a flat vector
/// in row-major request order.
///
/// The monitor, when present, is consulted before every contiguous run
/// and credited one work unit per completed run.
fn gather<T: Pod + Copy>(
    data: &[T],
    dims: &[usize],
    multiplicity: usize,
    slice: &SliceSpec,
    monitor: Option<&dyn ProgressMonitor>,
) -> Result<Vec<T>> {
    let strides = element_strides(dims, multiplicity)?;
    let start = slice.start();
    let step = slice.step();
    let count = slice.count();
    let rank = dims.len();

    let total = shape::element_count(count)?
        .checked_mul(multiplicity)
        .ok_or(CoreError::SizeOverflow)?;
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return Ok(out);
    }

    if rank == 0 {
        out.extend_from_slice(&data[..multiplicity]);
        return Ok(out);
    }

    let mut base = 0usize;
    for axis in 0..rank {
        base += start[axis] * strides[axis];
    }

    let outer: usize = count[..rank - 1].iter().product();
    let inner = count[rank - 1];
    let inner_step = step[rank - 1];
    let run = inner * multiplicity;

    let mut odometer = vec![0usize; rank - 1];
    for _ in 0..outer {
        if let Some(monitor) = monitor {
            if monitor.is_cancelled() {
                return Err(DatasetError::Cancelled);
            }
        }
        let mut offset = base;
        for axis in 0..rank - 1 {
            offset += odometer[axis] * step[axis] * strides[axis];
        }
        if inner_step == 1 {
            out.extend_from_slice(&data[offset..offset + run]);
        } else {
            for j in 0..inner {
                let at = offset + j * inner_step * multiplicity;
                out.extend_from_slice(&data[at..at + multiplicity]);
            }
        }
        if let Some(monitor) = monitor {
            monitor.work(1);
        }
        for axis in (0..rank - 1).rev() {
            odometer[axis] += 1;
            if odometer[axis] < count[axis] {
                break;
            }
            odometer[axis] = 0;
        }
    }
    Ok(out)
}

/// Scatter a flat row-major vector into the file positions addressed by
/// a physical slice. The inverse of [`gather`], through plain file I/O.
fn scatter<T: Pod + Copy>(
    file: &mut File,
    location: &Path,
    data_offset: u64,
    dims: &[usize],
    multiplicity: usize,
    slice: &SliceSpec,
    src: &[T],
) -> Result<()> {
    let strides = element_strides(dims, multiplicity)?;
    let start = slice.start();
    let step = slice.step();
    let count = slice.count();
    let rank = dims.len();
    let elem_size = std::mem::size_of::<T>() as u64;

    let seek_write = |file: &mut File, elem_at: usize, values: &[T]| -> Result<()> {
        file.seek(SeekFrom::Start(data_offset + elem_at as u64 * elem_size))
            .map_err(|e| DatasetError::io(location, e))?;
        file.write_all(bytemuck::cast_slice(values))
            .map_err(|e| DatasetError::io(location, e))
    };

    if rank == 0 {
        return seek_write(file, 0, &src[..multiplicity]);
    }

    let mut base = 0usize;
    for axis in 0..rank {
        base += start[axis] * strides[axis];
    }

    let outer: usize = count[..rank - 1].iter().product();
    let inner = count[rank - 1];
    let inner_step = step[rank - 1];
    let run = inner * multiplicity;
    if outer == 0 || run == 0 {
        return Ok(());
    }

    let mut pos = 0usize;
    let mut odometer = vec![0usize; rank - 1];
    for _ in 0..outer {
        let mut offset = base;
        for axis in 0..rank - 1 {
            offset += odometer[axis] * step[axis] * strides[axis];
        }
        if inner_step == 1 {
            seek_write(file, offset, &src[pos..pos + run])?;
            pos += run;
        } else {
            for j in 0..inner {
                let at = offset + j * inner_step * multiplicity;
                seek_write(file, at, &src[pos..pos + multiplicity])?;
                pos += multiplicity;
            }
        }
        for axis in (0..rank - 1).rev() {
            odometer[axis] += 1;
            if odometer[axis] < count[axis] {
                break;
            }
            odometer[axis] = 0;
        }
    }
    Ok(())
}

/// The shape a realized slice takes: the slice counts plus, for compound
/// elements, a trailing axis of the item multiplicity.
pub(crate) fn realized_shape(count: &[usize], multiplicity: usize) -> Vec<usize> {
    let mut result = count.to_vec();
    if multiplicity > 1 {
        result.push(multiplicity);
    }
    result
}

/// Read-only memory-mapped dataset file
pub struct DslcFile {
    path: PathBuf,
    mmap: Mmap,
    header: DslcHeader,
    data_type: DataType,
}

impl DslcFile {
    /// Open and validate a dataset file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| DatasetError::io(&path, e))?;

        // SAFETY: read-only mapping; writers go through DslcFileMut and
        // callers of both are documented to serialize externally
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| DatasetError::io(&path, e))?;

        if mmap.len() < DslcHeader::SIZE {
            return Err(DatasetError::format(&path, "file too small for header"));
        }
        let header = DslcHeader::from_bytes(&mmap[..DslcHeader::SIZE])
            .map_err(|e| DatasetError::format(&path, e.to_string()))?;
        let data_type = header
            .element_type()
            .map_err(|e| DatasetError::format(&path, e.to_string()))?;

        let data_end = header
            .data_offset
            .checked_add(header.data_size)
            .ok_or_else(|| DatasetError::format(&path, "data section size overflow"))?;
        if data_end > mmap.len() as u64 {
            return Err(DatasetError::format(&path, "data section extends beyond file"));
        }

        debug!(
            path = %path.display(),
            dtype = %data_type,
            rank = header.rank,
            "opened dataset file"
        );
        Ok(DslcFile {
            path,
            mmap,
            header,
            data_type,
        })
    }

    /// The validated file header
    pub fn header(&self) -> &DslcHeader {
        &self.header
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical shape recorded in the header
    pub fn shape(&self) -> Vec<usize> {
        self.header.shape()
    }

    /// Element type recorded in the header
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    fn data_bytes(&self) -> &[u8] {
        let start = self.header.data_offset as usize;
        let end = start + self.header.data_size as usize;
        &self.mmap[start..end]
    }

    /// Read the elements addressed by a physical slice.
    ///
    /// The slice must have been computed against this file's physical
    /// shape; the realized array takes the slice's result shape, plus a
    /// trailing multiplicity axis for compound elements.
    pub fn read_slice(
        &self,
        slice: &SliceSpec,
        monitor: Option<&dyn ProgressMonitor>,
    ) -> Result<DynamicArray> {
        let dims = self.shape();
        if slice.source() != dims {
            return Err(CoreError::ShapeMismatch.into());
        }
        let multiplicity = self.header.item_multiplicity as usize;
        trace!(
            path = %self.path.display(),
            count = ?slice.count(),
            "reading physical slice"
        );

        macro_rules! read_typed {
            ($elem:ty, $variant:ident) => {{
                let typed: &[$elem] = bytemuck::try_cast_slice(self.data_bytes())
                    .map_err(|_| DatasetError::format(&self.path, "misaligned data section"))?;
                let values = gather(typed, &dims, multiplicity, slice, monitor)?;
                let result = realized_shape(slice.count(), multiplicity);
                let arr = ArrayD::from_shape_vec(IxDyn(&result), values)
                    .map_err(|_| DatasetError::from(CoreError::ShapeMismatch))?;
                DynamicArray::$variant(arr)
            }};
        }

        Ok(match self.data_type {
            DataType::I8 => read_typed!(i8, I8),
            DataType::I16 => read_typed!(i16, I16),
            DataType::I32 => read_typed!(i32, I32),
            DataType::I64 => read_typed!(i64, I64),
            DataType::U8 => read_typed!(u8, U8),
            DataType::U16 => read_typed!(u16, U16),
            DataType::U32 => read_typed!(u32, U32),
            DataType::U64 => read_typed!(u64, U64),
            DataType::F32 => read_typed!(f32, F32),
            DataType::F64 => read_typed!(f64, F64),
        })
    }

    /// Create a new dataset file with the given header, filled with
    /// zeros or the given fill value.
    ///
    /// Creation is exclusive; on any failure the partial file is removed
    /// so a failed create leaves no node behind.
    pub fn create<P: AsRef<Path>>(path: P, header: &DslcHeader, fill: Option<f64>) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| DatasetError::io(path, e))?;

        let written = write_initial(&mut file, path, header, fill);
        if written.is_err() {
            drop(file);
            let _ = std::fs::remove_file(path);
        }
        written
    }
}

fn write_initial(
    file: &mut File,
    path: &Path,
    header: &DslcHeader,
    fill: Option<f64>,
) -> Result<()> {
    let io_err = |e| DatasetError::io(path, e);
    file.write_all(&header.to_bytes()).map_err(io_err)?;

    let data_type = header
        .element_type()
        .map_err(|e| DatasetError::format(path, e.to_string()))?;
    let pattern = fill_pattern(data_type, fill.unwrap_or(0.0));

    let mut chunk = Vec::with_capacity(FILL_CHUNK);
    while chunk.len() + pattern.len() <= FILL_CHUNK {
        chunk.extend_from_slice(&pattern);
    }

    let mut remaining = header.data_size as usize;
    while remaining > 0 {
        let n = remaining.min(chunk.len());
        file.write_all(&chunk[..n]).map_err(io_err)?;
        remaining -= n;
    }
    file.sync_all().map_err(io_err)?;
    debug!(path = %path.display(), size = header.data_size, "created dataset file");
    Ok(())
}

/// Little-endian byte pattern of one element value for initialization
fn fill_pattern(data_type: DataType, fill: f64) -> Vec<u8> {
    match data_type {
        DataType::I8 => (fill as i8).to_le_bytes().to_vec(),
        DataType::I16 => (fill as i16).to_le_bytes().to_vec(),
        DataType::I32 => (fill as i32).to_le_bytes().to_vec(),
        DataType::I64 => (fill as i64).to_le_bytes().to_vec(),
        DataType::U8 => (fill as u8).to_le_bytes().to_vec(),
        DataType::U16 => (fill as u16).to_le_bytes().to_vec(),
        DataType::U32 => (fill as u32).to_le_bytes().to_vec(),
        DataType::U64 => (fill as u64).to_le_bytes().to_vec(),
        DataType::F32 => (fill as f32).to_le_bytes().to_vec(),
        DataType::F64 => fill.to_le_bytes().to_vec(),
    }
}

/// Writable dataset file handle, using plain file I/O
pub struct DslcFileMut {
    path: PathBuf,
    file: File,
    header: DslcHeader,
    data_type: DataType,
}

impl DslcFileMut {
    /// Open an existing dataset file for writing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DatasetError::io(&path, e))?;

        let mut raw = [0u8; DslcHeader::SIZE];
        file.read_exact(&mut raw)
            .map_err(|e| DatasetError::io(&path, e))?;
        let header = DslcHeader::from_bytes(&raw)
            .map_err(|e| DatasetError::format(&path, e.to_string()))?;
        let data_type = header
            .element_type()
            .map_err(|e| DatasetError::format(&path, e.to_string()))?;

        Ok(DslcFileMut {
            path,
            file,
            header,
            data_type,
        })
    }

    /// The validated file header
    pub fn header(&self) -> &DslcHeader {
        &self.header
    }

    /// Physical shape recorded in the header
    pub fn shape(&self) -> Vec<usize> {
        self.header.shape()
    }

    /// Write data into the positions addressed by a physical slice.
    ///
    /// The data must hold exactly the elements the slice addresses, in
    /// row-major order, with the file's element type. Only the element
    /// count is checked here: the data may carry a logical shape that
    /// differs from the physical counts by unit axes, which never
    /// change the element order; lazy writers enforce the exact logical
    /// shape before translating.
    pub fn write_slice(&mut self, slice: &SliceSpec, data: &DynamicArray) -> Result<()> {
        let dims = self.shape();
        if slice.source() != dims {
            return Err(CoreError::ShapeMismatch.into());
        }
        let multiplicity = self.header.item_multiplicity as usize;
        let expected = shape::element_count(&realized_shape(slice.count(), multiplicity))?;
        if data.len() != expected {
            return Err(CoreError::ShapeMismatch.into());
        }
        if data.data_type() != self.data_type {
            return Err(DatasetError::Unsupported(format!(
                "cannot write {} data into {} dataset",
                data.data_type(),
                self.data_type
            )));
        }
        trace!(
            path = %self.path.display(),
            count = ?slice.count(),
            "writing physical slice"
        );

        macro_rules! write_typed {
            ($arr:expr) => {{
                let src = $arr.as_standard_layout().into_owned().into_raw_vec();
                scatter(
                    &mut self.file,
                    &self.path,
                    self.header.data_offset,
                    &dims,
                    multiplicity,
                    slice,
                    &src,
                )
            }};
        }

        match data {
            DynamicArray::I8(arr) => write_typed!(arr),
            DynamicArray::I16(arr) => write_typed!(arr),
            DynamicArray::I32(arr) => write_typed!(arr),
            DynamicArray::I64(arr) => write_typed!(arr),
            DynamicArray::U8(arr) => write_typed!(arr),
            DynamicArray::U16(arr) => write_typed!(arr),
            DynamicArray::U32(arr) => write_typed!(arr),
            DynamicArray::U64(arr) => write_typed!(arr),
            DynamicArray::F32(arr) => write_typed!(arr),
            DynamicArray::F64(arr) => write_typed!(arr),
        }
    }
}
