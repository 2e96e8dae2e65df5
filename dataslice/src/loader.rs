//! Loader capability contract and the native file loader
//!
//! Format-specific loaders produce a [`DatasetContainer`] on demand.
//! The trait is the full capability surface the access layer requires:
//! an eager load, a cheaper metadata-only load, and a toggle for whether
//! a full load also populates metadata. Loaders consult the caller's
//! [`ProgressMonitor`] and abort with `Cancelled` when asked.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dataslice_core::ProgressMonitor;

use crate::container::DatasetContainer;
use crate::error::Result;
use crate::metadata::MetadataRecord;

/// Monitor that never cancels and discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn work(&self, _units: usize) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Monitor backed by an atomic flag, for caller-driven cancellation
#[derive(Debug, Default)]
pub struct FlagMonitor {
    cancelled: AtomicBool,
    worked: AtomicUsize,
}

impl FlagMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; consulted between work units
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Total work units reported so far
    pub fn worked(&self) -> usize {
        self.worked.load(Ordering::Relaxed)
    }
}

impl ProgressMonitor for FlagMonitor {
    fn work(&self, units: usize) {
        self.worked.fetch_add(units, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Capability surface required from format-specific loaders
pub trait DataLoader {
    /// Full, eager load of the container
    fn load(&mut self) -> Result<DatasetContainer> {
        self.load_with_monitor(&NullMonitor)
    }

    /// Full load consulting a progress monitor
    fn load_with_monitor(&mut self, monitor: &dyn ProgressMonitor) -> Result<DatasetContainer>;

    /// Metadata-only load, cheaper than a full load
    fn load_metadata(&mut self, monitor: &dyn ProgressMonitor) -> Result<()>;

    /// Metadata gathered by the last load, when any
    fn metadata(&self) -> Option<&MetadataRecord>;

    /// Whether a full load also populates metadata
    fn set_load_metadata(&mut self, load: bool);
}

#[cfg(feature = "mmap")]
pub use native::DslcLoader;

#[cfg(feature = "mmap")]
mod native {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use serde_json::json;
    use tracing::debug;

    use dataslice_core::ProgressMonitor;

    use crate::container::{DatasetContainer, DatasetEntry};
    use crate::dataset::LazyDataset;
    use crate::error::{DatasetError, Result};
    use crate::loader::DataLoader;
    use crate::metadata::MetadataRecord;
    use crate::storage::DslcFile;

    /// Loader for native `.dslc` dataset files.
    ///
    /// Produces a container with one lazy entry per file; the data stays
    /// on disk until a slice is requested.
    pub struct DslcLoader {
        path: PathBuf,
        load_metadata: bool,
        metadata: Option<MetadataRecord>,
    }

    impl DslcLoader {
        pub fn new<P: AsRef<Path>>(path: P) -> Self {
            DslcLoader {
                path: path.as_ref().to_path_buf(),
                load_metadata: true,
                metadata: None,
            }
        }

        fn dataset_name(&self) -> String {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "data".to_string())
        }

        fn build_metadata(&self, file: &DslcFile, name: &str) -> MetadataRecord {
            let mut record = MetadataRecord::new();
            record.add_dataset_info(name, Some(file.shape()));
            record.insert_value("data_type", json!(file.data_type().to_string()));
            record.insert_value(
                "item_multiplicity",
                json!(file.header().item_multiplicity),
            );
            record.set_file_name(self.path.display().to_string());
            if let Ok(meta) = std::fs::metadata(&self.path) {
                record.set_file_size(meta.len());
                if let Ok(at) = meta.modified() {
                    record.set_modified(at);
                }
                if let Ok(at) = meta.created() {
                    record.set_created(at);
                }
            }
            record
        }
    }

    impl DataLoader for DslcLoader {
        fn load_with_monitor(
            &mut self,
            monitor: &dyn ProgressMonitor,
        ) -> Result<DatasetContainer> {
            if monitor.is_cancelled() {
                return Err(DatasetError::Cancelled);
            }
            let file = DslcFile::open(&self.path)?;
            let name = self.dataset_name();
            let dataset = LazyDataset::from_dslc(&file, format!("/{name}"), name.clone());
            monitor.work(1);

            let mut container = DatasetContainer::new();
            container.add(name.clone(), DatasetEntry::Lazy(Arc::new(dataset)));

            if self.load_metadata {
                if monitor.is_cancelled() {
                    return Err(DatasetError::Cancelled);
                }
                let record = self.build_metadata(&file, &name);
                self.metadata = Some(record.try_clone()?);
                container.attach_metadata(record);
                monitor.work(1);
            }
            debug!(path = %self.path.display(), "loaded dataset container");
            Ok(container)
        }

        fn load_metadata(&mut self, monitor: &dyn ProgressMonitor) -> Result<()> {
            if monitor.is_cancelled() {
                return Err(DatasetError::Cancelled);
            }
            let file = DslcFile::open(&self.path)?;
            let name = self.dataset_name();
            self.metadata = Some(self.build_metadata(&file, &name));
            monitor.work(1);
            Ok(())
        }

        fn metadata(&self) -> Option<&MetadataRecord> {
            self.metadata.as_ref()
        }

        fn set_load_metadata(&mut self, load: bool) {
            self.load_metadata = load;
        }
    }
}
