//! Dataslice - Lazy N-dimensional Dataset Access
//!
//! This library gives scientific-instrument data files a uniform
//! in-memory representation with deferred access to large on-disk
//! arrays: slice requests against a logical view are translated onto
//! the physical storage shape and only the requested region is read.
//!
//! ## Architecture
//!
//! Dataslice follows a clean specification/implementation separation:
//!
//! - **dataslice-core**: Pure shape/slice definitions, the slice
//!   translation algorithm, the file header format, and capability
//!   traits (no I/O)
//! - **dataslice**: Concrete implementations with memory-mapped
//!   storage, lazy handles, containers, metadata and caching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dataslice::{DataLoader, DslcLoader, ResultCache, SliceSpec};
//!
//! fn example() -> dataslice::Result<()> {
//!     // Load a container; the data stays on disk
//!     let mut loader = DslcLoader::new("scan.dslc");
//!     let container = loader.load()?;
//!
//!     // Read a window of the first dataset
//!     let lazy = container.dataset_at(0)?.as_lazy().unwrap();
//!     let slice = SliceSpec::new(lazy.logical_shape(), vec![0, 0], vec![1, 1], vec![2, 4])?;
//!     let window = lazy.read_slice(&slice)?;
//!     println!("{} -> {:?}", window.name(), window.shape());
//!
//!     // Or realize the whole dataset through the process cache
//!     let whole = lazy.read_all_cached(ResultCache::global())?;
//!     println!("{} elements resident", whole.data().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Lazy handles**: slice reads defer I/O and reshape between
//!   squeezed, extended and physical views
//! - **Memory-mapped I/O**: validated zero-copy access to array data
//! - **Metadata records**: per-container shapes, sizes and free-form
//!   values with deep-copy semantics
//! - **Result cache**: process-wide, single-flight, with none/weak/soft
//!   retention policies

// Re-export core definitions
pub use dataslice_core::{
    // Shape and slice model
    shape, translate, phantom_axes, SliceSpec,
    // Format definitions
    DataType, DslcHeader,
    // Error handling
    CoreError,
    // Capability traits
    ProgressMonitor,
};

// Implementation modules
pub mod array;
pub mod cache;
pub mod container;
#[cfg(feature = "mmap")]
pub mod dataset;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod registry;
#[cfg(feature = "mmap")]
pub mod storage;

// Public exports
pub use array::{DynamicArray, RealizedDataset};
pub use cache::{CacheKey, CacheStats, CacheWeight, ResultCache, RetentionPolicy};
pub use container::{DatasetContainer, DatasetEntry};
pub use error::{DatasetError, Result};
pub use loader::{DataLoader, FlagMonitor, NullMonitor};
pub use metadata::{MetadataRecord, UserObject};
pub use registry::{LoaderFactory, LoaderRegistry};

// Lazy access features
#[cfg(feature = "mmap")]
pub use dataset::{LazyDataset, LazyWriter};
#[cfg(feature = "mmap")]
pub use loader::DslcLoader;
#[cfg(feature = "mmap")]
pub use storage::{DslcFile, DslcFileMut};
