//! Ordered, name-addressable dataset collections
//!
//! The container is the unit exchanged between loaders, savers and
//! consumers: an insertion-ordered mapping from name to dataset (lazy or
//! realized) with at most one attached metadata record. Adding under an
//! existing name overwrites the entry but keeps its original position.

use std::sync::Arc;

use hashbrown::HashMap;

use dataslice_core::{CoreError, DataType};

use crate::array::RealizedDataset;
use crate::error::Result;
use crate::metadata::MetadataRecord;

#[cfg(feature = "mmap")]
use crate::dataset::LazyDataset;

/// A dataset held by a container: either a lazy handle or realized data
#[derive(Debug, Clone)]
pub enum DatasetEntry {
    /// Deferred access through a lazy handle
    #[cfg(feature = "mmap")]
    Lazy(Arc<LazyDataset>),
    /// Data already resident in memory
    Realized(Arc<RealizedDataset>),
}

impl DatasetEntry {
    /// The shape this entry presents to consumers
    pub fn shape(&self) -> &[usize] {
        match self {
            #[cfg(feature = "mmap")]
            DatasetEntry::Lazy(ds) => ds.logical_shape(),
            DatasetEntry::Realized(ds) => ds.shape(),
        }
    }

    /// The element type of this entry
    pub fn data_type(&self) -> DataType {
        match self {
            #[cfg(feature = "mmap")]
            DatasetEntry::Lazy(ds) => ds.data_type(),
            DatasetEntry::Realized(ds) => ds.data_type(),
        }
    }

    /// The lazy handle, when this entry defers its data
    #[cfg(feature = "mmap")]
    pub fn as_lazy(&self) -> Option<&Arc<LazyDataset>> {
        match self {
            DatasetEntry::Lazy(ds) => Some(ds),
            DatasetEntry::Realized(_) => None,
        }
    }

    /// The realized data, when resident
    pub fn as_realized(&self) -> Option<&Arc<RealizedDataset>> {
        match self {
            #[cfg(feature = "mmap")]
            DatasetEntry::Lazy(_) => None,
            DatasetEntry::Realized(ds) => Some(ds),
        }
    }
}

/// Ordered collection of named datasets with attached metadata
#[derive(Debug, Default)]
pub struct DatasetContainer {
    names: Vec<String>,
    entries: Vec<DatasetEntry>,
    index: HashMap<String, usize>,
    metadata: Option<MetadataRecord>,
}

impl DatasetContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset under `name`.
    ///
    /// A duplicate name overwrites the existing entry in place, keeping
    /// its original insertion position.
    pub fn add(&mut self, name: impl Into<String>, entry: DatasetEntry) {
        let name = name.into();
        if let Some(&at) = self.index.get(&name) {
            self.entries[at] = entry;
            return;
        }
        self.index.insert(name.clone(), self.entries.len());
        self.names.push(name);
        self.entries.push(entry);
    }

    /// Look up a dataset by name
    pub fn dataset(&self, name: &str) -> Option<&DatasetEntry> {
        self.index.get(name).map(|&at| &self.entries[at])
    }

    /// Look up a dataset by insertion position
    pub fn dataset_at(&self, index: usize) -> Result<&DatasetEntry> {
        self.entries
            .get(index)
            .ok_or_else(|| CoreError::IndexOutOfRange.into())
    }

    /// Dataset names in insertion order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of datasets held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no datasets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach the container's metadata record, replacing any previous
    /// one
    pub fn attach_metadata(&mut self, record: MetadataRecord) {
        self.metadata = Some(record);
    }

    /// The attached metadata record, when present
    pub fn metadata(&self) -> Option<&MetadataRecord> {
        self.metadata.as_ref()
    }

    /// Mutable access for the loader that is still populating the
    /// record
    pub fn metadata_mut(&mut self) -> Option<&mut MetadataRecord> {
        self.metadata.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::DynamicArray;
    use crate::error::DatasetError;
    use ndarray::{ArrayD, IxDyn};

    fn realized(name: &str, value: f64) -> DatasetEntry {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1]), vec![value]).unwrap();
        DatasetEntry::Realized(Arc::new(RealizedDataset::new(
            name,
            DynamicArray::from(arr),
        )))
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut container = DatasetContainer::new();
        container.add("b", realized("b", 1.0));
        container.add("a", realized("a", 2.0));
        container.add("c", realized("c", 3.0));

        assert_eq!(container.names(), &["b", "a", "c"]);
        assert_eq!(container.len(), 3);
        let at_one = container.dataset_at(1).unwrap();
        assert_eq!(at_one.as_realized().unwrap().name(), "a");
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut container = DatasetContainer::new();
        container.add("x", realized("x", 1.0));
        container.add("y", realized("y", 2.0));
        container.add("x", realized("x", 9.0));

        assert_eq!(container.names(), &["x", "y"]);
        assert_eq!(container.len(), 2);
        let x = container.dataset("x").unwrap().as_realized().unwrap();
        assert_eq!(x.data().get_f64(&[0]), Some(9.0));
    }

    #[test]
    fn test_index_out_of_range() {
        let container = DatasetContainer::new();
        assert!(matches!(
            container.dataset_at(0),
            Err(DatasetError::Core(dataslice_core::CoreError::IndexOutOfRange))
        ));
    }

    #[test]
    fn test_metadata_attachment() {
        let mut container = DatasetContainer::new();
        assert!(container.metadata().is_none());

        let mut record = MetadataRecord::new();
        record.add_dataset_info("x", Some(vec![4]));
        container.attach_metadata(record);
        assert_eq!(
            container.metadata().unwrap().dataset_shape("x"),
            Some(&[4][..])
        );
    }
}
