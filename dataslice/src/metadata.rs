//! Per-container metadata records
//!
//! One record per container: dataset names and shapes for size
//! accounting, free-form key/value metadata, opaque user objects, and a
//! flat set of optional file-level fields. Records are built by the
//! loader that owns them and treated as read-only once the container is
//! handed to a consumer.

use std::any::Any;
use std::fmt;
use std::time::SystemTime;

use hashbrown::HashMap;
use serde_json::Value;

use dataslice_core::shape;

use crate::error::Result;

/// Opaque consumer-supplied object attached to a metadata record.
///
/// Cloning a record deep-copies these; an object that cannot be copied
/// reports the failure instead of being dropped from the clone.
pub trait UserObject: Any + Send + Sync {
    /// Deep-copy this object
    fn try_clone_object(&self) -> Result<Box<dyn UserObject>>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Metadata attached to one dataset container
#[derive(Default)]
pub struct MetadataRecord {
    shapes: HashMap<String, Option<Vec<usize>>>,
    values: HashMap<String, Value>,
    user_objects: Vec<Box<dyn UserObject>>,
    file_name: Option<String>,
    file_size: Option<u64>,
    file_owner: Option<String>,
    created: Option<SystemTime>,
    modified: Option<SystemTime>,
}

impl MetadataRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dataset's shape, or `None` when the entry does not
    /// describe an array (string or scalar metadata)
    pub fn add_dataset_info(&mut self, name: impl Into<String>, shape: Option<Vec<usize>>) {
        self.shapes.insert(name.into(), shape);
    }

    /// Shape of a recorded dataset, when known
    pub fn dataset_shape(&self, name: &str) -> Option<&[usize]> {
        self.shapes.get(name)?.as_deref()
    }

    /// All recorded dataset names and shapes
    pub fn shapes(&self) -> &HashMap<String, Option<Vec<usize>>> {
        &self.shapes
    }

    /// Element counts per recorded dataset; `None` when the shape is
    /// unknown or does not describe an array
    pub fn sizes(&self) -> HashMap<String, Option<usize>> {
        self.shapes
            .iter()
            .map(|(name, dims)| {
                let size = dims
                    .as_deref()
                    .and_then(|dims| shape::element_count(dims).ok());
                (name.clone(), size)
            })
            .collect()
    }

    /// Store a free-form metadata value
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Look up a free-form metadata value
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All free-form metadata keys and values
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Attach an opaque user object
    pub fn add_user_object(&mut self, object: Box<dyn UserObject>) {
        self.user_objects.push(object);
    }

    /// The attached user objects
    pub fn user_objects(&self) -> &[Box<dyn UserObject>] {
        &self.user_objects
    }

    /// Name of the originating file
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
    }

    /// Size of the originating file in bytes
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn set_file_size(&mut self, size: u64) {
        self.file_size = Some(size);
    }

    /// Owner of the originating file
    pub fn file_owner(&self) -> Option<&str> {
        self.file_owner.as_deref()
    }

    pub fn set_file_owner(&mut self, owner: impl Into<String>) {
        self.file_owner = Some(owner.into());
    }

    /// Creation timestamp of the originating file
    pub fn created(&self) -> Option<SystemTime> {
        self.created
    }

    pub fn set_created(&mut self, at: SystemTime) {
        self.created = Some(at);
    }

    /// Modification timestamp of the originating file
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn set_modified(&mut self, at: SystemTime) {
        self.modified = Some(at);
    }

    /// Deep-copy the record.
    ///
    /// The clone shares no mutable state with the original; a user
    /// object that cannot be deep-copied fails the whole clone rather
    /// than silently producing a partial record.
    pub fn try_clone(&self) -> Result<MetadataRecord> {
        let mut user_objects = Vec::with_capacity(self.user_objects.len());
        for object in &self.user_objects {
            user_objects.push(object.try_clone_object()?);
        }
        Ok(MetadataRecord {
            shapes: self.shapes.clone(),
            values: self.values.clone(),
            user_objects,
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            file_owner: self.file_owner.clone(),
            created: self.created,
            modified: self.modified,
        })
    }
}

impl fmt::Debug for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRecord")
            .field("shapes", &self.shapes)
            .field("values", &self.values)
            .field("user_objects", &self.user_objects.len())
            .field("file_name", &self.file_name)
            .field("file_size", &self.file_size)
            .finish()
    }
}
