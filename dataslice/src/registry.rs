//! Explicit registry of format loaders
//!
//! Format dispatch is an exact-key lookup in a map populated at startup;
//! unknown identifiers fail with an unsupported-operation error instead
//! of being guessed at.

use std::path::Path;

use hashbrown::HashMap;

use crate::error::{DatasetError, Result};
use crate::loader::DataLoader;

/// Constructor for a format-specific loader
pub type LoaderFactory = fn(&Path) -> Box<dyn DataLoader>;

/// Registry mapping format identifiers to loader constructors
#[derive(Default)]
pub struct LoaderRegistry {
    factories: HashMap<String, LoaderFactory>,
}

impl LoaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in loaders installed
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "mmap")]
        registry.register("dslc", |path| {
            Box::new(crate::loader::DslcLoader::new(path))
        });
        registry
    }

    /// Register a loader constructor under a format identifier,
    /// replacing any previous registration
    pub fn register(&mut self, format: impl Into<String>, factory: LoaderFactory) {
        self.factories.insert(format.into(), factory);
    }

    /// Whether a loader is registered for `format`
    pub fn contains(&self, format: &str) -> bool {
        self.factories.contains_key(format)
    }

    /// Registered format identifiers, sorted
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }

    /// Construct a loader for `format` addressing `path`.
    ///
    /// Lookup is by exact key; an unregistered format fails with
    /// [`DatasetError::Unsupported`].
    pub fn create(&self, format: &str, path: &Path) -> Result<Box<dyn DataLoader>> {
        match self.factories.get(format) {
            Some(factory) => Ok(factory(path)),
            None => Err(DatasetError::Unsupported(format!(
                "no loader registered for format '{format}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_rejected() {
        let registry = LoaderRegistry::with_builtin();
        let err = match registry.create("cbf", Path::new("/tmp/image.cbf")) {
            Ok(_) => panic!("expected unsupported-format error"),
            Err(e) => e,
        };
        assert!(matches!(err, DatasetError::Unsupported(_)));
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn test_builtin_native_loader() {
        use crate::array::DynamicArray;
        use crate::dataset::LazyWriter;
        use dataslice_core::{DataType, SliceSpec};
        use ndarray::{ArrayD, IxDyn};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.dslc");
        let writer = LazyWriter::new(&path, "/probe", vec![3], DataType::I32);
        let data = ArrayD::from_shape_vec(IxDyn(&[3]), vec![5i32, 6, 7]).unwrap();
        writer
            .write_slice(&SliceSpec::full(&[3]), &DynamicArray::from(data))
            .unwrap();

        let registry = LoaderRegistry::with_builtin();
        assert!(registry.contains("dslc"));
        assert_eq!(registry.formats(), vec!["dslc"]);

        let mut loader = registry.create("dslc", &path).unwrap();
        let container = loader.load().unwrap();
        assert_eq!(container.names(), &["probe"]);
    }

    #[test]
    fn test_replacing_registration() {
        fn stub(_: &Path) -> Box<dyn DataLoader> {
            unimplemented!("stub factory for registration test")
        }

        let mut registry = LoaderRegistry::new();
        registry.register("srs", stub);
        registry.register("srs", stub);
        assert_eq!(registry.formats(), vec!["srs"]);
    }
}
