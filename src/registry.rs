//! Compiled Schema Registry
//!
//! Message types are compiled once, typically at process start, and the
//! resulting artifacts are shared read-mostly across connection threads.
//! The registry guards its map with a plain `RwLock`; compilation itself is
//! pure, synchronous computation, so nothing here blocks or suspends.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::plan::{compile, CompiledSchema};
use crate::schema::normalize::SchemaError;
use crate::schema::types::Schema;

/// Shared cache mapping message names to their compiled artifacts.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    inner: RwLock<HashMap<String, Arc<CompiledSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CompiledSchema>>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CompiledSchema>>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Compile and cache a message schema. A failed compilation leaves the
    /// registry unchanged; re-registering a name swaps the artifact.
    pub fn register(&self, name: &str, schema: &Schema) -> Result<Arc<CompiledSchema>, SchemaError> {
        let compiled = Arc::new(compile(schema)?);
        self.write().insert(name.to_string(), compiled.clone());
        info!(
            "registered message schema '{}' (dynamic: {}, min length: {})",
            name,
            compiled.is_dynamic_length(),
            compiled.min_length()
        );
        Ok(compiled)
    }

    /// Compiled artifact for a message, if registered.
    pub fn get(&self, name: &str) -> Option<Arc<CompiledSchema>> {
        self.read().get(name).cloned()
    }

    /// Artifact for `name`, compiling and caching it on first use.
    pub fn get_or_register(
        &self,
        name: &str,
        schema: impl FnOnce() -> Schema,
    ) -> Result<Arc<CompiledSchema>, SchemaError> {
        if let Some(compiled) = self.get(name) {
            return Ok(compiled);
        }
        self.register(name, &schema())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ScalarType;

    fn sample_schema() -> Schema {
        Schema::new()
            .scalar("id", ScalarType::U32)
            .ref_string("name")
            .string("name")
    }

    #[test]
    fn test_register_and_get() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        registry.register("S_LOGIN", &sample_schema()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("S_LOGIN"));

        let compiled = registry.get("S_LOGIN").unwrap();
        assert!(compiled.is_dynamic_length());
        assert!(registry.get("S_LOGOUT").is_none());
    }

    #[test]
    fn test_failed_registration_leaves_no_artifact() {
        let registry = SchemaRegistry::new();
        let bad = Schema::new().bytes("payload");
        assert!(registry.register("S_BAD", &bad).is_err());
        assert!(!registry.contains("S_BAD"));
    }

    #[test]
    fn test_get_or_register_compiles_once() {
        let registry = SchemaRegistry::new();
        let first = registry
            .get_or_register("S_LOGIN", sample_schema)
            .unwrap();
        let second = registry
            .get_or_register("S_LOGIN", || panic!("should not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register("S_LOGIN", &sample_schema()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let compiled = registry.get("S_LOGIN").unwrap();
                    let data = crate::value::MessageData::new().with_uint("id", 1);
                    let mut buf = [0u8; 64];
                    compiled.encode(&data, &mut buf).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() >= 8);
        }
    }
}
