use std::any::TypeId;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Bidirectional alias ↔ type mapping with one caller entry per type.
///
/// `M` is whatever the caller wants attached to a registration; the codec
/// layer uses a pair of marshalling callbacks. Lookups clone the entry, so
/// `M` is typically a handle type (`Arc`-backed closures, small copyable
/// descriptors).
///
/// Intended lifecycle: register everything during start-up, optionally
/// [`freeze`], then share behind an `Arc` for concurrent readers.
///
/// [`freeze`]: AliasRegistry::freeze
pub struct AliasRegistry<M> {
    inner: RwLock<Inner<M>>,
    config: RegistryConfig,
}

struct Inner<M> {
    by_alias: HashMap<String, Entry<M>>,
    by_type: HashMap<TypeId, String>,
    frozen: bool,
}

struct Entry<M> {
    type_id: TypeId,
    value: M,
}

impl<M: Clone> AliasRegistry<M> {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_alias: HashMap::new(),
                by_type: HashMap::new(),
                frozen: false,
            }),
            config,
        }
    }

    /// Register `alias` for the concrete type identified by `type_id`.
    pub fn register(&self, alias: &str, type_id: TypeId, value: M) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.frozen {
            return Err(RegistryError::Frozen);
        }
        if inner.by_alias.contains_key(alias) && !self.config.allow_overwrite {
            return Err(RegistryError::DuplicateAlias(alias.to_string()));
        }
        if let Some(previous) = inner.by_type.insert(type_id, alias.to_string()) {
            inner.by_alias.remove(&previous);
        }
        inner
            .by_alias
            .insert(alias.to_string(), Entry { type_id, value });
        Ok(())
    }

    /// Reject all further mutation.
    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// The alias registered for a type, if any.
    pub fn name_of(&self, type_id: TypeId) -> Option<String> {
        self.inner.read().by_type.get(&type_id).cloned()
    }

    /// The entry registered under an alias, if any.
    pub fn lookup(&self, alias: &str) -> Option<M> {
        self.inner
            .read()
            .by_alias
            .get(alias)
            .map(|entry| entry.value.clone())
    }

    /// The type registered under an alias, if any.
    pub fn type_of(&self, alias: &str) -> Option<TypeId> {
        self.inner
            .read()
            .by_alias
            .get(alias)
            .map(|entry| entry.type_id)
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.inner.read().by_alias.keys().cloned().collect();
        aliases.sort_unstable();
        aliases
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl<M: Clone> Default for AliasRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}
