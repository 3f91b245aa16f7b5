//! User-type marshalling through registered callback pairs.
//!
//! The codec never inspects user types: each registered alias carries a
//! writer callback (type → value tree) and a reader callback (value tree →
//! type). The wire renders the tree in whatever format is active.

use std::any::{type_name, Any, TypeId};
use std::sync::{Arc, OnceLock};

use polywire_registry::{AliasRegistry, RegistryConfig, RegistryError};

use crate::error::{Result, WireError};
use crate::value::Value;

type WriteFn = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
type ReadFn = Arc<dyn Fn(&Value) -> Result<Box<dyn Any + Send>> + Send + Sync>;

/// A registered pair of marshalling callbacks.
#[derive(Clone)]
pub struct Marshaller {
    write: WriteFn,
    read: ReadFn,
}

/// Registry of `alias → (writer, reader)` callback pairs.
///
/// Configure at start-up, optionally [`freeze`], then share behind an `Arc`.
/// A process-wide default is available through [`default_registry`] for the
/// common case of one alias namespace per process.
///
/// [`freeze`]: MarshalRegistry::freeze
pub struct MarshalRegistry {
    aliases: AliasRegistry<Marshaller>,
}

impl MarshalRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            aliases: AliasRegistry::with_config(config),
        }
    }

    /// Register marshalling callbacks for `T` under `alias`.
    pub fn register<T, W, R>(&self, alias: &str, write: W, read: R) -> Result<()>
    where
        T: Any + Send,
        W: Fn(&T) -> Value + Send + Sync + 'static,
        R: Fn(&Value) -> Result<T> + Send + Sync + 'static,
    {
        let write: WriteFn = Arc::new(move |any: &dyn Any| {
            let typed = any.downcast_ref::<T>().ok_or(WireError::SchemaMismatch {
                expected: type_name::<T>(),
                found: "a different registered type".to_string(),
            })?;
            Ok(write(typed))
        });
        let read: ReadFn = Arc::new(move |tree: &Value| {
            let typed = read(tree)?;
            Ok(Box::new(typed) as Box<dyn Any + Send>)
        });
        self.aliases
            .register(alias, TypeId::of::<T>(), Marshaller { write, read })?;
        Ok(())
    }

    /// Reject all further registration.
    pub fn freeze(&self) {
        self.aliases.freeze();
    }

    /// The alias registered for `T`.
    pub fn alias_of<T: Any>(&self) -> Result<String> {
        self.aliases
            .name_of(TypeId::of::<T>())
            .ok_or_else(|| RegistryError::UnknownType(type_name::<T>()).into())
    }

    /// True when `alias` has a registration.
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.lookup(alias).is_some()
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        self.aliases.aliases()
    }

    /// Run the writer callback: `T` → `(alias, value tree)`.
    pub fn to_value<T: Any>(&self, value: &T) -> Result<(String, Value)> {
        let alias = self.alias_of::<T>()?;
        let marshaller = self
            .aliases
            .lookup(&alias)
            .ok_or_else(|| RegistryError::UnknownAlias(alias.clone()))?;
        let tree = (marshaller.write)(value)?;
        Ok((alias, tree))
    }

    /// Run the reader callback registered under `alias` and downcast to `T`.
    pub fn from_value<T: Any>(&self, alias: &str, tree: &Value) -> Result<T> {
        let marshaller = self
            .aliases
            .lookup(alias)
            .ok_or_else(|| RegistryError::UnknownAlias(alias.to_string()))?;
        let boxed = (marshaller.read)(tree)?;
        boxed
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| WireError::SchemaMismatch {
                expected: type_name::<T>(),
                found: format!("type registered under alias {alias}"),
            })
    }
}

impl Default for MarshalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide default registry.
pub fn default_registry() -> &'static Arc<MarshalRegistry> {
    static DEFAULT: OnceLock<Arc<MarshalRegistry>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(MarshalRegistry::new()))
}
