/// Errors that can occur during alias registration and lookup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The alias is already registered and overwriting is disabled.
    #[error("alias already registered: {0}")]
    DuplicateAlias(String),

    /// No registration exists for the alias.
    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    /// No registration exists for the type.
    #[error("unregistered type: {0}")]
    UnknownType(&'static str),

    /// The registry was frozen before this mutation.
    #[error("registry is frozen")]
    Frozen,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
