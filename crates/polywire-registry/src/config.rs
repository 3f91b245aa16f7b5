/// Controls registry mutation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, re-registering an alias replaces the previous entry
    /// instead of failing with `RegistryError::DuplicateAlias`.
    pub allow_overwrite: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allow_overwrite: false,
        }
    }
}
