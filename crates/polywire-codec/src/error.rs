use polywire_frame::FrameError;
use polywire_registry::RegistryError;
use polywire_store::StoreError;

/// Errors that can occur in the codec layer.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A framing failure (reservation, commit, read, end-of-stream).
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// An underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An alias registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The on-wire value kind is incompatible with the requested read.
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: &'static str, found: String },

    /// The document body cannot be decoded.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The operation has no representation in the active format.
    #[error("{what} is not supported by the {format} format")]
    Unsupported {
        what: &'static str,
        format: &'static str,
    },

    /// A bound-array access outside the array.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: u32, len: u32 },
}

pub type Result<T> = std::result::Result<T, WireError>;
