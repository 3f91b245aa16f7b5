/// Errors that can occur in byte-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The access falls outside the store's capacity.
    #[error("access out of bounds (offset {offset}, len {len}, capacity {capacity})")]
    OutOfBounds { offset: u64, len: u64, capacity: u64 },

    /// An atomic access was requested at an unaligned offset.
    #[error("misaligned atomic access at offset {offset} (requires {align}-byte alignment)")]
    Misaligned { offset: u64, align: u64 },

    /// A cursor write would run past the current write limit.
    #[error("write overruns limit (position {position}, len {len}, limit {limit})")]
    WriteOverrun { position: u64, len: u64, limit: u64 },

    /// A cursor read would run past the current read limit.
    #[error("read overruns limit (position {position}, len {len}, limit {limit})")]
    ReadOverrun { position: u64, len: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
