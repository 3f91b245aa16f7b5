//! Document header word layout.
//!
//! ```text
//! ┌───────────────┬───────────────┬─────────────────────────────┐
//! │ not-complete  │ meta-data     │ body length                 │
//! │ (bit 31)      │ (bit 30)      │ (bits 0..30, little-endian) │
//! └───────────────┴───────────────┴─────────────────────────────┘
//! ```
//!
//! A zero word means the slot has never been claimed. A reservation sets the
//! not-complete bit together with the requested length (zero while the length
//! is unknown). Commit clears the not-complete bit in a single release store
//! or compare-and-swap, which is what makes a document visible to readers.

/// Size of the header word in bytes.
pub const HEADER_SIZE: u64 = 4;

/// Set while a document is reserved but not yet committed.
pub const NOT_COMPLETE: u32 = 0x8000_0000;

/// Set on meta-data documents.
pub const META_DATA: u32 = 0x4000_0000;

/// Mask of the length bits.
pub const LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Largest representable body length.
pub const MAX_LENGTH: u32 = LENGTH_MASK;

/// A slot nobody has claimed yet.
pub const NOT_INITIALIZED: u32 = 0;

/// A reservation whose final length is not yet known.
pub const NOT_COMPLETE_UNKNOWN_LENGTH: u32 = NOT_COMPLETE;

/// Stream terminator. Never becomes ready; readers report end-of-stream.
pub const END_OF_DATA: u32 = NOT_COMPLETE | META_DATA;

/// Upper bound on the first (meta-data) document's body length.
pub const MAX_FIRST_HEADER_LENGTH: u32 = 64 << 10;

/// Classification of the next header as seen by a reader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// Nothing readable at this position yet.
    None,
    /// A ready meta-data document.
    MetaData,
    /// A ready data document.
    Data,
}

/// True once the not-complete bit is clear.
///
/// Note that an uninitialised (all-zero) word also reads as ready; callers
/// distinguish it via [`NOT_INITIALIZED`].
pub fn is_ready(header: u32) -> bool {
    header & NOT_COMPLETE == 0
}

pub fn is_not_complete(header: u32) -> bool {
    header & NOT_COMPLETE != 0
}

/// True for a ready data header.
pub fn is_data(header: u32) -> bool {
    header & (NOT_COMPLETE | META_DATA) == 0
}

/// True for a ready meta-data header.
pub fn is_ready_meta_data(header: u32) -> bool {
    header & (NOT_COMPLETE | META_DATA) == META_DATA
}

/// Body length carried by a header word.
pub fn length_of(header: u32) -> u32 {
    header & LENGTH_MASK
}

/// Round a body length up to the next 32-bit boundary so the following
/// header word lands naturally aligned.
pub fn align_length(len: u32) -> u32 {
    (len + 3) & !3
}
