//! Concurrent document framing over a shared byte store.
//!
//! Every document in a stream is introduced by a 4-byte header word:
//! - bit 31: not-complete flag (clear once the document is ready)
//! - bit 30: meta-data flag
//! - bits 0..30: body length in bytes
//!
//! Writers contend for the next header slot with a compare-and-swap and
//! publish with a release store; readers observe headers with acquire loads
//! and never see a torn document. No partial reads, no manual header
//! arithmetic in user code.

pub mod error;
pub mod framing;
pub mod header;
pub mod pauser;
pub mod scope;

pub use error::{FrameError, Result};
pub use framing::Framing;
pub use header::{
    align_length, is_data, is_not_complete, is_ready, is_ready_meta_data, length_of, HeaderKind,
    END_OF_DATA, HEADER_SIZE, MAX_FIRST_HEADER_LENGTH, MAX_LENGTH, META_DATA, NOT_COMPLETE,
    NOT_COMPLETE_UNKNOWN_LENGTH, NOT_INITIALIZED,
};
pub use pauser::{BusyPauser, LongPauser, Pauser};
pub use scope::UseScope;
