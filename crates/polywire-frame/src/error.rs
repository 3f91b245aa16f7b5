use std::time::Duration;

use polywire_store::StoreError;

/// Errors that can occur in the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A document length is outside the representable range.
    #[error("document length {0} out of range")]
    LengthOutOfRange(u64),

    /// The buffer cannot fit the requested reservation.
    #[error("not enough space to write {needed} bytes, {remaining} remain")]
    NotEnoughSpace { needed: u64, remaining: u64 },

    /// The wait budget was exhausted.
    #[error("timed out after {waited:?} (budget {budget:?})")]
    Timeout { waited: Duration, budget: Duration },

    /// The end-of-stream terminator was encountered.
    #[error("end of stream")]
    EndOfStream,

    /// A commit found unexpected header contents.
    #[error("header at {offset} overwritten? expected {expected:#010x}, found {found:#010x}")]
    HeaderOverwritten {
        offset: u64,
        expected: u32,
        found: u32,
    },

    /// Non-zero bytes past the end of the document being committed.
    #[error("data written past document end at {offset}; zero out data before rewinding")]
    DataBeyondEnd { offset: u64 },

    /// The stream does not start with a well-formed meta-data header.
    #[error("unexpected first header {header:#010x}")]
    BadFirstHeader { header: u32 },

    /// A header was consumed before it became ready.
    #[error("header at {offset} not ready ({header:#010x})")]
    NotReady { offset: u64, header: u32 },

    /// The body outgrew its concrete reservation.
    #[error("wrote {actual} bytes into a {reserved}-byte reservation")]
    LengthMismatch { reserved: u32, actual: u32 },

    /// A reservation was opened while another is pending on this wire.
    #[error("cannot open a header inside a header; documents must not nest")]
    Reentrant,

    /// The wire is owned by another thread.
    #[error("wire used by {owner} while trying to use it in {current}")]
    InUse { owner: String, current: String },

    /// An underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
