//! Bounded byte buffers with lock-free atomic access.
//!
//! This is the lowest layer of polywire. Everything else builds on the
//! [`ByteStore`] trait provided here: a random-access bounded buffer with
//! volatile, release-ordered, and compare-and-swap 32/64-bit operations at
//! absolute offsets, plus the [`StoreBuf`] cursor view that the framing and
//! codec layers drive.

pub mod buf;
pub mod error;
pub mod heap;
pub mod store;

pub use buf::StoreBuf;
pub use error::{Result, StoreError};
pub use heap::HeapStore;
pub use store::ByteStore;
