//! Polymorphic wire formats over concurrently appendable document streams.
//!
//! polywire renders one abstract document model — fields, scalars,
//! sequences, typed objects, bound references — as human-readable text,
//! self-describing binary, or field-less raw binary, over a framed stream
//! that multiple writers append to through lock-free header reservations.
//!
//! # Crate Structure
//!
//! - [`store`] — Byte-store abstraction and the heap-backed reference store
//! - [`frame`] — Document framing, pausing strategies, use scopes
//! - [`registry`] — Alias ↔ type registry underpinning typed documents
//! - [`codec`] — The value codec, the three formats, bound references

/// Re-export store types.
pub mod store {
    pub use polywire_store::*;
}

/// Re-export framing types.
pub mod frame {
    pub use polywire_frame::*;
}

/// Re-export registry types.
pub mod registry {
    pub use polywire_registry::*;
}

/// Re-export codec types.
pub mod codec {
    pub use polywire_codec::*;
}

pub use polywire_codec::{
    default_registry, Field, MarshalRegistry, Value, Wire, WireConfig, WireFormat,
};
pub use polywire_store::HeapStore;
