//! Format-agnostic value codec over framed document streams.
//!
//! One abstract document model — fields, scalars, sequences, typed objects,
//! bound references — rendered and parsed as human-readable text, as
//! self-describing binary, or as field-less raw binary. Documents ride on
//! the concurrent framing layer from `polywire-frame`; the self-describing
//! formats guarantee schema evolution (reordering, unknown fields, missing
//! fields) on top of it.

mod binary;
pub mod bound;
pub mod error;
pub mod format;
pub mod marshal;
mod raw;
pub mod reader;
mod text;
pub mod value;
pub mod wire;
pub mod writer;

pub use bound::{BoundI32, BoundI32Array, BoundI64, BoundI64Array};
pub use error::{Result, WireError};
pub use format::WireFormat;
pub use marshal::{default_registry, MarshalRegistry, Marshaller};
pub use reader::{SeqIn, ValueIn};
pub use value::{Field, Value};
pub use wire::{Wire, WireConfig};
pub use writer::{SeqOut, ValueOut};
