//! Writer surface: fields and values emitted into a reserved document body.

use std::any::Any;
use std::sync::Arc;

use polywire_store::ByteStore;

use crate::binary;
use crate::bound::{BoundI32, BoundI32Array, BoundI64, BoundI64Array};
use crate::error::{Result, WireError};
use crate::format::WireFormat;
use crate::raw;
use crate::text;
use crate::value::{Field, Value};
use crate::wire::{FormatState, Wire};

impl<S: ByteStore> Wire<S> {
    /// Emit a field identifier; the returned [`ValueOut`] writes its value.
    ///
    /// The raw format drops field identity: the identifier is accepted and
    /// nothing is emitted.
    pub fn write_field(&mut self, field: impl Into<Field>) -> Result<ValueOut<'_, S>> {
        let field = field.into();
        match &mut self.format {
            FormatState::Text(st) => text::write_field(&mut self.framing, st, &field)?,
            FormatState::Binary => binary::write_field(&mut self.framing, &field)?,
            FormatState::Raw => {}
        }
        Ok(ValueOut { wire: self })
    }

    /// Write an anonymous value (standalone bodies, raw streams).
    pub fn write_value(&mut self) -> ValueOut<'_, S> {
        ValueOut { wire: self }
    }
}

/// Accepts exactly one value into the document body.
pub struct ValueOut<'a, S: ByteStore> {
    wire: &'a mut Wire<S>,
}

impl<'a, S: ByteStore> ValueOut<'a, S> {
    pub fn text(self, s: &str) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_text(&mut self.wire.framing, st, s),
            FormatState::Binary => binary::write_str(&mut self.wire.framing, s),
            FormatState::Raw => raw::write_str(&mut self.wire.framing, s),
        }
    }

    /// An enum-like symbol; self-describing formats encode it like a string,
    /// text renders it bare.
    pub fn symbol(self, symbol: &str) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_symbol(&mut self.wire.framing, st, symbol),
            FormatState::Binary => binary::write_str(&mut self.wire.framing, symbol),
            FormatState::Raw => raw::write_str(&mut self.wire.framing, symbol),
        }
    }

    pub fn i64(self, value: i64) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_i64(&mut self.wire.framing, st, value),
            FormatState::Binary => binary::write_i64(&mut self.wire.framing, value),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_i64_le(value)?),
        }
    }

    pub fn i32(self, value: i32) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_i64(&mut self.wire.framing, st, value as i64),
            FormatState::Binary => binary::write_i64(&mut self.wire.framing, value as i64),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_i32_le(value)?),
        }
    }

    pub fn i16(self, value: i16) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_i64(&mut self.wire.framing, st, value as i64),
            FormatState::Binary => binary::write_i64(&mut self.wire.framing, value as i64),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_i16_le(value)?),
        }
    }

    pub fn i8(self, value: i8) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_i64(&mut self.wire.framing, st, value as i64),
            FormatState::Binary => binary::write_i64(&mut self.wire.framing, value as i64),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_i8(value)?),
        }
    }

    pub fn f64(self, value: f64) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_f64(&mut self.wire.framing, st, value),
            FormatState::Binary => binary::write_f64(&mut self.wire.framing, value),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_f64_le(value)?),
        }
    }

    pub fn f32(self, value: f32) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_f64(&mut self.wire.framing, st, value as f64),
            FormatState::Binary => binary::write_f32(&mut self.wire.framing, value),
            FormatState::Raw => Ok(self.wire.framing.buf_mut().write_f32_le(value)?),
        }
    }

    pub fn bool(self, value: bool) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_bool(&mut self.wire.framing, st, value),
            FormatState::Binary => binary::write_bool(&mut self.wire.framing, value),
            FormatState::Raw => raw::write_bool(&mut self.wire.framing, value),
        }
    }

    pub fn null(self) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(st) => text::write_null(&mut self.wire.framing, st),
            FormatState::Binary => binary::write_null(&mut self.wire.framing),
            FormatState::Raw => Err(WireError::Unsupported {
                what: "null values",
                format: "raw",
            }),
        }
    }

    pub fn bytes(self, bytes: &[u8]) -> Result<()> {
        match &mut self.wire.format {
            FormatState::Text(_) => Err(WireError::Unsupported {
                what: "opaque bytes",
                format: "text",
            }),
            FormatState::Binary => binary::write_bytes(&mut self.wire.framing, bytes),
            FormatState::Raw => raw::write_bytes(&mut self.wire.framing, bytes),
        }
    }

    /// A sequence of values, written through the element callback.
    pub fn sequence<R>(self, f: impl FnOnce(&mut SeqOut<'_, S>) -> Result<R>) -> Result<R> {
        let wire = self.wire;
        let patch = match &mut wire.format {
            FormatState::Text(st) => {
                text::begin_sequence(&mut wire.framing, st)?;
                0
            }
            FormatState::Binary => binary::begin_nested(&mut wire.framing)?,
            FormatState::Raw => raw::begin_sequence(&mut wire.framing)?,
        };
        let mut seq = SeqOut { wire, count: 0 };
        let result = f(&mut seq)?;
        let count = seq.count;
        let wire = seq.wire;
        match &mut wire.format {
            FormatState::Text(st) => text::end_sequence(&mut wire.framing, st)?,
            FormatState::Binary => binary::end_nested(&mut wire.framing, patch)?,
            FormatState::Raw => raw::end_sequence(&mut wire.framing, patch, count)?,
        }
        Ok(result)
    }

    /// A nested mapping, written through field calls on the wire.
    pub fn mapping<R>(self, f: impl FnOnce(&mut Wire<S>) -> Result<R>) -> Result<R> {
        let wire = self.wire;
        let patch = match &mut wire.format {
            FormatState::Text(st) => {
                text::begin_mapping(&mut wire.framing, st)?;
                0
            }
            FormatState::Binary => binary::begin_nested(&mut wire.framing)?,
            FormatState::Raw => 0, // positional: entries inline, names dropped
        };
        let result = f(&mut *wire)?;
        match &mut wire.format {
            FormatState::Text(st) => text::end_mapping(&mut wire.framing, st)?,
            FormatState::Binary => binary::end_nested(&mut wire.framing, patch)?,
            FormatState::Raw => {}
        }
        Ok(result)
    }

    /// A typed object with a mapping body written through field calls.
    pub fn typed<R>(self, alias: &str, f: impl FnOnce(&mut Wire<S>) -> Result<R>) -> Result<R> {
        let wire = self.wire;
        let patch = match &mut wire.format {
            FormatState::Text(st) => {
                text::begin_typed(&mut wire.framing, st, alias)?;
                text::begin_mapping(&mut wire.framing, st)?;
                0
            }
            FormatState::Binary => {
                binary::write_type_prefix(&mut wire.framing, alias)?;
                binary::begin_nested(&mut wire.framing)?
            }
            FormatState::Raw => raw::begin_typed(&mut wire.framing, alias)?,
        };
        let result = f(&mut *wire)?;
        match &mut wire.format {
            FormatState::Text(st) => text::end_mapping(&mut wire.framing, st)?,
            FormatState::Binary => binary::end_nested(&mut wire.framing, patch)?,
            FormatState::Raw => raw::end_typed(&mut wire.framing, patch)?,
        }
        Ok(result)
    }

    /// A typed object from an explicit alias and value tree.
    pub fn typed_value(self, alias: &str, body: &Value) -> Result<()> {
        match body {
            Value::Mapping(entries) => self.typed(alias, |wire| {
                for (field, value) in entries {
                    wire.write_field(field.clone())?.value(value)?;
                }
                Ok(())
            }),
            other => {
                // non-mapping bodies skip the brace/nested wrapper
                let wire = self.wire;
                if let FormatState::Text(st) = &mut wire.format {
                    text::begin_typed(&mut wire.framing, st, alias)?;
                    return ValueOut { wire }.value(other);
                }
                match wire.wire_format() {
                    WireFormat::Binary => {
                        binary::write_type_prefix(&mut wire.framing, alias)?;
                        ValueOut { wire }.value(other)
                    }
                    WireFormat::Raw => {
                        let patch = raw::begin_typed(&mut wire.framing, alias)?;
                        ValueOut { wire: &mut *wire }.value(other)?;
                        raw::end_typed(&mut wire.framing, patch)
                    }
                    WireFormat::Text => unreachable!(),
                }
            }
        }
    }

    /// A registered user type, marshalled through its registry callbacks.
    pub fn marshallable<T: Any>(self, value: &T) -> Result<()> {
        let registry = Arc::clone(&self.wire.registry);
        let (alias, tree) = registry.to_value(value)?;
        self.typed_value(&alias, &tree)
    }

    /// Any value tree.
    pub fn value(self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.null(),
            Value::Bool(v) => self.bool(*v),
            Value::I8(v) => self.i8(*v),
            Value::I16(v) => self.i16(*v),
            Value::I32(v) => self.i32(*v),
            Value::I64(v) => self.i64(*v),
            Value::F32(v) => self.f32(*v),
            Value::F64(v) => self.f64(*v),
            Value::Text(v) => self.text(v),
            Value::Symbol(v) => self.symbol(v),
            Value::Bytes(v) => self.bytes(v),
            Value::Sequence(items) => self.sequence(|seq| {
                for item in items {
                    seq.elem()?.value(item)?;
                }
                Ok(())
            }),
            Value::Mapping(entries) => {
                // a document body is itself a mapping: at the top of the
                // body the entries go down bare, without a nested wrapper
                if self.wire.framing.buf().write_position() == self.wire.body_start {
                    let wire = self.wire;
                    for (field, value) in entries {
                        wire.write_field(field.clone())?.value(value)?;
                    }
                    Ok(())
                } else {
                    self.mapping(|wire| {
                        for (field, value) in entries {
                            wire.write_field(field.clone())?.value(value)?;
                        }
                        Ok(())
                    })
                }
            }
            Value::Typed { alias, value } => self.typed_value(alias, value),
        }
    }

    /// Write an atomically accessible 32-bit scalar and return its handle.
    pub fn bound_i32(self, initial: i32) -> Result<BoundI32<S>> {
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound scalars",
                format: "text",
            }),
            WireFormat::Binary => {
                binary::align_for_bound(&mut wire.framing, 4)?;
                wire.framing.buf_mut().write_u8(binary::INT32)?;
                let offset = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_i32_le(initial)?;
                Ok(BoundI32::new(
                    wire.store_arc(),
                    offset,
                    offset - wire.body_start,
                ))
            }
            WireFormat::Raw => {
                raw::align_for_bound(&mut wire.framing, 4)?;
                let offset = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_i32_le(initial)?;
                Ok(BoundI32::new(
                    wire.store_arc(),
                    offset,
                    offset - wire.body_start,
                ))
            }
        }
    }

    /// Write an atomically accessible 64-bit scalar and return its handle.
    pub fn bound_i64(self, initial: i64) -> Result<BoundI64<S>> {
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound scalars",
                format: "text",
            }),
            WireFormat::Binary => {
                binary::align_for_bound(&mut wire.framing, 8)?;
                wire.framing.buf_mut().write_u8(binary::INT64)?;
                let offset = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_i64_le(initial)?;
                Ok(BoundI64::new(
                    wire.store_arc(),
                    offset,
                    offset - wire.body_start,
                ))
            }
            WireFormat::Raw => {
                raw::align_for_bound(&mut wire.framing, 8)?;
                let offset = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_i64_le(initial)?;
                Ok(BoundI64::new(
                    wire.store_arc(),
                    offset,
                    offset - wire.body_start,
                ))
            }
        }
    }

    /// Write a zeroed array of atomically accessible 32-bit scalars.
    pub fn bound_i32_array(self, len: u32) -> Result<BoundI32Array<S>> {
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound arrays",
                format: "text",
            }),
            WireFormat::Binary => {
                // tag + count precede the payload
                while (wire.framing.buf().write_position() + 5) % 4 != 0 {
                    wire.framing.buf_mut().write_u8(binary::PADDING)?;
                }
                wire.framing.buf_mut().write_u8(binary::I32_ARRAY)?;
                wire.framing.buf_mut().write_u32_le(len)?;
                let base = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_slice(&vec![0u8; len as usize * 4])?;
                Ok(BoundI32Array::new(
                    wire.store_arc(),
                    base,
                    base - wire.body_start,
                    len,
                ))
            }
            WireFormat::Raw => {
                while (wire.framing.buf().write_position() + 4) % 4 != 0 {
                    wire.framing.buf_mut().write_u8(0)?;
                }
                wire.framing.buf_mut().write_u32_le(len)?;
                let base = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_slice(&vec![0u8; len as usize * 4])?;
                Ok(BoundI32Array::new(
                    wire.store_arc(),
                    base,
                    base - wire.body_start,
                    len,
                ))
            }
        }
    }

    /// Write a zeroed array of atomically accessible 64-bit scalars.
    pub fn bound_i64_array(self, len: u32) -> Result<BoundI64Array<S>> {
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound arrays",
                format: "text",
            }),
            WireFormat::Binary => {
                while (wire.framing.buf().write_position() + 5) % 8 != 0 {
                    wire.framing.buf_mut().write_u8(binary::PADDING)?;
                }
                wire.framing.buf_mut().write_u8(binary::I64_ARRAY)?;
                wire.framing.buf_mut().write_u32_le(len)?;
                let base = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_slice(&vec![0u8; len as usize * 8])?;
                Ok(BoundI64Array::new(
                    wire.store_arc(),
                    base,
                    base - wire.body_start,
                    len,
                ))
            }
            WireFormat::Raw => {
                while (wire.framing.buf().write_position() + 4) % 8 != 0 {
                    wire.framing.buf_mut().write_u8(0)?;
                }
                wire.framing.buf_mut().write_u32_le(len)?;
                let base = wire.framing.buf().write_position();
                wire.framing.buf_mut().write_slice(&vec![0u8; len as usize * 8])?;
                Ok(BoundI64Array::new(
                    wire.store_arc(),
                    base,
                    base - wire.body_start,
                    len,
                ))
            }
        }
    }
}

/// Writes sequence elements with format-appropriate separators.
pub struct SeqOut<'a, S: ByteStore> {
    wire: &'a mut Wire<S>,
    count: u32,
}

impl<'a, S: ByteStore> SeqOut<'a, S> {
    /// Begin the next element.
    pub fn elem(&mut self) -> Result<ValueOut<'_, S>> {
        self.count += 1;
        if let FormatState::Text(st) = &mut self.wire.format {
            text::next_element(&mut self.wire.framing, st)?;
        }
        Ok(ValueOut {
            wire: &mut *self.wire,
        })
    }
}
