//! Reader surface: fields and values consumed from a document body.
//!
//! Reads are order-independent for field-bearing formats: asking for a field
//! that is not next on the wire scans forward, remembering every skipped
//! field for later retrieval; asking for a field that was already passed
//! serves it from that buffer. Text documents are parsed once up front, so
//! every text read is served from parsed values.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
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
    /// Look up a field by identifier.
    ///
    /// Returns `Ok(None)` when the field is absent from the document; that
    /// is the missing-field sentinel, and callers supply their own default.
    /// On the field-less raw format the identifier is ignored and the next
    /// positional value returned.
    pub fn read_field(&mut self, field: impl Into<Field>) -> Result<Option<ValueIn<'_, S>>> {
        let field = field.into();
        self.ensure_text_parsed()?;

        if let Some(index) = self
            .pending
            .iter()
            .position(|(seen, _)| seen.matches(&field))
        {
            let (_, value) = self.pending.remove(index);
            return Ok(Some(ValueIn::owned(self, value)));
        }

        match self.wire_format() {
            WireFormat::Text => Ok(None),
            WireFormat::Raw => {
                if self.framing.buf().read_remaining() == 0 {
                    Ok(None)
                } else {
                    Ok(Some(ValueIn::live(self)))
                }
            }
            WireFormat::Binary => loop {
                match binary::next_field(&mut self.framing)? {
                    None => return Ok(None),
                    Some(found) if found.matches(&field) => {
                        return Ok(Some(ValueIn::live(self)));
                    }
                    Some(found) => {
                        // not the one asked for: park it for later
                        tracing::trace!(field = %found, "parking out-of-order field");
                        let value = binary::read_value(&mut self.framing)?;
                        self.pending.push((found, value));
                    }
                }
            },
        }
    }

    /// The next field in on-wire order: previously skipped fields first,
    /// then the linear remainder.
    pub fn next_field(&mut self) -> Result<Option<(Field, ValueIn<'_, S>)>> {
        self.ensure_text_parsed()?;
        if !self.pending.is_empty() {
            let (field, value) = self.pending.remove(0);
            return Ok(Some((field, ValueIn::owned(self, value))));
        }
        match self.wire_format() {
            WireFormat::Text => Ok(None),
            WireFormat::Raw => {
                if self.framing.buf().read_remaining() == 0 {
                    Ok(None)
                } else {
                    Ok(Some((Field::Anonymous, ValueIn::live(self))))
                }
            }
            WireFormat::Binary => match binary::next_field(&mut self.framing)? {
                None => Ok(None),
                Some(field) => Ok(Some((field, ValueIn::live(self)))),
            },
        }
    }

    /// Every remaining field as `(identifier, value)`, in on-wire order.
    pub fn remaining_fields(&mut self) -> Result<Vec<(Field, Value)>> {
        self.ensure_text_parsed()?;
        let mut out = std::mem::take(&mut self.pending).into_vec();
        if let FormatState::Binary = self.format {
            while let Some(field) = binary::next_field(&mut self.framing)? {
                out.push((field, binary::read_value(&mut self.framing)?));
            }
        }
        // raw has no field identity to enumerate
        Ok(out)
    }

    /// Read an anonymous value (standalone bodies, raw streams).
    pub fn read_value(&mut self) -> Result<ValueIn<'_, S>> {
        match self.wire_format() {
            WireFormat::Text => {
                self.ensure_text_parsed()?;
                let value = if self.pending.is_empty() {
                    Value::Null
                } else if self.pending.len() == 1 && self.pending[0].0 == Field::Anonymous {
                    self.pending.remove(0).1
                } else {
                    Value::Mapping(std::mem::take(&mut self.pending).into_vec())
                };
                Ok(ValueIn::owned(self, value))
            }
            WireFormat::Binary | WireFormat::Raw => Ok(ValueIn::live(self)),
        }
    }

    // Text bodies parse in one pass; all reads are then served from the
    // parsed entries.
    fn ensure_text_parsed(&mut self) -> Result<()> {
        if let FormatState::Text(_) = self.format {
            if !self.text_parsed {
                self.text_parsed = true;
                let len = self.framing.buf().read_remaining() as usize;
                let body = self.framing.buf_mut().read_to_vec(len)?;
                match text::parse_any(&body)? {
                    Value::Mapping(entries) => self.pending = entries.into(),
                    Value::Null => {}
                    other => self.pending.push((Field::Anonymous, other)),
                }
            }
        }
        Ok(())
    }
}

enum In {
    /// The cursor rests on a live on-wire value.
    Live,
    /// A value already parsed (text documents, replayed skips).
    Owned(Value),
}

/// Yields exactly one value from the document body.
pub struct ValueIn<'a, S: ByteStore> {
    wire: &'a mut Wire<S>,
    inner: In,
}

impl<'a, S: ByteStore> ValueIn<'a, S> {
    pub(crate) fn live(wire: &'a mut Wire<S>) -> Self {
        Self {
            wire,
            inner: In::Live,
        }
    }

    pub(crate) fn owned(wire: &'a mut Wire<S>, value: Value) -> Self {
        Self {
            wire,
            inner: In::Owned(value),
        }
    }

    fn mismatch(expected: &'static str, value: &Value) -> WireError {
        WireError::SchemaMismatch {
            expected,
            found: value.kind().to_string(),
        }
    }

    pub fn text(self) -> Result<String> {
        match self.inner {
            In::Owned(value) => match value {
                Value::Text(s) | Value::Symbol(s) => Ok(s),
                other => Err(Self::mismatch("string", &other)),
            },
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => binary::read_str(&mut self.wire.framing),
                WireFormat::Raw => raw::read_str(&mut self.wire.framing),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    /// An enum-like symbol; string-coded values qualify.
    pub fn symbol(self) -> Result<String> {
        self.text()
    }

    pub fn i64(self) -> Result<i64> {
        match self.inner {
            In::Owned(value) => value.as_i64().ok_or_else(|| Self::mismatch("integer", &value)),
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => binary::read_i64(&mut self.wire.framing),
                WireFormat::Raw => Ok(self.wire.framing.buf_mut().read_i64_le()?),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    pub fn i32(self) -> Result<i32> {
        if let In::Live = self.inner {
            if self.wire.wire_format() == WireFormat::Raw {
                return Ok(self.wire.framing.buf_mut().read_i32_le()?);
            }
        }
        let wide = self.i64()?;
        wide.try_into().map_err(|_| WireError::SchemaMismatch {
            expected: "int32",
            found: format!("integer {wide}"),
        })
    }

    pub fn i16(self) -> Result<i16> {
        if let In::Live = self.inner {
            if self.wire.wire_format() == WireFormat::Raw {
                return Ok(self.wire.framing.buf_mut().read_i16_le()?);
            }
        }
        let wide = self.i64()?;
        wide.try_into().map_err(|_| WireError::SchemaMismatch {
            expected: "int16",
            found: format!("integer {wide}"),
        })
    }

    pub fn i8(self) -> Result<i8> {
        if let In::Live = self.inner {
            if self.wire.wire_format() == WireFormat::Raw {
                return Ok(self.wire.framing.buf_mut().read_i8()?);
            }
        }
        let wide = self.i64()?;
        wide.try_into().map_err(|_| WireError::SchemaMismatch {
            expected: "int8",
            found: format!("integer {wide}"),
        })
    }

    pub fn f64(self) -> Result<f64> {
        match self.inner {
            In::Owned(value) => value.as_f64().ok_or_else(|| Self::mismatch("float", &value)),
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => binary::read_f64(&mut self.wire.framing),
                WireFormat::Raw => Ok(self.wire.framing.buf_mut().read_f64_le()?),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    pub fn f32(self) -> Result<f32> {
        if let In::Live = self.inner {
            if self.wire.wire_format() == WireFormat::Raw {
                return Ok(self.wire.framing.buf_mut().read_f32_le()?);
            }
        }
        Ok(self.f64()? as f32)
    }

    pub fn bool(self) -> Result<bool> {
        match self.inner {
            In::Owned(value) => value.as_bool().ok_or_else(|| Self::mismatch("bool", &value)),
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => binary::read_bool(&mut self.wire.framing),
                WireFormat::Raw => raw::read_bool(&mut self.wire.framing),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    pub fn bytes(self) -> Result<Bytes> {
        match self.inner {
            In::Owned(value) => match value {
                Value::Bytes(bytes) => Ok(bytes),
                other => Err(Self::mismatch("bytes", &other)),
            },
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => match binary::read_value(&mut self.wire.framing)? {
                    Value::Bytes(bytes) => Ok(bytes),
                    other => Err(Self::mismatch("bytes", &other)),
                },
                WireFormat::Raw => Ok(raw::read_bytes(&mut self.wire.framing)?.into()),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    /// The value as a normalised tree. Unsupported on raw (no schema on the
    /// wire to drive the parse).
    pub fn value(self) -> Result<Value> {
        match self.inner {
            In::Owned(value) => Ok(value),
            In::Live => match self.wire.wire_format() {
                WireFormat::Binary => {
                    if self.wire.framing.buf().read_remaining() == 0 {
                        return Ok(Value::Null);
                    }
                    let mut probe = [0u8; 1];
                    self.wire
                        .framing
                        .buf()
                        .read_at(self.wire.framing.buf().read_position(), &mut probe)?;
                    if binary::is_field_tag(probe[0]) {
                        // a field-structured body: the whole remainder is one
                        // mapping, skipped fields included
                        let mut entries = std::mem::take(&mut self.wire.pending).into_vec();
                        while let Some(field) = binary::next_field(&mut self.wire.framing)? {
                            entries
                                .push((field, binary::read_value(&mut self.wire.framing)?));
                        }
                        Ok(Value::Mapping(entries))
                    } else {
                        binary::read_value(&mut self.wire.framing)
                    }
                }
                WireFormat::Raw => Err(WireError::Unsupported {
                    what: "schema-less value reads",
                    format: "raw",
                }),
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    /// A typed object as `(alias, body tree)`.
    pub fn typed_value(self) -> Result<(String, Value)> {
        match self.value()? {
            Value::Typed { alias, value } => Ok((alias, *value)),
            other => Err(Self::mismatch("typed object", &other)),
        }
    }

    /// Read a typed object by driving `f` over its body fields; returns the
    /// alias alongside `f`'s result. On raw the body is consumed
    /// positionally, mirroring the writer's calls.
    pub fn typed<R>(self, f: impl FnOnce(&mut Wire<S>) -> Result<R>) -> Result<(String, R)> {
        let wire = self.wire;
        match self.inner {
            In::Owned(Value::Typed { alias, value }) => {
                // serve the body from the parsed tree: swap it into the
                // pending buffer and pinch the live window shut
                let saved_pending = std::mem::take(&mut wire.pending);
                let saved_parsed = wire.text_parsed;
                let saved_limit = wire.framing.buf().read_limit();
                wire.text_parsed = true;
                let position = wire.framing.buf().read_position();
                wire.framing.buf_mut().set_read_limit(position);
                match *value {
                    Value::Mapping(entries) => wire.pending = entries.into(),
                    other => wire.pending.push((Field::Anonymous, other)),
                }
                let result = f(wire);
                wire.pending = saved_pending;
                wire.text_parsed = saved_parsed;
                wire.framing.buf_mut().set_read_limit(saved_limit);
                Ok((alias, result?))
            }
            In::Owned(other) => Err(Self::mismatch("typed object", &other)),
            In::Live => match wire.wire_format() {
                WireFormat::Binary => {
                    let tag = wire.framing.buf_mut().read_u8()?;
                    if tag != binary::TYPE_PREFIX {
                        return Err(WireError::SchemaMismatch {
                            expected: "typed object",
                            found: format!("tag {tag:#04x}"),
                        });
                    }
                    let alias_len = binary::read_stop_bit(&mut wire.framing)? as usize;
                    let alias_bytes = wire.framing.buf_mut().read_to_vec(alias_len)?;
                    let alias = String::from_utf8(alias_bytes)
                        .map_err(|err| WireError::Malformed(format!("invalid UTF-8: {err}")))?;

                    let region = wire.framing.buf_mut().read_u8()?;
                    let body_len = match region {
                        binary::BYTES_LENGTH8 => wire.framing.buf_mut().read_u8()? as u64,
                        binary::BYTES_LENGTH16 => wire.framing.buf_mut().read_u16_le()? as u64,
                        binary::BYTES_LENGTH32 => wire.framing.buf_mut().read_u32_le()? as u64,
                        other => {
                            return Err(WireError::SchemaMismatch {
                                expected: "typed object body",
                                found: format!("tag {other:#04x}"),
                            });
                        }
                    };
                    let end = wire.framing.buf().read_position() + body_len;
                    let outer_limit = wire.framing.buf().read_limit();
                    wire.framing.buf_mut().set_read_limit(end);
                    let saved_pending = std::mem::take(&mut wire.pending);
                    let result = f(wire);
                    wire.pending = saved_pending;
                    wire.framing.buf_mut().set_read_position(end);
                    wire.framing.buf_mut().set_read_limit(outer_limit);
                    Ok((alias, result?))
                }
                WireFormat::Raw => {
                    let (alias, body_len) = raw::read_typed_prefix(&mut wire.framing)?;
                    let end = wire.framing.buf().read_position() + body_len as u64;
                    let result = f(wire);
                    wire.framing.buf_mut().set_read_position(end);
                    Ok((alias, result?))
                }
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    /// A registered user type, unmarshalled through its registry callbacks.
    pub fn marshallable<T: Any>(self) -> Result<T> {
        let registry = Arc::clone(&self.wire.registry);
        let (alias, body) = self.typed_value()?;
        registry.from_value(&alias, &body)
    }

    /// Iterate a sequence element by element.
    pub fn sequence<R>(self, f: impl FnOnce(&mut SeqIn<'_, S>) -> Result<R>) -> Result<R> {
        let wire = self.wire;
        match self.inner {
            In::Owned(Value::Sequence(items)) => {
                let mut seq = SeqIn {
                    wire,
                    source: SeqSource::Owned(items.into_iter()),
                };
                f(&mut seq)
            }
            In::Owned(other) => Err(Self::mismatch("sequence", &other)),
            In::Live => match wire.wire_format() {
                WireFormat::Binary => {
                    let tag = wire.framing.buf_mut().read_u8()?;
                    let len = match tag {
                        binary::BYTES_LENGTH8 => wire.framing.buf_mut().read_u8()? as u64,
                        binary::BYTES_LENGTH16 => wire.framing.buf_mut().read_u16_le()? as u64,
                        binary::BYTES_LENGTH32 => wire.framing.buf_mut().read_u32_le()? as u64,
                        other => {
                            return Err(WireError::SchemaMismatch {
                                expected: "sequence",
                                found: format!("tag {other:#04x}"),
                            });
                        }
                    };
                    let end = wire.framing.buf().read_position() + len;
                    let outer_limit = wire.framing.buf().read_limit();
                    wire.framing.buf_mut().set_read_limit(end);
                    let mut seq = SeqIn {
                        wire,
                        source: SeqSource::Region { end },
                    };
                    let result = f(&mut seq);
                    let wire = seq.wire;
                    wire.framing.buf_mut().set_read_position(end);
                    wire.framing.buf_mut().set_read_limit(outer_limit);
                    result
                }
                WireFormat::Raw => {
                    let remaining = raw::read_sequence_len(&mut wire.framing)?;
                    let mut seq = SeqIn {
                        wire,
                        source: SeqSource::Counted { remaining },
                    };
                    f(&mut seq)
                }
                WireFormat::Text => unreachable!("text reads are parsed up front"),
            },
        }
    }

    fn live_only(&self) -> Result<()> {
        match self.inner {
            In::Live => Ok(()),
            In::Owned(_) => Err(WireError::Unsupported {
                what: "bound scalars",
                format: "parsed values",
            }),
        }
    }

    fn locate_bound(self, width: u64, binary_tag: u8) -> Result<(Arc<S>, u64, u64)> {
        self.live_only()?;
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound scalars",
                format: "text",
            }),
            WireFormat::Binary => {
                binary::skip_bound_alignment(&mut wire.framing, width)?;
                let tag = wire.framing.buf_mut().read_u8()?;
                if tag != binary_tag {
                    return Err(WireError::SchemaMismatch {
                        expected: "bound scalar",
                        found: format!("tag {tag:#04x}"),
                    });
                }
                let offset = wire.framing.buf().read_position();
                wire.framing.buf_mut().read_skip(width)?;
                Ok((wire.store_arc(), offset, offset - wire.body_start))
            }
            WireFormat::Raw => {
                raw::skip_bound_alignment(&mut wire.framing, width)?;
                let offset = wire.framing.buf().read_position();
                wire.framing.buf_mut().read_skip(width)?;
                Ok((wire.store_arc(), offset, offset - wire.body_start))
            }
        }
    }

    /// Seek the next bound 32-bit scalar and return a handle to it.
    pub fn bound_i32(self) -> Result<BoundI32<S>> {
        let (store, offset, body_offset) = self.locate_bound(4, binary::INT32)?;
        Ok(BoundI32::new(store, offset, body_offset))
    }

    /// Seek the next bound 64-bit scalar and return a handle to it.
    pub fn bound_i64(self) -> Result<BoundI64<S>> {
        let (store, offset, body_offset) = self.locate_bound(8, binary::INT64)?;
        Ok(BoundI64::new(store, offset, body_offset))
    }

    /// Seek the next bound 32-bit scalar, updating `bound` in place.
    pub fn rebind_i32(self, bound: &mut BoundI32<S>) -> Result<()> {
        let (_, offset, body_offset) = self.locate_bound(4, binary::INT32)?;
        bound.rebind(offset, body_offset);
        Ok(())
    }

    /// Seek the next bound 64-bit scalar, updating `bound` in place.
    pub fn rebind_i64(self, bound: &mut BoundI64<S>) -> Result<()> {
        let (_, offset, body_offset) = self.locate_bound(8, binary::INT64)?;
        bound.rebind(offset, body_offset);
        Ok(())
    }

    fn locate_bound_array(
        self,
        width: u64,
        binary_tag: u8,
    ) -> Result<(Arc<S>, u64, u64, u32)> {
        self.live_only()?;
        let wire = self.wire;
        match wire.wire_format() {
            WireFormat::Text => Err(WireError::Unsupported {
                what: "bound arrays",
                format: "text",
            }),
            WireFormat::Binary => {
                loop {
                    let mut probe = [0u8; 1];
                    wire.framing
                        .buf()
                        .read_at(wire.framing.buf().read_position(), &mut probe)?;
                    if probe[0] != binary::PADDING {
                        break;
                    }
                    wire.framing.buf_mut().read_skip(1)?;
                }
                let tag = wire.framing.buf_mut().read_u8()?;
                if tag != binary_tag {
                    return Err(WireError::SchemaMismatch {
                        expected: "bound array",
                        found: format!("tag {tag:#04x}"),
                    });
                }
                let len = wire.framing.buf_mut().read_u32_le()?;
                let base = wire.framing.buf().read_position();
                wire.framing.buf_mut().read_skip(len as u64 * width)?;
                Ok((wire.store_arc(), base, base - wire.body_start, len))
            }
            WireFormat::Raw => {
                while (wire.framing.buf().read_position() + 4) % width != 0 {
                    wire.framing.buf_mut().read_skip(1)?;
                }
                let len = wire.framing.buf_mut().read_u32_le()?;
                let base = wire.framing.buf().read_position();
                wire.framing.buf_mut().read_skip(len as u64 * width)?;
                Ok((wire.store_arc(), base, base - wire.body_start, len))
            }
        }
    }

    /// Seek the next bound 32-bit array.
    pub fn bound_i32_array(self) -> Result<BoundI32Array<S>> {
        let (store, base, body_offset, len) = self.locate_bound_array(4, binary::I32_ARRAY)?;
        Ok(BoundI32Array::new(store, base, body_offset, len))
    }

    /// Seek the next bound 64-bit array.
    pub fn bound_i64_array(self) -> Result<BoundI64Array<S>> {
        let (store, base, body_offset, len) = self.locate_bound_array(8, binary::I64_ARRAY)?;
        Ok(BoundI64Array::new(store, base, body_offset, len))
    }
}

enum SeqSource {
    Owned(std::vec::IntoIter<Value>),
    Region { end: u64 },
    Counted { remaining: u32 },
}

/// Yields sequence elements one at a time.
pub struct SeqIn<'a, S: ByteStore> {
    wire: &'a mut Wire<S>,
    source: SeqSource,
}

impl<'a, S: ByteStore> SeqIn<'a, S> {
    /// The next element, or `None` at the end of the sequence.
    pub fn next(&mut self) -> Result<Option<ValueIn<'_, S>>> {
        match &mut self.source {
            SeqSource::Owned(iter) => match iter.next() {
                Some(value) => Ok(Some(ValueIn::owned(&mut *self.wire, value))),
                None => Ok(None),
            },
            SeqSource::Region { end } => {
                loop {
                    let position = self.wire.framing.buf().read_position();
                    if position >= *end {
                        return Ok(None);
                    }
                    let mut probe = [0u8; 1];
                    self.wire.framing.buf().read_at(position, &mut probe)?;
                    if probe[0] != binary::PADDING {
                        break;
                    }
                    self.wire.framing.buf_mut().read_skip(1)?;
                }
                Ok(Some(ValueIn::live(&mut *self.wire)))
            }
            SeqSource::Counted { remaining } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                *remaining -= 1;
                Ok(Some(ValueIn::live(&mut *self.wire)))
            }
        }
    }
}
