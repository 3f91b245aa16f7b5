//! Self-describing binary format.
//!
//! A tagged stream of control bytes. Tags below 0x80 are small non-negative
//! integers; field names up to 31 bytes ride on `0xC0 + len`, strings up to
//! 15 bytes on `0xE0 + len`; longer identifiers use the any-length tags with
//! stop-bit lengths. Numbers are written in their smallest lossless
//! encoding, so the first byte of a binary body always has bit 7 set for a
//! field-structured document, which is what format discovery keys on.
//! `0x00` and `0x8F` are padding no-ops wherever a field tag is expected.

use polywire_frame::Framing;
use polywire_store::ByteStore;

use crate::error::{Result, WireError};
use crate::value::{Field, Value};

// Length-prefixed nested bodies (sequences, typed-object payloads).
pub(crate) const BYTES_LENGTH8: u8 = 0x80;
pub(crate) const BYTES_LENGTH16: u8 = 0x81;
pub(crate) const BYTES_LENGTH32: u8 = 0x82;
// Byte and word arrays.
pub(crate) const U8_ARRAY: u8 = 0x8A;
pub(crate) const I64_ARRAY: u8 = 0x8B;
pub(crate) const I32_ARRAY: u8 = 0x8C;
// Single-byte padding, a no-op in field position.
pub(crate) const PADDING: u8 = 0x8F;
pub(crate) const FLOAT32: u8 = 0x90;
pub(crate) const FLOAT64: u8 = 0x91;
// Integers, little-endian, unsigned then signed.
pub(crate) const UINT8: u8 = 0xA1;
pub(crate) const UINT16: u8 = 0xA2;
pub(crate) const UINT32: u8 = 0xA3;
pub(crate) const INT8: u8 = 0xA4;
pub(crate) const INT16: u8 = 0xA5;
pub(crate) const INT32: u8 = 0xA6;
pub(crate) const INT64: u8 = 0xA7;
pub(crate) const FALSE: u8 = 0xB0;
pub(crate) const TRUE: u8 = 0xB1;
// Typed object: stop-bit alias length, alias bytes, nested body follows.
pub(crate) const TYPE_PREFIX: u8 = 0xB6;
// Any-length forms, stop-bit length prefixed.
pub(crate) const FIELD_NAME_ANY: u8 = 0xB7;
pub(crate) const STRING_ANY: u8 = 0xB8;
pub(crate) const FIELD_NUMBER: u8 = 0xB9;
pub(crate) const NULL: u8 = 0xBB;
// Short forms carrying their length in the tag.
pub(crate) const FIELD_NAME0: u8 = 0xC0;
pub(crate) const FIELD_NAME_MAX_LEN: u8 = 0x1F;
pub(crate) const STRING0: u8 = 0xE0;
pub(crate) const STRING_MAX_LEN: u8 = 0x0F;

fn buf<'a, S: ByteStore>(f: &'a mut Framing<S>) -> &'a mut polywire_store::StoreBuf<S> {
    f.buf_mut()
}

pub(crate) fn write_stop_bit<S: ByteStore>(f: &mut Framing<S>, mut n: u64) -> Result<()> {
    while n >= 0x80 {
        buf(f).write_u8((n & 0x7F) as u8 | 0x80)?;
        n >>= 7;
    }
    buf(f).write_u8(n as u8)?;
    Ok(())
}

pub(crate) fn read_stop_bit<S: ByteStore>(f: &mut Framing<S>) -> Result<u64> {
    let mut shift = 0u32;
    let mut out = 0u64;
    loop {
        let byte = buf(f).read_u8()?;
        out |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift > 63 {
            return Err(WireError::Malformed("stop-bit length overflow".into()));
        }
    }
}

pub(crate) fn write_field<S: ByteStore>(f: &mut Framing<S>, field: &Field) -> Result<()> {
    match field {
        Field::Named(name) => {
            let bytes = name.as_bytes();
            if bytes.len() <= FIELD_NAME_MAX_LEN as usize {
                buf(f).write_u8(FIELD_NAME0 + bytes.len() as u8)?;
            } else {
                buf(f).write_u8(FIELD_NAME_ANY)?;
                write_stop_bit(f, bytes.len() as u64)?;
            }
            buf(f).write_slice(bytes)?;
        }
        Field::Ordinal(ordinal) => {
            buf(f).write_u8(FIELD_NUMBER)?;
            write_stop_bit(f, *ordinal as u64)?;
        }
        Field::Anonymous => {}
    }
    Ok(())
}

pub(crate) fn write_str<S: ByteStore>(f: &mut Framing<S>, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() <= STRING_MAX_LEN as usize {
        buf(f).write_u8(STRING0 + bytes.len() as u8)?;
    } else {
        buf(f).write_u8(STRING_ANY)?;
        write_stop_bit(f, bytes.len() as u64)?;
    }
    buf(f).write_slice(bytes)?;
    Ok(())
}

/// Smallest lossless encoding: the tag byte itself for 0..=127, then the
/// narrowest unsigned form, then the narrowest signed form.
pub(crate) fn write_i64<S: ByteStore>(f: &mut Framing<S>, value: i64) -> Result<()> {
    if (0..=0x7F).contains(&value) {
        return Ok(buf(f).write_u8(value as u8)?);
    }
    if value >= 0 {
        if value <= u8::MAX as i64 {
            buf(f).write_u8(UINT8)?;
            buf(f).write_u8(value as u8)?;
        } else if value <= u16::MAX as i64 {
            buf(f).write_u8(UINT16)?;
            buf(f).write_u16_le(value as u16)?;
        } else if value <= u32::MAX as i64 {
            buf(f).write_u8(UINT32)?;
            buf(f).write_u32_le(value as u32)?;
        } else {
            buf(f).write_u8(INT64)?;
            buf(f).write_i64_le(value)?;
        }
    } else if value >= i8::MIN as i64 {
        buf(f).write_u8(INT8)?;
        buf(f).write_i8(value as i8)?;
    } else if value >= i16::MIN as i64 {
        buf(f).write_u8(INT16)?;
        buf(f).write_i16_le(value as i16)?;
    } else if value >= i32::MIN as i64 {
        buf(f).write_u8(INT32)?;
        buf(f).write_i32_le(value as i32)?;
    } else {
        buf(f).write_u8(INT64)?;
        buf(f).write_i64_le(value)?;
    }
    Ok(())
}

pub(crate) fn write_f64<S: ByteStore>(f: &mut Framing<S>, value: f64) -> Result<()> {
    let narrowed = value as f32;
    if narrowed as f64 == value {
        buf(f).write_u8(FLOAT32)?;
        buf(f).write_f32_le(narrowed)?;
    } else {
        buf(f).write_u8(FLOAT64)?;
        buf(f).write_f64_le(value)?;
    }
    Ok(())
}

pub(crate) fn write_f32<S: ByteStore>(f: &mut Framing<S>, value: f32) -> Result<()> {
    buf(f).write_u8(FLOAT32)?;
    buf(f).write_f32_le(value)?;
    Ok(())
}

pub(crate) fn write_bool<S: ByteStore>(f: &mut Framing<S>, value: bool) -> Result<()> {
    Ok(buf(f).write_u8(if value { TRUE } else { FALSE })?)
}

pub(crate) fn write_null<S: ByteStore>(f: &mut Framing<S>) -> Result<()> {
    Ok(buf(f).write_u8(NULL)?)
}

pub(crate) fn write_bytes<S: ByteStore>(f: &mut Framing<S>, bytes: &[u8]) -> Result<()> {
    buf(f).write_u8(U8_ARRAY)?;
    buf(f).write_u32_le(bytes.len() as u32)?;
    buf(f).write_slice(bytes)?;
    Ok(())
}

/// Open a `BYTES_LENGTH32` region; returns the offset of the length word to
/// patch on close.
pub(crate) fn begin_nested<S: ByteStore>(f: &mut Framing<S>) -> Result<u64> {
    buf(f).write_u8(BYTES_LENGTH32)?;
    let at = buf(f).write_position();
    buf(f).write_u32_le(0)?;
    Ok(at)
}

pub(crate) fn end_nested<S: ByteStore>(f: &mut Framing<S>, length_at: u64) -> Result<()> {
    let len = buf(f).write_position() - length_at - 4;
    buf(f).write_at(length_at, &(len as u32).to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_type_prefix<S: ByteStore>(f: &mut Framing<S>, alias: &str) -> Result<()> {
    buf(f).write_u8(TYPE_PREFIX)?;
    write_stop_bit(f, alias.len() as u64)?;
    buf(f).write_slice(alias.as_bytes())?;
    Ok(())
}

/// Emit `PADDING` bytes until a `width`-byte payload written after a
/// one-byte tag lands naturally aligned.
pub(crate) fn align_for_bound<S: ByteStore>(f: &mut Framing<S>, width: u64) -> Result<()> {
    while (buf(f).write_position() + 1) % width != 0 {
        buf(f).write_u8(PADDING)?;
    }
    Ok(())
}

fn read_exact_str<S: ByteStore>(f: &mut Framing<S>, len: usize) -> Result<String> {
    let bytes = buf(f).read_to_vec(len)?;
    String::from_utf8(bytes).map_err(|err| WireError::Malformed(format!("invalid UTF-8: {err}")))
}

/// Decode the next field token. Skips padding. Returns `None` at the end of
/// the window or when the next tag is not a field token (the document is not
/// field-structured past this point).
pub(crate) fn next_field<S: ByteStore>(f: &mut Framing<S>) -> Result<Option<Field>> {
    loop {
        if f.buf().read_remaining() == 0 {
            return Ok(None);
        }
        let position = f.buf().read_position();
        let tag = buf(f).read_u8()?;
        match tag {
            0x00 | PADDING => continue,
            t if (FIELD_NAME0..=FIELD_NAME0 + FIELD_NAME_MAX_LEN).contains(&t) => {
                let name = read_exact_str(f, (t - FIELD_NAME0) as usize)?;
                return Ok(Some(Field::Named(name)));
            }
            FIELD_NAME_ANY => {
                let len = read_stop_bit(f)? as usize;
                let name = read_exact_str(f, len)?;
                return Ok(Some(Field::Named(name)));
            }
            FIELD_NUMBER => {
                let ordinal = read_stop_bit(f)?;
                return Ok(Some(Field::Ordinal(ordinal as u32)));
            }
            _ => {
                buf(f).set_read_position(position);
                return Ok(None);
            }
        }
    }
}

/// Parse the next value into the normalised `Value` tree.
pub(crate) fn read_value<S: ByteStore>(f: &mut Framing<S>) -> Result<Value> {
    let tag = buf(f).read_u8()?;
    match tag {
        0x00..=0x7F => Ok(Value::I64(tag as i64)),
        BYTES_LENGTH8 => {
            let len = buf(f).read_u8()? as u64;
            read_nested(f, len)
        }
        BYTES_LENGTH16 => {
            let len = buf(f).read_u16_le()? as u64;
            read_nested(f, len)
        }
        BYTES_LENGTH32 => {
            let len = buf(f).read_u32_le()? as u64;
            read_nested(f, len)
        }
        U8_ARRAY => {
            let len = buf(f).read_u32_le()? as usize;
            Ok(Value::Bytes(buf(f).read_to_vec(len)?.into()))
        }
        I64_ARRAY => {
            // the writer aligned the payload; the tag's padding was consumed
            // on the way here
            let len = buf(f).read_u32_le()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(Value::I64(buf(f).read_i64_le()?));
            }
            Ok(Value::Sequence(items))
        }
        I32_ARRAY => {
            let len = buf(f).read_u32_le()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(Value::I64(buf(f).read_i32_le()? as i64));
            }
            Ok(Value::Sequence(items))
        }
        PADDING => read_value(f),
        FLOAT32 => Ok(Value::F64(buf(f).read_f32_le()? as f64)),
        FLOAT64 => Ok(Value::F64(buf(f).read_f64_le()?)),
        UINT8 => Ok(Value::I64(buf(f).read_u8()? as i64)),
        UINT16 => Ok(Value::I64(buf(f).read_u16_le()? as i64)),
        UINT32 => Ok(Value::I64(buf(f).read_u32_le()? as i64)),
        INT8 => Ok(Value::I64(buf(f).read_i8()? as i64)),
        INT16 => Ok(Value::I64(buf(f).read_i16_le()? as i64)),
        INT32 => Ok(Value::I64(buf(f).read_i32_le()? as i64)),
        INT64 => Ok(Value::I64(buf(f).read_i64_le()?)),
        FALSE => Ok(Value::Bool(false)),
        TRUE => Ok(Value::Bool(true)),
        TYPE_PREFIX => {
            let len = read_stop_bit(f)? as usize;
            let alias = read_exact_str(f, len)?;
            let body = read_value(f)?;
            Ok(Value::Typed {
                alias,
                value: Box::new(body),
            })
        }
        STRING_ANY => {
            let len = read_stop_bit(f)? as usize;
            Ok(Value::Text(read_exact_str(f, len)?))
        }
        t if (STRING0..=STRING0 + STRING_MAX_LEN).contains(&t) => {
            Ok(Value::Text(read_exact_str(f, (t - STRING0) as usize)?))
        }
        NULL => Ok(Value::Null),
        other => Err(WireError::Malformed(format!(
            "unexpected tag {other:#04x} in value position"
        ))),
    }
}

// A nested region holds either a mapping (first tag is a field token) or a
// sequence of values.
fn read_nested<S: ByteStore>(f: &mut Framing<S>, len: u64) -> Result<Value> {
    let end = f.buf().read_position() + len;
    let outer_limit = f.buf().read_limit();
    if end > outer_limit {
        return Err(WireError::Malformed(format!(
            "nested body of {len} bytes overruns the document"
        )));
    }
    f.buf_mut().set_read_limit(end);

    let result = (|| {
        let is_mapping = if f.buf().read_remaining() == 0 {
            true // empty region reads as an empty mapping
        } else {
            let mut probe = [0u8; 1];
            f.buf().read_at(f.buf().read_position(), &mut probe)?;
            is_field_tag(probe[0])
        };
        if is_mapping {
            let mut entries = Vec::new();
            while let Some(field) = next_field(f)? {
                entries.push((field, read_value(f)?));
            }
            // stray non-field content would leave the region half-read
            if f.buf().read_remaining() > 0 {
                return Err(WireError::Malformed(
                    "mixed field and bare content in nested body".into(),
                ));
            }
            Ok(Value::Mapping(entries))
        } else {
            let mut items = Vec::new();
            while f.buf().read_remaining() > 0 {
                let mut probe = [0u8; 1];
                f.buf().read_at(f.buf().read_position(), &mut probe)?;
                if probe[0] == PADDING {
                    f.buf_mut().read_skip(1)?;
                    continue;
                }
                items.push(read_value(f)?);
            }
            Ok(Value::Sequence(items))
        }
    })();

    f.buf_mut().set_read_position(end);
    f.buf_mut().set_read_limit(outer_limit);
    result
}

pub(crate) fn is_field_tag(tag: u8) -> bool {
    (FIELD_NAME0..=FIELD_NAME0 + FIELD_NAME_MAX_LEN).contains(&tag)
        || tag == FIELD_NAME_ANY
        || tag == FIELD_NUMBER
}

/// Step over padding so the cursor rests on the tag of an aligned bound
/// scalar.
pub(crate) fn skip_bound_alignment<S: ByteStore>(f: &mut Framing<S>, width: u64) -> Result<()> {
    while (f.buf().read_position() + 1) % width != 0 {
        let tag = buf(f).read_u8()?;
        if tag != PADDING && tag != 0x00 {
            return Err(WireError::Malformed(format!(
                "expected padding before aligned value, found {tag:#04x}"
            )));
        }
    }
    Ok(())
}

// Typed numeric reads tolerate any lossless widening.
pub(crate) fn read_i64<S: ByteStore>(f: &mut Framing<S>) -> Result<i64> {
    let value = read_value(f)?;
    value.as_i64().ok_or_else(|| WireError::SchemaMismatch {
        expected: "integer",
        found: value.kind().to_string(),
    })
}

pub(crate) fn read_f64<S: ByteStore>(f: &mut Framing<S>) -> Result<f64> {
    let value = read_value(f)?;
    value.as_f64().ok_or_else(|| WireError::SchemaMismatch {
        expected: "float",
        found: value.kind().to_string(),
    })
}

pub(crate) fn read_str<S: ByteStore>(f: &mut Framing<S>) -> Result<String> {
    let value = read_value(f)?;
    match value {
        Value::Text(s) | Value::Symbol(s) => Ok(s),
        other => Err(WireError::SchemaMismatch {
            expected: "string",
            found: other.kind().to_string(),
        }),
    }
}

pub(crate) fn read_bool<S: ByteStore>(f: &mut Framing<S>) -> Result<bool> {
    let value = read_value(f)?;
    value.as_bool().ok_or_else(|| WireError::SchemaMismatch {
        expected: "bool",
        found: value.kind().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use polywire_store::HeapStore;

    use super::*;

    fn open_framing() -> (Framing<HeapStore>, u64) {
        let mut f = Framing::new(Arc::new(HeapStore::new(4096)));
        let pos = f
            .write_header(None, Duration::from_secs(1), None)
            .unwrap();
        (f, pos)
    }

    fn written(f: &Framing<HeapStore>, pos: u64) -> Vec<u8> {
        let start = pos + 4;
        let len = (f.buf().write_position() - start) as usize;
        let mut out = vec![0u8; len];
        f.buf().read_at(start, &mut out).unwrap();
        out
    }

    fn rewind(f: &mut Framing<HeapStore>, pos: u64) {
        let end = f.buf().write_position();
        f.buf_mut().set_read_position(pos + 4);
        f.buf_mut().set_read_limit(end);
    }

    #[test]
    fn small_ints_are_one_byte() {
        let (mut f, pos) = open_framing();
        write_i64(&mut f, 0).unwrap();
        write_i64(&mut f, 1).unwrap();
        write_i64(&mut f, 127).unwrap();
        assert_eq!(written(&f, pos), vec![0x00, 0x01, 0x7F]);

        rewind(&mut f, pos);
        assert_eq!(read_i64(&mut f).unwrap(), 0);
        assert_eq!(read_i64(&mut f).unwrap(), 1);
        assert_eq!(read_i64(&mut f).unwrap(), 127);
    }

    #[test]
    fn integers_take_their_narrowest_form() {
        let (mut f, pos) = open_framing();
        write_i64(&mut f, 200).unwrap();
        write_i64(&mut f, 60_000).unwrap();
        write_i64(&mut f, 1_234_567_890).unwrap();
        write_i64(&mut f, -2).unwrap();
        write_i64(&mut f, -40_000).unwrap();
        write_i64(&mut f, i64::MIN).unwrap();

        let bytes = written(&f, pos);
        assert_eq!(bytes[0], UINT8);
        assert_eq!(bytes[2], UINT16);
        assert_eq!(&bytes[5..10], &[UINT32, 0xD2, 0x02, 0x96, 0x49]);
        assert_eq!(bytes[10], INT8);
        assert_eq!(bytes[12], INT16);
        assert_eq!(bytes[15], INT64);

        rewind(&mut f, pos);
        for expected in [200, 60_000, 1_234_567_890, -2, -40_000, i64::MIN] {
            assert_eq!(read_i64(&mut f).unwrap(), expected);
        }
    }

    #[test]
    fn floats_narrow_when_lossless() {
        let (mut f, pos) = open_framing();
        write_f64(&mut f, 10.5).unwrap();
        write_f64(&mut f, 0.1).unwrap();

        let bytes = written(&f, pos);
        assert_eq!(&bytes[..5], &[FLOAT32, 0x00, 0x00, 0x28, 0x41]);
        assert_eq!(bytes[5], FLOAT64);

        rewind(&mut f, pos);
        assert_eq!(read_f64(&mut f).unwrap(), 10.5);
        assert_eq!(read_f64(&mut f).unwrap(), 0.1);
    }

    #[test]
    fn short_and_long_identifiers() {
        let long_name = "a".repeat(40);
        let long_str = "b".repeat(20);

        let (mut f, pos) = open_framing();
        write_field(&mut f, &Field::named("price")).unwrap();
        write_str(&mut f, "short").unwrap();
        write_field(&mut f, &Field::named(long_name.clone())).unwrap();
        write_str(&mut f, &long_str).unwrap();
        write_field(&mut f, &Field::Ordinal(300)).unwrap();
        write_i64(&mut f, 7).unwrap();

        let bytes = written(&f, pos);
        assert_eq!(bytes[0], FIELD_NAME0 + 5);
        assert_eq!(bytes[6], STRING0 + 5);

        rewind(&mut f, pos);
        assert_eq!(next_field(&mut f).unwrap(), Some(Field::named("price")));
        assert_eq!(read_str(&mut f).unwrap(), "short");
        assert_eq!(next_field(&mut f).unwrap(), Some(Field::named(long_name)));
        assert_eq!(read_str(&mut f).unwrap(), long_str);
        assert_eq!(next_field(&mut f).unwrap(), Some(Field::Ordinal(300)));
        assert_eq!(read_i64(&mut f).unwrap(), 7);
        assert_eq!(next_field(&mut f).unwrap(), None);
    }

    #[test]
    fn nested_region_reads_back_as_mapping() {
        let (mut f, pos) = open_framing();
        let patch = begin_nested(&mut f).unwrap();
        write_field(&mut f, &Field::named("a")).unwrap();
        write_i64(&mut f, 1).unwrap();
        write_field(&mut f, &Field::named("b")).unwrap();
        write_str(&mut f, "two").unwrap();
        end_nested(&mut f, patch).unwrap();

        rewind(&mut f, pos);
        let value = read_value(&mut f).unwrap();
        assert_eq!(
            value,
            Value::mapping([("a", Value::I64(1)), ("b", Value::Text("two".into()))])
        );
    }

    #[test]
    fn nested_region_of_values_reads_back_as_sequence() {
        let (mut f, pos) = open_framing();
        let patch = begin_nested(&mut f).unwrap();
        write_i64(&mut f, 300).unwrap();
        write_str(&mut f, "x").unwrap();
        write_bool(&mut f, true).unwrap();
        end_nested(&mut f, patch).unwrap();

        rewind(&mut f, pos);
        assert_eq!(
            read_value(&mut f).unwrap(),
            Value::Sequence(vec![
                Value::I64(300),
                Value::Text("x".into()),
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn typed_object_matches_reference_encoding() {
        let (mut f, pos) = open_framing();
        write_type_prefix(&mut f, "TestMarshallable").unwrap();
        let patch = begin_nested(&mut f).unwrap();
        write_field(&mut f, &Field::named("name")).unwrap();
        write_str(&mut f, "name").unwrap();
        write_field(&mut f, &Field::named("count")).unwrap();
        write_i64(&mut f, 1).unwrap();
        end_nested(&mut f, patch).unwrap();

        let expected: Vec<u8> = vec![
            0xB6, 0x10, 0x54, 0x65, 0x73, 0x74, 0x4D, 0x61, 0x72, 0x73, 0x68, 0x61, 0x6C, 0x6C,
            0x61, 0x62, 0x6C, 0x65, 0x82, 0x11, 0x00, 0x00, 0x00, 0xC4, 0x6E, 0x61, 0x6D, 0x65,
            0xE4, 0x6E, 0x61, 0x6D, 0x65, 0xC5, 0x63, 0x6F, 0x75, 0x6E, 0x74, 0x01,
        ];
        assert_eq!(written(&f, pos), expected);

        rewind(&mut f, pos);
        let value = read_value(&mut f).unwrap();
        assert_eq!(
            value,
            Value::typed(
                "TestMarshallable",
                Value::mapping([
                    ("name", Value::Text("name".into())),
                    ("count", Value::I64(1)),
                ])
            )
        );
    }

    #[test]
    fn padding_is_skipped_in_field_position() {
        let (mut f, pos) = open_framing();
        write_field(&mut f, &Field::named("v")).unwrap();
        write_i64(&mut f, 5).unwrap();
        f.buf_mut().write_u8(PADDING).unwrap();
        f.buf_mut().write_u8(0x00).unwrap();
        write_field(&mut f, &Field::named("w")).unwrap();
        write_i64(&mut f, 6).unwrap();

        rewind(&mut f, pos);
        assert_eq!(next_field(&mut f).unwrap(), Some(Field::named("v")));
        assert_eq!(read_i64(&mut f).unwrap(), 5);
        assert_eq!(next_field(&mut f).unwrap(), Some(Field::named("w")));
        assert_eq!(read_i64(&mut f).unwrap(), 6);
        assert_eq!(next_field(&mut f).unwrap(), None);
    }

    #[test]
    fn type_coercion_errors_name_both_sides() {
        let (mut f, pos) = open_framing();
        write_str(&mut f, "not a number").unwrap();

        rewind(&mut f, pos);
        let err = read_i64(&mut f).unwrap_err();
        assert!(matches!(
            err,
            WireError::SchemaMismatch {
                expected: "integer",
                ..
            }
        ));
    }
}
