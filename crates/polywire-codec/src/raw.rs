//! Field-less raw binary format.
//!
//! Values appear strictly in the order agreed between writer and reader;
//! nothing on the wire identifies fields or types, so reads are positional
//! and width-faithful. Strings carry a one-byte length (`0xFF` escapes to a
//! two-byte little-endian length), sequences a four-byte element count,
//! typed objects a length-prefixed alias and a four-byte body length.

use polywire_frame::Framing;
use polywire_store::ByteStore;

use crate::error::{Result, WireError};

/// Marker byte escaping to the u16 string-length form.
const LONG_STRING: u8 = 0xFF;

fn buf<'a, S: ByteStore>(f: &'a mut Framing<S>) -> &'a mut polywire_store::StoreBuf<S> {
    f.buf_mut()
}

pub(crate) fn write_str<S: ByteStore>(f: &mut Framing<S>, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() < LONG_STRING as usize {
        buf(f).write_u8(bytes.len() as u8)?;
    } else if bytes.len() <= u16::MAX as usize {
        buf(f).write_u8(LONG_STRING)?;
        buf(f).write_u16_le(bytes.len() as u16)?;
    } else {
        return Err(WireError::Unsupported {
            what: "strings longer than 65535 bytes",
            format: "raw",
        });
    }
    buf(f).write_slice(bytes)?;
    Ok(())
}

pub(crate) fn read_str<S: ByteStore>(f: &mut Framing<S>) -> Result<String> {
    let short = buf(f).read_u8()?;
    let len = if short == LONG_STRING {
        buf(f).read_u16_le()? as usize
    } else {
        short as usize
    };
    let bytes = buf(f).read_to_vec(len)?;
    String::from_utf8(bytes).map_err(|err| WireError::Malformed(format!("invalid UTF-8: {err}")))
}

pub(crate) fn write_bool<S: ByteStore>(f: &mut Framing<S>, value: bool) -> Result<()> {
    Ok(buf(f).write_u8(value as u8)?)
}

pub(crate) fn read_bool<S: ByteStore>(f: &mut Framing<S>) -> Result<bool> {
    match buf(f).read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WireError::Malformed(format!(
            "boolean byte must be 0 or 1, found {other:#04x}"
        ))),
    }
}

pub(crate) fn write_bytes<S: ByteStore>(f: &mut Framing<S>, bytes: &[u8]) -> Result<()> {
    buf(f).write_u32_le(bytes.len() as u32)?;
    buf(f).write_slice(bytes)?;
    Ok(())
}

pub(crate) fn read_bytes<S: ByteStore>(f: &mut Framing<S>) -> Result<Vec<u8>> {
    let len = buf(f).read_u32_le()? as usize;
    Ok(buf(f).read_to_vec(len)?)
}

/// Open a sequence: writes a placeholder element count, patched on close.
pub(crate) fn begin_sequence<S: ByteStore>(f: &mut Framing<S>) -> Result<u64> {
    let at = buf(f).write_position();
    buf(f).write_u32_le(0)?;
    Ok(at)
}

pub(crate) fn end_sequence<S: ByteStore>(
    f: &mut Framing<S>,
    count_at: u64,
    count: u32,
) -> Result<()> {
    buf(f).write_at(count_at, &count.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_sequence_len<S: ByteStore>(f: &mut Framing<S>) -> Result<u32> {
    Ok(buf(f).read_u32_le()?)
}

/// Open a typed object: alias, then a placeholder body length.
pub(crate) fn begin_typed<S: ByteStore>(f: &mut Framing<S>, alias: &str) -> Result<u64> {
    write_str(f, alias)?;
    let at = buf(f).write_position();
    buf(f).write_u32_le(0)?;
    Ok(at)
}

pub(crate) fn end_typed<S: ByteStore>(f: &mut Framing<S>, length_at: u64) -> Result<()> {
    let len = buf(f).write_position() - length_at - 4;
    buf(f).write_at(length_at, &(len as u32).to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_typed_prefix<S: ByteStore>(f: &mut Framing<S>) -> Result<(String, u32)> {
    let alias = read_str(f)?;
    let len = buf(f).read_u32_le()?;
    Ok((alias, len))
}

/// Zero-fill up to the next `width`-byte boundary so an atomically accessed
/// scalar lands naturally aligned. The reader computes the same skip from
/// its own cursor.
pub(crate) fn align_for_bound<S: ByteStore>(f: &mut Framing<S>, width: u64) -> Result<()> {
    while buf(f).write_position() % width != 0 {
        buf(f).write_u8(0)?;
    }
    Ok(())
}

pub(crate) fn skip_bound_alignment<S: ByteStore>(f: &mut Framing<S>, width: u64) -> Result<()> {
    while f.buf().read_position() % width != 0 {
        buf(f).read_u8()?;
    }
    Ok(())
}
