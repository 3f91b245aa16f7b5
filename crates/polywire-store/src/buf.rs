use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::store::ByteStore;

/// Cursor view over a shared [`ByteStore`].
///
/// Each `StoreBuf` carries its own read and write positions and limits;
/// several buffers over the same store give independent writers and readers
/// their own windows while contending through the store's atomics. All
/// multi-byte primitives are little-endian.
pub struct StoreBuf<S> {
    store: Arc<S>,
    read_position: u64,
    read_limit: u64,
    write_position: u64,
    write_limit: u64,
}

impl<S: ByteStore> StoreBuf<S> {
    /// Create a buffer spanning the whole store.
    pub fn new(store: Arc<S>) -> Self {
        let capacity = store.capacity();
        Self {
            store,
            read_position: 0,
            read_limit: capacity,
            write_position: 0,
            write_limit: capacity,
        }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// True when the underlying store is visible to other processes.
    pub fn shared_memory(&self) -> bool {
        self.store.shared_memory()
    }

    /// Capacity of the underlying store.
    pub fn real_capacity(&self) -> u64 {
        self.store.capacity()
    }

    pub fn read_position(&self) -> u64 {
        self.read_position
    }

    pub fn set_read_position(&mut self, position: u64) {
        self.read_position = position;
    }

    pub fn read_limit(&self) -> u64 {
        self.read_limit
    }

    pub fn set_read_limit(&mut self, limit: u64) {
        self.read_limit = limit;
    }

    pub fn write_position(&self) -> u64 {
        self.write_position
    }

    pub fn set_write_position(&mut self, position: u64) {
        self.write_position = position;
    }

    pub fn write_limit(&self) -> u64 {
        self.write_limit
    }

    pub fn set_write_limit(&mut self, limit: u64) {
        self.write_limit = limit;
    }

    /// Bytes writable before the write limit.
    pub fn write_remaining(&self) -> u64 {
        self.write_limit.saturating_sub(self.write_position)
    }

    /// Bytes readable before the read limit.
    pub fn read_remaining(&self) -> u64 {
        self.read_limit.saturating_sub(self.read_position)
    }

    /// Reset cursors to zero and widen both limits to full capacity.
    pub fn clear(&mut self) {
        let capacity = self.store.capacity();
        self.read_position = 0;
        self.read_limit = capacity;
        self.write_position = 0;
        self.write_limit = capacity;
    }

    /// Advance the write position without writing.
    pub fn write_skip(&mut self, len: u64) -> Result<()> {
        self.claim_write(len).map(|_| ())
    }

    /// Advance the read position without reading.
    pub fn read_skip(&mut self, len: u64) -> Result<()> {
        self.claim_read(len).map(|_| ())
    }

    fn claim_write(&mut self, len: u64) -> Result<u64> {
        let position = self.write_position;
        match position.checked_add(len) {
            Some(end) if end <= self.write_limit => {
                self.write_position = end;
                Ok(position)
            }
            _ => Err(StoreError::WriteOverrun {
                position,
                len,
                limit: self.write_limit,
            }),
        }
    }

    fn claim_read(&mut self, len: u64) -> Result<u64> {
        let position = self.read_position;
        match position.checked_add(len) {
            Some(end) if end <= self.read_limit => {
                self.read_position = end;
                Ok(position)
            }
            _ => Err(StoreError::ReadOverrun {
                position,
                len,
                limit: self.read_limit,
            }),
        }
    }

    pub fn write_slice(&mut self, src: &[u8]) -> Result<()> {
        let position = self.claim_write(src.len() as u64)?;
        self.store.write_at(position, src)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_slice(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_i16_le(&mut self, value: i16) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_i32_le(&mut self, value: i32) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_i64_le(&mut self, value: i64) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_f32_le(&mut self, value: f32) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn write_f64_le(&mut self, value: f64) -> Result<()> {
        self.write_slice(&value.to_le_bytes())
    }

    pub fn read_slice(&mut self, dst: &mut [u8]) -> Result<()> {
        let position = self.claim_read(dst.len() as u64)?;
        self.store.read_at(position, dst)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_slice(&mut b)?;
        Ok(b[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_slice(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_slice(&mut b)?;
        Ok(i16::from_le_bytes(b))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_slice(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_slice(&mut b)?;
        Ok(i32::from_le_bytes(b))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_slice(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_slice(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        let mut b = [0u8; 4];
        self.read_slice(&mut b)?;
        Ok(f32::from_le_bytes(b))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.read_slice(&mut b)?;
        Ok(f64::from_le_bytes(b))
    }

    /// Read `len` bytes into a fresh vector.
    pub fn read_to_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read_slice(&mut out)?;
        Ok(out)
    }

    /// Copy bytes at an absolute offset, ignoring cursors.
    pub fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        self.store.read_at(offset, dst)
    }

    /// Write bytes at an absolute offset, ignoring cursors. Used to patch
    /// length prefixes inside a reserved body.
    pub fn write_at(&self, offset: u64, src: &[u8]) -> Result<()> {
        self.store.write_at(offset, src)
    }

    /// Acquire-ordered 32-bit load at the current read position.
    pub fn peek_volatile_u32(&self) -> Result<u32> {
        self.store.read_volatile_u32(self.read_position)
    }

    /// Acquire-ordered 32-bit load at an absolute offset.
    pub fn volatile_u32(&self, offset: u64) -> Result<u32> {
        self.store.read_volatile_u32(offset)
    }

    /// Release-ordered 32-bit store at an absolute offset.
    pub fn write_ordered_u32(&self, offset: u64, value: u32) -> Result<()> {
        self.store.write_ordered_u32(offset, value)
    }

    /// 32-bit compare-and-swap at an absolute offset.
    pub fn cas_u32(&self, offset: u64, expected: u32, new: u32) -> Result<bool> {
        self.store.cas_u32(offset, expected, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapStore;

    fn buf(capacity: usize) -> StoreBuf<HeapStore> {
        StoreBuf::new(Arc::new(HeapStore::new(capacity)))
    }

    #[test]
    fn primitive_roundtrip_is_little_endian() {
        let mut b = buf(64);
        b.write_u32_le(0x0102_0304).unwrap();
        b.write_i64_le(-2).unwrap();
        b.write_f64_le(10.5).unwrap();

        let mut raw = [0u8; 4];
        b.read_at(0, &mut raw).unwrap();
        assert_eq!(raw, [0x04, 0x03, 0x02, 0x01]);

        assert_eq!(b.read_u32_le().unwrap(), 0x0102_0304);
        assert_eq!(b.read_i64_le().unwrap(), -2);
        assert_eq!(b.read_f64_le().unwrap(), 10.5);
    }

    #[test]
    fn write_limit_is_enforced() {
        let mut b = buf(64);
        b.set_write_limit(4);
        b.write_u32_le(1).unwrap();
        let err = b.write_u8(0).unwrap_err();
        assert!(matches!(err, StoreError::WriteOverrun { .. }));
        assert_eq!(b.write_remaining(), 0);
    }

    #[test]
    fn read_limit_is_enforced() {
        let mut b = buf(64);
        b.set_read_limit(2);
        b.read_u16_le().unwrap();
        let err = b.read_u8().unwrap_err();
        assert!(matches!(err, StoreError::ReadOverrun { .. }));
    }

    #[test]
    fn clear_resets_cursors_and_limits() {
        let mut b = buf(32);
        b.write_slice(b"abcdef").unwrap();
        b.set_write_limit(8);
        b.read_skip(3).unwrap();
        b.clear();
        assert_eq!(b.write_position(), 0);
        assert_eq!(b.read_position(), 0);
        assert_eq!(b.write_limit(), 32);
        assert_eq!(b.read_limit(), 32);
    }

    #[test]
    fn skip_moves_cursors() {
        let mut b = buf(16);
        b.write_skip(4).unwrap();
        assert_eq!(b.write_position(), 4);
        b.read_skip(2).unwrap();
        assert_eq!(b.read_position(), 2);
        assert!(b.write_skip(100).is_err());
    }

    #[test]
    fn independent_views_share_storage() {
        let store = Arc::new(HeapStore::new(32));
        let mut writer = StoreBuf::new(Arc::clone(&store));
        let mut reader = StoreBuf::new(store);

        writer.write_slice(b"shared").unwrap();
        let mut out = [0u8; 6];
        reader.read_slice(&mut out).unwrap();
        assert_eq!(&out, b"shared");
    }
}
