//! Format selection and standalone rendering.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use polywire_store::{ByteStore, HeapStore};

use crate::error::{Result, WireError};
use crate::marshal::MarshalRegistry;
use crate::wire::Wire;

/// The three concrete wire layouts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// Human-readable YAML-subset text.
    Text,
    /// Self-describing tagged binary.
    Binary,
    /// Field-less fixed-layout binary.
    Raw,
}

impl WireFormat {
    /// Open a wire of this format over a store.
    pub fn wire<S: ByteStore>(self, store: Arc<S>) -> Wire<S> {
        Wire::new(store, self)
    }

    /// Pick the format of a self-describing body from its first byte: text
    /// always starts with an ASCII byte, binary with bit 7 set.
    pub fn detect(first_byte: u8) -> WireFormat {
        if first_byte < 0x80 {
            WireFormat::Text
        } else {
            WireFormat::Binary
        }
    }

    /// Render a registered type as an unframed document body.
    pub fn to_bytes<T: Any>(
        self,
        registry: &Arc<MarshalRegistry>,
        value: &T,
    ) -> Result<Vec<u8>> {
        let store = Arc::new(HeapStore::new(64 * 1024));
        let mut wire = self.wire(Arc::clone(&store)).with_registry(Arc::clone(registry));
        wire.write_value().marshallable(value)?;

        let len = wire.framing().buf().write_position() as usize;
        let mut out = vec![0u8; len];
        store.read_at(0, &mut out)?;
        Ok(out)
    }

    /// Parse an unframed document body back into a registered type.
    ///
    /// Raw bodies carry no self-description and cannot be parsed this way.
    pub fn from_bytes<T: Any>(
        self,
        registry: &Arc<MarshalRegistry>,
        bytes: &[u8],
    ) -> Result<T> {
        if self == WireFormat::Raw {
            return Err(WireError::Unsupported {
                what: "parsing without a schema",
                format: "raw",
            });
        }
        let store = Arc::new(HeapStore::new(bytes.len().max(16)));
        store.write_at(0, bytes)?;
        let mut wire = self.wire(store).with_registry(Arc::clone(registry));
        wire.framing_mut().buf_mut().set_read_limit(bytes.len() as u64);
        wire.read_value()?.marshallable()
    }

    /// Render a registered type to a file.
    pub fn to_file<T: Any>(
        self,
        registry: &Arc<MarshalRegistry>,
        path: impl AsRef<Path>,
        value: &T,
    ) -> Result<()> {
        let bytes = self.to_bytes(registry, value)?;
        std::fs::write(path, bytes)
            .map_err(|err| WireError::Malformed(format!("write failed: {err}")))
    }

    /// Parse a registered type from a file.
    pub fn from_file<T: Any>(
        self,
        registry: &Arc<MarshalRegistry>,
        path: impl AsRef<Path>,
    ) -> Result<T> {
        let bytes = std::fs::read(path)
            .map_err(|err| WireError::Malformed(format!("read failed: {err}")))?;
        self.from_bytes(registry, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_splits_on_the_high_bit() {
        assert_eq!(WireFormat::detect(b'm'), WireFormat::Text);
        assert_eq!(WireFormat::detect(b'!'), WireFormat::Text);
        assert_eq!(WireFormat::detect(b' '), WireFormat::Text);
        assert_eq!(WireFormat::detect(0xB6), WireFormat::Binary);
        assert_eq!(WireFormat::detect(0xC7), WireFormat::Binary);
    }
}
