//! Stable handles to fixed-width scalars inside committed documents.
//!
//! A bound reference captures the absolute store offset of an aligned 32- or
//! 64-bit scalar written through the codec, and performs volatile reads,
//! ordered writes, compare-and-swap, and fetch-add against it, lock-free
//! and inter-process safe wherever the underlying store's atomics are.

use std::sync::Arc;

use polywire_store::ByteStore;

use crate::error::{Result, WireError};

macro_rules! bound_scalar {
    ($name:ident, $int:ty, $uint:ty, $read:ident, $ordered:ident, $cas:ident, $add:ident) => {
        /// Atomic cursor to one fixed-width scalar in a document body.
        pub struct $name<S> {
            store: Arc<S>,
            offset: u64,
            body_offset: u64,
        }

        impl<S: ByteStore> $name<S> {
            pub(crate) fn new(store: Arc<S>, offset: u64, body_offset: u64) -> Self {
                Self {
                    store,
                    offset,
                    body_offset,
                }
            }

            /// Absolute offset within the store.
            pub fn offset(&self) -> u64 {
                self.offset
            }

            /// Offset relative to the start of the document body it was
            /// written into.
            pub fn offset_in_body(&self) -> u64 {
                self.body_offset
            }

            pub(crate) fn rebind(&mut self, offset: u64, body_offset: u64) {
                self.offset = offset;
                self.body_offset = body_offset;
            }

            pub fn volatile_get(&self) -> Result<$int> {
                Ok(self.store.$read(self.offset)? as $int)
            }

            pub fn ordered_set(&self, value: $int) -> Result<()> {
                Ok(self.store.$ordered(self.offset, value as $uint)?)
            }

            pub fn compare_and_set(&self, expected: $int, new: $int) -> Result<bool> {
                Ok(self
                    .store
                    .$cas(self.offset, expected as $uint, new as $uint)?)
            }

            /// Atomic add; returns the previous value.
            pub fn get_and_add(&self, delta: $int) -> Result<$int> {
                Ok(self.store.$add(self.offset, delta as $uint)? as $int)
            }
        }
    };
}

bound_scalar!(
    BoundI32,
    i32,
    u32,
    read_volatile_u32,
    write_ordered_u32,
    cas_u32,
    fetch_add_u32
);
bound_scalar!(
    BoundI64,
    i64,
    u64,
    read_volatile_u64,
    write_ordered_u64,
    cas_u64,
    fetch_add_u64
);

macro_rules! bound_array {
    ($name:ident, $int:ty, $width:expr, $scalar:ident) => {
        /// Atomic cursor to an array of fixed-width scalars, indexed by
        /// element.
        pub struct $name<S> {
            store: Arc<S>,
            base: u64,
            body_offset: u64,
            len: u32,
        }

        impl<S: ByteStore> $name<S> {
            pub(crate) fn new(store: Arc<S>, base: u64, body_offset: u64, len: u32) -> Self {
                Self {
                    store,
                    base,
                    body_offset,
                    len,
                }
            }

            pub fn len(&self) -> u32 {
                self.len
            }

            pub fn is_empty(&self) -> bool {
                self.len == 0
            }

            pub fn offset_in_body(&self) -> u64 {
                self.body_offset
            }

            /// A scalar handle to one element.
            pub fn at(&self, index: u32) -> Result<$scalar<S>> {
                if index >= self.len {
                    return Err(WireError::IndexOutOfBounds {
                        index,
                        len: self.len,
                    });
                }
                let offset = self.base + index as u64 * $width;
                Ok($scalar::new(
                    Arc::clone(&self.store),
                    offset,
                    self.body_offset + index as u64 * $width,
                ))
            }

            pub fn volatile_get(&self, index: u32) -> Result<$int> {
                self.at(index)?.volatile_get()
            }

            pub fn ordered_set(&self, index: u32, value: $int) -> Result<()> {
                self.at(index)?.ordered_set(value)
            }

            pub fn compare_and_set(&self, index: u32, expected: $int, new: $int) -> Result<bool> {
                self.at(index)?.compare_and_set(expected, new)
            }

            pub fn get_and_add(&self, index: u32, delta: $int) -> Result<$int> {
                self.at(index)?.get_and_add(delta)
            }
        }
    };
}

bound_array!(BoundI32Array, i32, 4, BoundI32);
bound_array!(BoundI64Array, i64, 8, BoundI64);

#[cfg(test)]
mod tests {
    use polywire_store::HeapStore;

    use super::*;

    #[test]
    fn scalar_ops_are_width_correct() {
        let store = Arc::new(HeapStore::new(64));
        let bound = BoundI64::new(Arc::clone(&store), 8, 4);

        assert_eq!(bound.volatile_get().unwrap(), 0);
        bound.ordered_set(-5).unwrap();
        assert_eq!(bound.volatile_get().unwrap(), -5);
        assert!(bound.compare_and_set(-5, 100).unwrap());
        assert!(!bound.compare_and_set(-5, 200).unwrap());
        assert_eq!(bound.get_and_add(-1).unwrap(), 100);
        assert_eq!(bound.volatile_get().unwrap(), 99);
        assert_eq!(bound.offset_in_body(), 4);
    }

    #[test]
    fn i32_wrapping_add() {
        let store = Arc::new(HeapStore::new(64));
        let bound = BoundI32::new(store, 4, 0);
        bound.ordered_set(i32::MAX).unwrap();
        assert_eq!(bound.get_and_add(1).unwrap(), i32::MAX);
        assert_eq!(bound.volatile_get().unwrap(), i32::MIN);
    }

    #[test]
    fn array_indexing_is_bounds_checked() {
        let store = Arc::new(HeapStore::new(128));
        let array = BoundI64Array::new(store, 16, 0, 4);

        array.ordered_set(3, 42).unwrap();
        assert_eq!(array.volatile_get(3).unwrap(), 42);
        assert_eq!(array.volatile_get(0).unwrap(), 0);
        assert!(matches!(
            array.volatile_get(4).unwrap_err(),
            WireError::IndexOutOfBounds { index: 4, len: 4 }
        ));
        assert_eq!(array.at(2).unwrap().offset(), 32);
    }

    #[test]
    fn concurrent_get_and_add_hands_out_distinct_values() {
        let store = Arc::new(HeapStore::new(64));
        let threads = 8;
        let per_thread = 500;

        let mut seen: Vec<i64> = std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for _ in 0..threads {
                let bound = BoundI64::new(Arc::clone(&store), 0, 0);
                handles.push(scope.spawn(move || {
                    let mut got = Vec::with_capacity(per_thread);
                    for _ in 0..per_thread {
                        got.push(bound.get_and_add(1).unwrap());
                    }
                    got
                }));
            }
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        seen.sort_unstable();
        let expected: Vec<i64> = (0..(threads * per_thread) as i64).collect();
        assert_eq!(seen, expected);

        let bound = BoundI64::new(store, 0, 0);
        assert_eq!(
            bound.volatile_get().unwrap(),
            (threads * per_thread) as i64
        );
    }
}
