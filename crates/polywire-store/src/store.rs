use crate::error::Result;

/// A random-access bounded byte buffer with lock-free 32- and 64-bit atomics.
///
/// Implementations may back the region with heap memory, a memory-mapped
/// file, or any storage whose atomics are inter-process safe. Multi-byte
/// primitive values are little-endian. Atomic operations require natural
/// alignment of the target offset.
///
/// Plain `read_at`/`write_at` access is unsynchronised: callers must hold
/// exclusive ownership of the touched region (for example, a reserved
/// document body between reservation and commit), or have acquired read
/// visibility through an atomic load.
pub trait ByteStore: Send + Sync + 'static {
    /// Usable capacity in bytes.
    fn capacity(&self) -> u64;

    /// True when the region is visible to other processes.
    fn shared_memory(&self) -> bool;

    /// Copy bytes out of the store.
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<()>;

    /// Copy bytes into the store.
    fn write_at(&self, offset: u64, src: &[u8]) -> Result<()>;

    /// Acquire-ordered 32-bit load.
    fn read_volatile_u32(&self, offset: u64) -> Result<u32>;

    /// Sequentially consistent 32-bit store.
    fn write_volatile_u32(&self, offset: u64, value: u32) -> Result<()>;

    /// Release-ordered 32-bit store, pairing with [`read_volatile_u32`].
    ///
    /// [`read_volatile_u32`]: ByteStore::read_volatile_u32
    fn write_ordered_u32(&self, offset: u64, value: u32) -> Result<()>;

    /// Single 32-bit compare-and-swap. Returns whether the swap happened.
    fn cas_u32(&self, offset: u64, expected: u32, new: u32) -> Result<bool>;

    /// Atomic 32-bit add. Returns the previous value.
    fn fetch_add_u32(&self, offset: u64, delta: u32) -> Result<u32>;

    /// Acquire-ordered 64-bit load.
    fn read_volatile_u64(&self, offset: u64) -> Result<u64>;

    /// Sequentially consistent 64-bit store.
    fn write_volatile_u64(&self, offset: u64, value: u64) -> Result<()>;

    /// Release-ordered 64-bit store.
    fn write_ordered_u64(&self, offset: u64, value: u64) -> Result<()>;

    /// Single 64-bit compare-and-swap. Returns whether the swap happened.
    fn cas_u64(&self, offset: u64, expected: u64, new: u64) -> Result<bool>;

    /// Atomic 64-bit add. Returns the previous value.
    fn fetch_add_u64(&self, offset: u64, delta: u64) -> Result<u64>;
}
