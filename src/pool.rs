//! Fixed-capacity packet descriptor pool backed by an SPSC free-list.
//!
//! All descriptors and the free ring are allocated at construction; steady
//! state is allocation-free. The free ring carries handles, not descriptors,
//! so acquire/release are a pop/push pair on the ring.
//!
//! Thread roles: exactly one acquirer (ring consumer, typically the RX
//! thread) and exactly one releaser (ring producer, typically the TX thread)
//! for the lifetime of the pool. Reassigning a role needs external
//! synchronization.

use crate::packet::{Packet, PacketHandle};
use crate::spsc::{SpscError, SpscRing};
use std::cell::UnsafeCell;

/// Pool of `N` packet descriptors recycled through a lock-free free-list.
pub struct PacketPool {
    capacity: usize,
    storage: Box<[UnsafeCell<Packet>]>,
    /// Free-list ring sized `2N` so all `N` handles coexist under the
    /// one-slot-open scheme.
    free: SpscRing<PacketHandle>,
}

// SAFETY: descriptor slots are accessed exclusively by whichever thread
// currently holds the handle; the free ring's acquire/release pairing orders
// a releaser's writes before the next acquirer's reads of the same slot.
unsafe impl Send for PacketPool {}
unsafe impl Sync for PacketPool {}

impl PacketPool {
    /// Build a pool with `capacity` descriptors (power of two) and seed the
    /// free-list with handles `0..capacity` in order.
    ///
    /// Seeding failure would mean the free ring cannot hold the pool's own
    /// handles; that is a construction-time invariant violation and aborts.
    pub fn new(capacity: usize) -> Result<Self, SpscError> {
        if capacity == 0 {
            return Err(SpscError::CapacityZero);
        }
        if !capacity.is_power_of_two() {
            return Err(SpscError::CapacityNotPowerOfTwo);
        }
        let free = SpscRing::with_capacity(capacity * 2)?;
        let storage: Box<[UnsafeCell<Packet>]> = (0..capacity)
            .map(|_| UnsafeCell::new(Packet::default()))
            .collect();
        for h in 0..capacity as PacketHandle {
            free.push(h).expect("free ring must hold every pool handle");
        }
        Ok(Self {
            capacity,
            storage,
            free,
        })
    }

    /// Take a free handle, or `None` when every descriptor is outstanding.
    /// Ring-consumer role.
    pub fn acquire(&self) -> Option<PacketHandle> {
        self.free.pop()
    }

    /// Return a handle to the pool. Ring-producer role.
    ///
    /// Returns `false` only when the free ring is full, which means more
    /// handles were released than acquired (a caller logic error the pool
    /// does not otherwise detect).
    pub fn release(&self, handle: PacketHandle) -> bool {
        self.free.push(handle).is_ok()
    }

    /// Read the descriptor for `handle`.
    ///
    /// # Safety
    /// The caller must hold `handle` (acquired and not yet released) and
    /// `handle` must be below [`capacity`](Self::capacity). While held, the
    /// holder has exclusive access to the slot.
    pub unsafe fn get(&self, handle: PacketHandle) -> &Packet {
        debug_assert!((handle as usize) < self.capacity);
        unsafe { &*self.storage[handle as usize].get() }
    }

    /// Write access to the descriptor for `handle`.
    ///
    /// # Safety
    /// Same contract as [`get`](Self::get): the caller holds the handle and
    /// it is in range.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, handle: PacketHandle) -> &mut Packet {
        debug_assert!((handle as usize) < self.capacity);
        unsafe { &mut *self.storage[handle as usize].get() }
    }

    /// Number of descriptors owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Approximate count of free descriptors. Observer only.
    pub fn approx_free(&self) -> usize {
        self.free.approx_len()
    }
}
