//! Bounded single-producer/single-consumer ring.
//!
//! The ring is the transport underneath the packet pool free-list and any
//! other 1P/1C hand-off in the router. Push and pop never block, never
//! allocate, and pair a release store on the advancing index with an acquire
//! load on the opposite side so the payload is visible before the index
//! moves. Indices live on separate cache lines to avoid false sharing between
//! the producer and consumer cores.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Errors reported when constructing a ring. Hot-path operations are total
/// and never produce these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SpscError {
    /// Capacity must not be zero.
    #[error("ring capacity must not be zero")]
    CapacityZero,
    /// Capacity must be a power of two (indices wrap via bitmask).
    #[error("ring capacity must be a power of two")]
    CapacityNotPowerOfTwo,
    /// Element type rejected by the transport. Kept for parity with the
    /// error taxonomy; Rust moves are infallible, so the factory never
    /// actually returns this variant.
    #[error("element type unsuitable for ring transport")]
    ElementUnsuitable,
    /// Backing storage allocation failed.
    #[error("ring storage allocation failed")]
    AllocationFailed,
}

/// Bounded lock-free ring for exactly one producer and one consumer.
///
/// Capacity is a power of two and usable occupancy is `capacity - 1`
/// (one-slot-open scheme). Values move through the ring without copies.
///
/// The 1P/1C discipline is a caller contract: at any point in time at most
/// one thread calls [`push`](Self::push) and at most one thread calls
/// [`pop`](Self::pop). Reassigning a role to another thread requires
/// external synchronization.
pub struct SpscRing<T> {
    /// Consumer index, owned by the popping thread.
    head: CachePadded<AtomicUsize>,
    /// Producer index, owned by the pushing thread.
    tail: CachePadded<AtomicUsize>,
    mask: usize,
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: slots are written only by the single producer and read only by the
// single consumer. The producer's release store on `tail` pairs with the
// consumer's acquire load, so a slot's contents are visible before its index
// is published; the symmetric pairing on `head` makes the slot safe to reuse.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Allocate a ring with the given power-of-two capacity.
    ///
    /// The single allocation happens here; no operation after construction
    /// allocates.
    pub fn with_capacity(capacity: usize) -> Result<Self, SpscError> {
        if capacity == 0 {
            return Err(SpscError::CapacityZero);
        }
        if !capacity.is_power_of_two() {
            return Err(SpscError::CapacityNotPowerOfTwo);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| SpscError::AllocationFailed)?;
        for _ in 0..capacity {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Ok(Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            mask: capacity - 1,
            buf: slots.into_boxed_slice(),
        })
    }

    /// Producer side: append a value.
    ///
    /// Returns the value back when the ring is full so the caller can retry
    /// or shed it. Never blocks, never allocates.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & self.mask;
        if next == self.head.load(Ordering::Acquire) {
            return Err(value);
        }
        // SAFETY: `tail` is owned by this (single) producer and the slot at
        // `tail` is free: the consumer has already moved past it, as checked
        // against `head` above.
        unsafe { (*self.buf[tail].get()).write(value) };
        self.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer side: remove the oldest value, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `head` is owned by this (single) consumer, and the acquire
        // load of `tail` above proves the producer finished writing the slot.
        let value = unsafe { (*self.buf[head].get()).assume_init_read() };
        self.head.store((head + 1) & self.mask, Ordering::Release);
        Some(value)
    }

    /// True when no values are queued. Observer only, not linearizable with
    /// concurrent push/pop.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// True when the next push would fail. Observer only.
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        ((tail + 1) & self.mask) == self.head.load(Ordering::Acquire)
    }

    /// Ring capacity (usable occupancy is `capacity() - 1`).
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate occupancy. Not linearizable with concurrent mutations.
    pub fn approx_len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        (tail.wrapping_add(self.capacity()).wrapping_sub(head)) & self.mask
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        // Exclusive access at drop: drain whatever is still initialized.
        while self.pop().is_some() {}
    }
}
