//! Control-plane policy binding observed by the data plane.
//!
//! A seqlock cell holds the pair (erased choose fn, state pointer) so a
//! policy swap is atomic from the readers' point of view: a worker never
//! sees a new state with the old function or vice versa. Dispatch is a plain
//! function-pointer call, no heap-polymorphic object and no allocation.

use crate::routing::path::{CandidateRef, ChoosePolicy, PacketContext, PathId};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Erased policy entry point: `(state, candidates, packet) -> PathId`.
pub type ChooseFn = unsafe fn(*const (), &[CandidateRef<'_>], &PacketContext) -> PathId;

/// Retry bound for data-plane binding snapshots.
const SNAPSHOT_RETRIES: u32 = 4;

/// The payload guarded by the seqlock: both halves of the binding move
/// together under one odd/even cycle.
#[derive(Clone, Copy)]
struct RawBinding {
    choose: Option<ChooseFn>,
    state: *const (),
}

impl RawBinding {
    const UNBOUND: RawBinding = RawBinding {
        choose: None,
        state: std::ptr::null(),
    };
}

/// Seqlock cell publishing the active selection policy from the control
/// plane (single writer) to data-plane workers (any number of readers).
///
/// State machine: unbound (both null) -> bound via [`publish`], back via
/// [`clear`]; every transition increments `seq` by 2 (odd while the writer
/// is inside, even once published).
///
/// [`publish`]: Self::publish
/// [`clear`]: Self::clear
#[repr(align(64))]
pub struct PolicyBinding {
    seq: AtomicU32,
    slot: UnsafeCell<RawBinding>,
}

// SAFETY: the slot is written only by the single control-plane writer
// between the odd and even seq stores; readers copy the pair out and discard
// it unless the seq double-load proves it stable. The state pointer's
// validity is the `publish` caller's obligation.
unsafe impl Sync for PolicyBinding {}
unsafe impl Send for PolicyBinding {}

impl Default for PolicyBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBinding {
    /// A fresh, unbound cell (`select` returns 0).
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            slot: UnsafeCell::new(RawBinding::UNBOUND),
        }
    }

    /// Bind `policy` as the active decision procedure.
    ///
    /// Single-writer: only the control plane calls this (and [`clear`]) for
    /// a given cell.
    ///
    /// # Safety
    /// `policy` must outlive every data-plane read of this binding: the cell
    /// stores a raw pointer, so the caller must keep the policy alive until
    /// after a subsequent `publish`/[`clear`] *and* no reader can still be
    /// executing a `select` that snapshotted it (in practice: clear, wait a
    /// quiescence interval, then drop; or keep policies alive for the
    /// process lifetime).
    ///
    /// [`clear`]: Self::clear
    pub unsafe fn publish<P: ChoosePolicy>(&self, policy: &P) {
        unsafe fn thunk<P: ChoosePolicy>(
            state: *const (),
            cands: &[CandidateRef<'_>],
            pkt: &PacketContext,
        ) -> PathId {
            // SAFETY: `state` was derived from `&P` in `publish` and is kept
            // alive by the publish contract.
            unsafe { &*(state as *const P) }.choose(cands, pkt)
        }

        let s0 = self.seq.load(Ordering::Relaxed);
        self.seq.store(s0 | 1, Ordering::Relaxed);
        // SAFETY: single-writer contract; readers reject copies taken while
        // seq is odd or changed.
        unsafe {
            *self.slot.get() = RawBinding {
                choose: Some(thunk::<P>),
                state: policy as *const P as *const (),
            };
        }
        self.seq.store((s0 | 1).wrapping_add(1), Ordering::Release);
    }

    /// Unbind: null both halves under one odd/even cycle. `select` returns 0
    /// afterwards.
    pub fn clear(&self) {
        let s0 = self.seq.load(Ordering::Relaxed);
        self.seq.store(s0 | 1, Ordering::Relaxed);
        // SAFETY: single-writer contract, as in `publish`.
        unsafe { *self.slot.get() = RawBinding::UNBOUND };
        self.seq.store((s0 | 1).wrapping_add(1), Ordering::Release);
    }

    /// Bounded-retry read of the (fn, state) pair.
    ///
    /// Returns `None` when the cell is unbound or four attempts raced the
    /// writer.
    fn snapshot(&self) -> Option<(ChooseFn, *const ())> {
        for _ in 0..SNAPSHOT_RETRIES {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 != 0 {
                continue;
            }
            // SAFETY: the copy is validated by the recheck below.
            let raw = unsafe { *self.slot.get() };
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 && s2 & 1 == 0 {
                return match raw.choose {
                    Some(f) if !raw.state.is_null() => Some((f, raw.state)),
                    _ => None,
                };
            }
        }
        None
    }

    /// True when a policy is currently published. Observer only.
    pub fn is_bound(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Hot-path entry: resolve the current policy and choose a path.
    ///
    /// Returns 0 (no path) when unbound or when the snapshot retry bound is
    /// exhausted; callers render that as a drop or defer.
    pub fn select(&self, cands: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        match self.snapshot() {
            // SAFETY: fn and state were published together under the seqlock
            // and the state's liveness is guaranteed by the publish contract.
            Some((f, state)) => unsafe { f(state, cands, pkt) },
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::path::{MetricsSlot, PathMetrics, RoundRobinPolicy};

    struct ConstPolicy(PathId);

    impl ChoosePolicy for ConstPolicy {
        fn choose(&self, _cands: &[CandidateRef<'_>], _pkt: &PacketContext) -> PathId {
            self.0
        }
    }

    #[test]
    fn unbound_selects_no_path() {
        let binding = PolicyBinding::new();
        assert!(!binding.is_bound());
        assert_eq!(binding.select(&[], &PacketContext::default()), 0);
    }

    #[test]
    fn publish_swap_clear() {
        let binding = PolicyBinding::new();
        let a = ConstPolicy(1);
        let b = ConstPolicy(2);
        let pkt = PacketContext::default();

        unsafe { binding.publish(&a) };
        assert_eq!(binding.select(&[], &pkt), 1);

        unsafe { binding.publish(&b) };
        assert_eq!(binding.select(&[], &pkt), 2);

        binding.clear();
        assert!(!binding.is_bound());
        assert_eq!(binding.select(&[], &pkt), 0);
    }

    #[test]
    fn dispatches_through_a_real_policy() {
        let slot = MetricsSlot::new();
        slot.update(PathMetrics {
            rtt_us: 800,
            one_way_delay_us: 400,
            loss_ppm: 0,
            avail_kbps: 1000,
            qos_class: 0,
            healthy: true,
        });
        let cands = [CandidateRef { id: 9, slot: &slot }];

        let binding = PolicyBinding::new();
        let rr = RoundRobinPolicy::new();
        unsafe { binding.publish(&rr) };
        assert_eq!(binding.select(&cands, &PacketContext::default()), 9);
    }
}
