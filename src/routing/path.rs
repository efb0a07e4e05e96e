//! Path-selection types, the seqlock metrics slot, and the selection
//! policies.
//!
//! The control plane publishes per-path metrics into [`MetricsSlot`]s
//! (single writer per slot); data-plane workers read them with a bounded
//! seqlock retry and feed the snapshots into a policy's
//! [`choose`](ChoosePolicy::choose). Everything here is lock-free and
//! allocation-free on the read side.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifier of a candidate path within a selection call. `0` is reserved
/// as "no path chosen".
pub type PathId = u32;

/// Bound on seqlock read retries before the reader gives up and treats the
/// value as unknown.
const SEQLOCK_READ_RETRIES: u32 = 4;

/// Per-path health snapshot visible to policies.
///
/// Plain old data, copied by value through the seqlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMetrics {
    pub rtt_us: u32,
    pub one_way_delay_us: u32,
    pub loss_ppm: u32,
    pub avail_kbps: u32,
    pub qos_class: u8,
    pub healthy: bool,
}

impl Default for PathMetrics {
    fn default() -> Self {
        Self {
            rtt_us: u32::MAX,
            one_way_delay_us: u32::MAX,
            loss_ppm: 0,
            avail_kbps: 0,
            qos_class: 0,
            healthy: false,
        }
    }
}

/// Seqlock cell publishing one [`PathMetrics`] from a single control-plane
/// writer to any number of data-plane readers.
///
/// Invariant: even `seq` means the payload is stable, odd means a write is
/// in flight. Padded to a cache line so neighbouring slots do not share one.
#[repr(align(64))]
#[derive(Debug)]
pub struct MetricsSlot {
    seq: AtomicU32,
    metrics: UnsafeCell<PathMetrics>,
}

// SAFETY: the payload is written only by the single writer (caller contract
// on `update`) between the odd and even seq stores; readers copy it out and
// validate the copy against the seq double-load, discarding torn reads.
unsafe impl Sync for MetricsSlot {}

impl Default for MetricsSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSlot {
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            metrics: UnsafeCell::new(PathMetrics::default()),
        }
    }

    /// Writer protocol. Exactly one thread may call this per slot.
    ///
    /// Enters odd, writes the payload, publishes even with release; net
    /// increment is 2.
    pub fn update(&self, m: PathMetrics) {
        let s0 = self.seq.load(Ordering::Relaxed);
        self.seq.store(s0 | 1, Ordering::Relaxed);
        // SAFETY: single-writer contract; readers reject any copy taken
        // while seq is odd or changed.
        unsafe { *self.metrics.get() = m };
        self.seq.store((s0 | 1).wrapping_add(1), Ordering::Release);
    }

    /// Reader protocol: bounded retry, never blocks.
    ///
    /// Returns `None` after four failed attempts under writer contention;
    /// callers treat that as "unknown, use last known good or skip".
    pub fn load(&self) -> Option<PathMetrics> {
        for _ in 0..SEQLOCK_READ_RETRIES {
            // Acquire pairs with the writer's release; even means the copy
            // below is a candidate stable snapshot.
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 != 0 {
                continue;
            }
            // SAFETY: the copy may race the writer; it is validated by the
            // recheck below and discarded on mismatch.
            let snap = unsafe { *self.metrics.get() };
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 && s2 & 1 == 0 {
                return Some(snap);
            }
        }
        None
    }
}

/// A candidate path: id plus the metrics slot that describes it.
///
/// The slot reference must outlive the enclosing selection call; the control
/// plane owns the slots.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRef<'a> {
    pub id: PathId,
    pub slot: &'a MetricsSlot,
}

/// Per-packet inputs visible to policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketContext {
    pub flow_hash: u32,
    pub dscp: u8,
}

/// The decision procedure seam: choose a path from candidates and packet
/// context. Implementations must be lock-free, allocation-free, and total.
pub trait ChoosePolicy {
    fn choose(&self, cands: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId;
}

/// Weak match between a path's QoS class and a packet's DSCP marker.
///
/// Placeholder for a configured class-to-DSCP table: any non-zero class
/// counts as a match.
pub(crate) fn qos_match(path_class: u8, _dscp: u8) -> bool {
    path_class != 0
}

/// Small deterministic RNG for the exploration branch.
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self {
            state: if seed != 0 { seed } else { 0x9E37_79B9 },
        }
    }

    fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn next_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.next() % bound
        }
    }
}

/// Round-robin over healthy candidates.
///
/// A relaxed fetch-add picks the starting index; the scan wraps over at most
/// `n` candidates looking for a healthy one. If none is healthy the start
/// candidate is returned (stable degraded fallback, never no-path).
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    idx: AtomicU32,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChoosePolicy for RoundRobinPolicy {
    fn choose(&self, cands: &[CandidateRef<'_>], _pkt: &PacketContext) -> PathId {
        let n = cands.len() as u32;
        if n == 0 {
            return 0;
        }
        let start = self.idx.fetch_add(1, Ordering::Relaxed) % n;
        for i in 0..n {
            let k = ((start + i) % n) as usize;
            if let Some(m) = cands[k].slot.load() {
                if m.healthy {
                    return cands[k].id;
                }
            }
        }
        cands[start as usize].id
    }
}

/// Sticky flow-to-path mapping via `flow_hash % n`.
///
/// With `skip_unhealthy` the scan walks forward from the base index until a
/// healthy candidate appears, falling back to the base mapping when all are
/// unhealthy so flows do not migrate during a full outage.
#[derive(Debug)]
pub struct FlowHashPolicy {
    skip_unhealthy: bool,
}

impl FlowHashPolicy {
    pub fn new(skip_unhealthy: bool) -> Self {
        Self { skip_unhealthy }
    }
}

impl Default for FlowHashPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ChoosePolicy for FlowHashPolicy {
    fn choose(&self, cands: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        let n = cands.len() as u32;
        if n == 0 {
            return 0;
        }
        let base = pkt.flow_hash % n;
        if !self.skip_unhealthy {
            return cands[base as usize].id;
        }
        for i in 0..n {
            let k = ((base + i) % n) as usize;
            if let Some(m) = cands[k].slot.load() {
                if m.healthy {
                    return cands[k].id;
                }
            }
        }
        cands[base as usize].id
    }
}

/// Tuning for [`LatencyAwarePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct LatencyAwareConfig {
    /// RTT band within which a QoS-matching alternate may win the tie-break.
    pub tie_margin_us: u32,
    /// Exploration probability in parts per million; 0 disables it.
    pub explore_ppm: u32,
    /// Apply the QoS-class tie-break.
    pub prefer_qos_class: bool,
}

impl Default for LatencyAwareConfig {
    fn default() -> Self {
        Self {
            tie_margin_us: 200,
            explore_ppm: 0,
            prefer_qos_class: true,
        }
    }
}

/// Minimum-RTT selection over healthy candidates with a QoS tie-break and
/// optional deterministic exploration.
///
/// Fallback order: min RTT among healthy; else absolute min RTT regardless
/// of health; else the first candidate. A non-empty candidate list never
/// yields no-path.
#[derive(Debug)]
pub struct LatencyAwarePolicy {
    cfg: LatencyAwareConfig,
    salt: AtomicU32,
}

impl LatencyAwarePolicy {
    pub fn new(cfg: LatencyAwareConfig) -> Self {
        Self {
            cfg,
            salt: AtomicU32::new(0xA5A5_5A5A),
        }
    }
}

impl Default for LatencyAwarePolicy {
    fn default() -> Self {
        Self::new(LatencyAwareConfig::default())
    }
}

impl ChoosePolicy for LatencyAwarePolicy {
    fn choose(&self, cands: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        if cands.is_empty() {
            return 0;
        }

        // Healthy pass: min RTT, QoS tie-break within the margin.
        let mut best: usize = 0;
        let mut best_m = PathMetrics::default();
        let mut have_best = false;
        for (i, cand) in cands.iter().enumerate() {
            let m = match cand.slot.load() {
                Some(m) if m.healthy => m,
                _ => continue,
            };
            if !have_best || m.rtt_us < best_m.rtt_us {
                best = i;
                best_m = m;
                have_best = true;
            } else if self.cfg.prefer_qos_class {
                let close = m.rtt_us <= best_m.rtt_us.saturating_add(self.cfg.tie_margin_us);
                if close && qos_match(m.qos_class, pkt.dscp) && !qos_match(best_m.qos_class, pkt.dscp)
                {
                    best = i;
                    best_m = m;
                }
            }
        }

        if !have_best {
            // No healthy candidate: absolute min RTT, then first candidate.
            let mut idx = 0;
            let mut min_m = PathMetrics::default();
            let mut init = false;
            for (i, cand) in cands.iter().enumerate() {
                let m = match cand.slot.load() {
                    Some(m) => m,
                    None => continue,
                };
                if !init || m.rtt_us < min_m.rtt_us {
                    idx = i;
                    min_m = m;
                    init = true;
                }
            }
            return cands[if init { idx } else { 0 }].id;
        }

        if self.cfg.explore_ppm > 0 {
            let seed = pkt.flow_hash ^ self.salt.load(Ordering::Relaxed);
            let mut rng = XorShift32::new(seed);
            if rng.next_bounded(1_000_000) < self.cfg.explore_ppm {
                let n = cands.len() as u32;
                let start = rng.next_bounded(n);
                for i in 0..n {
                    let k = ((start + i) % n) as usize;
                    if k == best {
                        continue;
                    }
                    if let Some(m) = cands[k].slot.load() {
                        if m.healthy {
                            // Perturb the salt so repeated hashes do not
                            // explore in lockstep.
                            self.salt.fetch_add(0x9E37, Ordering::Relaxed);
                            return cands[k].id;
                        }
                    }
                }
            }
        }

        cands[best].id
    }
}
