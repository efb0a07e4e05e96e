//! Data-plane worker glue: registry snapshot to candidate view to policy
//! dispatch.
//!
//! The control plane owns a [`PathTable`] mapping PoP ids to metrics slots
//! and keeps the slots updated; workers rebuild their candidate view when
//! the registry version moves and otherwise run allocation-free: acquire a
//! descriptor, select a path through the binding, release the descriptor.

use crate::pool::PacketPool;
use crate::routing::binding::PolicyBinding;
use crate::routing::path::{CandidateRef, MetricsSlot, PacketContext, PathId, PathMetrics};
use crate::routing::registry::{limits, ServiceRegistry};

struct PathEntry {
    id: PathId,
    pop_id: String,
    slot: MetricsSlot,
}

/// Control-plane-owned mapping from PoP ids to path ids and metrics slots.
///
/// Slots live as long as the table, which the control plane keeps alive for
/// the life of the system; candidate views borrow them.
#[derive(Default)]
pub struct PathTable {
    entries: Vec<PathEntry>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PoP and return its path id. Ids start at 1; 0 stays
    /// reserved for "no path". Re-registering an existing PoP returns the
    /// id it already has.
    pub fn register(&mut self, pop_id: &str) -> PathId {
        if let Some(e) = self.entries.iter().find(|e| e.pop_id == pop_id) {
            return e.id;
        }
        let id = (self.entries.len() + 1) as PathId;
        self.entries.push(PathEntry {
            id,
            pop_id: pop_id.to_owned(),
            slot: MetricsSlot::new(),
        });
        id
    }

    /// Path id for a PoP, if registered.
    pub fn path_id(&self, pop_id: &str) -> Option<PathId> {
        self.entries
            .iter()
            .find(|e| e.pop_id == pop_id)
            .map(|e| e.id)
    }

    /// Publish fresh metrics for a path. Single control-plane writer.
    /// Returns false for an unknown id.
    pub fn record(&self, id: PathId, metrics: PathMetrics) -> bool {
        match self.entries.iter().find(|e| e.id == id) {
            Some(e) => {
                e.slot.update(metrics);
                true
            }
            None => false,
        }
    }

    /// Fill `out` with the candidate view for `pop_ids`, preserving order
    /// and skipping PoPs that were never registered. Reuses the buffer, so
    /// steady-state refreshes do not allocate once capacity is reached.
    pub fn fill_candidates<'a>(
        &'a self,
        pop_ids: impl IntoIterator<Item = impl AsRef<str>>,
        out: &mut Vec<CandidateRef<'a>>,
    ) {
        out.clear();
        for pop_id in pop_ids {
            if let Some(e) = self.entries.iter().find(|e| e.pop_id == pop_id.as_ref()) {
                out.push(CandidateRef {
                    id: e.id,
                    slot: &e.slot,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One data-plane worker handling a single service.
///
/// Holds references to the live registry, the path table, the policy
/// binding, and the packet pool; all owned by the control plane and outliving
/// the worker.
pub struct DpWorker<'a> {
    registry: &'a ServiceRegistry,
    table: &'a PathTable,
    binding: &'a PolicyBinding,
    pool: &'a PacketPool,
    service_id: String,
    cands: Vec<CandidateRef<'a>>,
    seen_version: u64,
}

impl<'a> DpWorker<'a> {
    pub fn new(
        registry: &'a ServiceRegistry,
        table: &'a PathTable,
        binding: &'a PolicyBinding,
        pool: &'a PacketPool,
        service_id: impl Into<String>,
    ) -> Self {
        let mut worker = Self {
            registry,
            table,
            binding,
            pool,
            service_id: service_id.into(),
            cands: Vec::with_capacity(limits::MAX_POPS_PER_SERVICE),
            seen_version: u64::MAX,
        };
        worker.refresh();
        worker
    }

    /// Rebuild the candidate view from the current registry snapshot. Cheap
    /// when the registry version has not moved.
    pub fn refresh(&mut self) {
        let version = self.registry.version();
        if version == self.seen_version {
            return;
        }
        let snapshot = self.registry.snapshot();
        let pops = snapshot
            .get(&self.service_id)
            .map(|list| list.iter().map(|p| p.id.clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        self.table.fill_candidates(pops, &mut self.cands);
        self.seen_version = version;
    }

    /// Current candidate count (after the last refresh).
    pub fn candidate_count(&self) -> usize {
        self.cands.len()
    }

    /// Handle one inbound packet: acquire a descriptor, choose a path,
    /// release the descriptor.
    ///
    /// Returns 0 (no path) when the pool is exhausted, no policy is bound,
    /// or the service resolves to no candidates; the caller renders that as
    /// a drop or defer.
    pub fn process(&self, flow_hash: u32, dscp: u8) -> PathId {
        let handle = match self.pool.acquire() {
            Some(h) => h,
            None => return 0,
        };
        let pkt = PacketContext { flow_hash, dscp };
        let path = self.binding.select(&self.cands, &pkt);
        self.pool.release(handle);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::path::RoundRobinPolicy;
    use crate::routing::pop::Pop;

    fn healthy(rtt_us: u32) -> PathMetrics {
        PathMetrics {
            rtt_us,
            one_way_delay_us: rtt_us / 2,
            loss_ppm: 0,
            avail_kbps: 10_000,
            qos_class: 0,
            healthy: true,
        }
    }

    #[test]
    fn table_registers_and_records() {
        let mut table = PathTable::new();
        let nyc = table.register("nyc");
        let sfo = table.register("sfo");
        assert_eq!(nyc, 1);
        assert_eq!(sfo, 2);
        assert_eq!(table.register("nyc"), nyc);
        assert_eq!(table.path_id("sfo"), Some(sfo));
        assert!(table.record(nyc, healthy(900)));
        assert!(!table.record(99, healthy(900)));
    }

    #[test]
    fn candidate_view_preserves_registry_order() {
        let mut table = PathTable::new();
        table.register("nyc");
        table.register("sfo");
        table.register("fra");

        let mut cands = Vec::new();
        table.fill_candidates(["fra", "nyc", "unknown"], &mut cands);
        let ids: Vec<_> = cands.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn worker_selects_and_recycles() {
        let registry = ServiceRegistry::new();
        registry
            .add(
                "svc",
                &[
                    Pop::new("nyc", "us-east", "192.0.2.10"),
                    Pop::new("sfo", "us-west", "198.51.100.20"),
                ],
            )
            .unwrap();

        let mut table = PathTable::new();
        let nyc = table.register("nyc");
        let sfo = table.register("sfo");
        table.record(nyc, healthy(900));
        table.record(sfo, healthy(1100));

        let binding = PolicyBinding::new();
        let rr = RoundRobinPolicy::new();
        // SAFETY: `rr` outlives the binding use below and the binding is
        // dropped before `rr` leaves scope.
        unsafe { binding.publish(&rr) };

        let pool = PacketPool::new(8).unwrap();
        let worker = DpWorker::new(&registry, &table, &binding, &pool, "svc");
        assert_eq!(worker.candidate_count(), 2);

        for _ in 0..32 {
            let path = worker.process(7, 0);
            assert!(path == nyc || path == sfo);
        }
        // Every descriptor was released on egress.
        assert_eq!(pool.approx_free(), 8);
    }

    #[test]
    fn worker_without_policy_returns_no_path() {
        let registry = ServiceRegistry::new();
        let table = PathTable::new();
        let binding = PolicyBinding::new();
        let pool = PacketPool::new(4).unwrap();
        let worker = DpWorker::new(&registry, &table, &binding, &pool, "svc");
        assert_eq!(worker.process(1, 0), 0);
    }

    #[test]
    fn refresh_follows_registry_updates() {
        let registry = ServiceRegistry::new();
        let mut table = PathTable::new();
        table.register("nyc");
        table.register("sfo");
        let binding = PolicyBinding::new();
        let pool = PacketPool::new(4).unwrap();

        let mut worker = DpWorker::new(&registry, &table, &binding, &pool, "svc");
        assert_eq!(worker.candidate_count(), 0);

        registry
            .add("svc", &[Pop::new("nyc", "us-east", "192.0.2.10")])
            .unwrap();
        worker.refresh();
        assert_eq!(worker.candidate_count(), 1);

        registry
            .replace(
                "svc",
                &[
                    Pop::new("nyc", "us-east", "192.0.2.10"),
                    Pop::new("sfo", "us-west", "198.51.100.20"),
                ],
            )
            .unwrap();
        worker.refresh();
        assert_eq!(worker.candidate_count(), 2);
    }
}
