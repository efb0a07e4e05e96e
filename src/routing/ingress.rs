//! Ingress PoP selection: deterministic local strategies and the
//! route-informed oracle path.

use crate::config::constants;
use crate::routing::oracle::BgpOracle;
use crate::routing::pop::PopList;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Local deterministic strategies for picking an ingress PoP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngressStrategy {
    /// Monotonic round-robin over the configured PoP list.
    #[default]
    RoundRobin,
    /// Hash the 32-bit source IP into a PoP index.
    HashSourceIp,
    /// Hash the 5-tuple into a PoP index.
    Hash5Tuple,
}

/// Top-level mode: app-layer policy vs route-informed anycast best-path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngressMode {
    /// App-layer RR/hash; no oracle consult.
    #[default]
    PolicyDeterministic,
    /// Anycast best-path via the BGP oracle.
    RouteInformed,
}

/// Configuration for ingress selection.
#[derive(Debug, Clone, Copy)]
pub struct IngressConfig {
    pub mode: IngressMode,
    pub strategy: IngressStrategy,
    /// Salt for the hashing strategies.
    pub seed: u64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            mode: IngressMode::default(),
            strategy: IngressStrategy::default(),
            seed: constants::INGRESS_HASH_SEED_DEFAULT,
        }
    }
}

/// Selector supporting both modes; choosing is lock-free (the RR counter is
/// a relaxed fetch-add), loading PoPs and config is control-plane work.
#[derive(Default)]
pub struct IngressSelector {
    cfg: IngressConfig,
    pops: PopList,
    oracle: Option<Arc<dyn BgpOracle>>,
    rr: AtomicU64,
}

impl IngressSelector {
    pub fn new(cfg: IngressConfig) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    /// Load or replace the set of available PoPs.
    pub fn load_pops(&mut self, pops: PopList) {
        self.pops = pops;
    }

    pub fn update_config(&mut self, cfg: IngressConfig) {
        self.cfg = cfg;
    }

    /// Attach an oracle for the route-informed mode.
    pub fn attach_oracle(&mut self, oracle: Arc<dyn BgpOracle>) {
        self.oracle = Some(oracle);
    }

    /// Choose an ingress PoP without client information (best effort).
    pub fn choose_ingress(&self, service_id: &str) -> Option<String> {
        self.choose(service_id, None, 0)
    }

    /// Choose an ingress PoP with a client source IP, enabling the
    /// client-aware oracle and hash strategies.
    pub fn choose_ingress_for(&self, service_id: &str, client_src_ip: &str) -> Option<String> {
        let flow_hash = fold_ip(client_src_ip);
        self.choose(service_id, Some(client_src_ip), flow_hash)
    }

    fn choose(
        &self,
        service_id: &str,
        client_src_ip: Option<&str>,
        flow_hash: u64,
    ) -> Option<String> {
        if self.cfg.mode == IngressMode::RouteInformed {
            if let Some(oracle) = &self.oracle {
                if let Some(pop) = oracle.serving_pop(service_id, client_src_ip) {
                    return Some(pop);
                }
            }
            // Oracle silent: fall through to the deterministic policy.
        }
        self.choose_policy_deterministic(flow_hash)
    }

    fn choose_policy_deterministic(&self, flow_hash: u64) -> Option<String> {
        if self.pops.is_empty() {
            return None;
        }
        let n = self.pops.len() as u64;
        let idx = match self.cfg.strategy {
            IngressStrategy::RoundRobin => self.rr.fetch_add(1, Ordering::Relaxed) % n,
            IngressStrategy::HashSourceIp | IngressStrategy::Hash5Tuple => {
                mix(flow_hash, self.cfg.seed) % n
            }
        };
        Some(self.pops[idx as usize].id.clone())
    }
}

/// 64-bit avalanche mix (splitmix/wyhash style) used by the hash strategies.
fn mix(mut x: u64, seed: u64) -> u64 {
    const PHI: u64 = 0x9e37_79b9_7f4a_7c15;
    const M1: u64 = 0xff51_afd7_ed55_8ccd;
    const M2: u64 = 0xc4ce_b9fe_1a85_ec53;

    x ^= seed
        .wrapping_add(PHI)
        .wrapping_add(x << 6)
        .wrapping_add(x >> 2);
    x ^= x >> 33;
    x = x.wrapping_mul(M1);
    x ^= x >> 33;
    x = x.wrapping_mul(M2);
    x ^= x >> 33;
    x
}

/// Cheap stable fold of a textual IP into a flow hash.
fn fold_ip(ip: &str) -> u64 {
    ip.bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64))
}
