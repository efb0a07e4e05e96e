//! Service registry: service id -> ordered PoP list, published RCU-style.
//!
//! Readers take a reference-counted snapshot of the whole map with acquire
//! semantics and query it without locking; the single writer copies the map,
//! applies the mutation, and swaps the snapshot in with release semantics.
//! The reference count is the grace period: a retired snapshot is reclaimed
//! when its last reader drops it. Readers never block writers and writers
//! never block readers.

use crate::routing::pop::{Pop, PopList};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Capacity and field limits keeping registry memory bounded.
pub mod limits {
    /// Maximum number of services.
    pub const MAX_SERVICES: usize = 128;
    /// Maximum PoPs per service.
    pub const MAX_POPS_PER_SERVICE: usize = 32;
    /// Maximum length of a service or PoP id.
    pub const MAX_ID_LEN: usize = 32;
    /// Maximum length of a region label.
    pub const MAX_REGION_LEN: usize = 32;
    /// Maximum length of a textual IP.
    pub const MAX_IP_LEN: usize = 64;
}

/// Errors returned by registry mutations. Rejections leave the published
/// snapshot untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Add failed because the service already exists.
    #[error("service already exists")]
    Exists,
    /// Replace failed because the service was not found.
    #[error("service not found")]
    NotFound,
    /// Input validation failed (ids, IPs, duplicates, list bounds).
    #[error("invalid service definition")]
    Invalid,
    /// The mutation would exceed a configured capacity limit.
    #[error("registry capacity exhausted")]
    Capacity,
}

/// Cumulative operation counters, sampled via [`ServiceRegistry::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub adds: u64,
    pub replaces: u64,
    pub upserts: u64,
    pub removes: u64,
    pub failures: u64,
}

/// The immutable snapshot type readers hold.
pub type ServiceMap = HashMap<String, PopList>;

enum Mode {
    Add,
    Replace,
    Upsert,
}

/// RCU-published service -> PoP mapping with a single control-plane writer
/// and any number of lock-free readers.
pub struct ServiceRegistry {
    map: ArcSwap<ServiceMap>,
    version: AtomicU64,
    adds: AtomicU64,
    replaces: AtomicU64,
    upserts: AtomicU64,
    removes: AtomicU64,
    failures: AtomicU64,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Fresh registry publishing an empty snapshot.
    pub fn new() -> Self {
        Self {
            map: ArcSwap::from_pointee(ServiceMap::new()),
            version: AtomicU64::new(0),
            adds: AtomicU64::new(0),
            replaces: AtomicU64::new(0),
            upserts: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    // --------------------------- read side ---------------------------

    /// Take a consistent snapshot of the whole map. The snapshot stays live
    /// until the returned `Arc` is dropped, regardless of later mutations.
    pub fn snapshot(&self) -> Arc<ServiceMap> {
        self.map.load_full()
    }

    /// True when the service is present in the current snapshot.
    pub fn has_service(&self, service_id: &str) -> bool {
        self.map.load().contains_key(service_id)
    }

    /// Copy of the PoPs for a service, safe across snapshot swaps.
    pub fn pops_copy(&self, service_id: &str) -> Option<PopList> {
        self.map.load().get(service_id).cloned()
    }

    /// Number of services in the current snapshot.
    pub fn len(&self) -> usize {
        self.map.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.load().is_empty()
    }

    /// Ids of all services in the current snapshot (unordered).
    pub fn list_services(&self) -> Vec<String> {
        self.map.load().keys().cloned().collect()
    }

    /// Monotonic version, incremented on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Snapshot of the cumulative operation counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            adds: self.adds.load(Ordering::Relaxed),
            replaces: self.replaces.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    // --------------------------- write side ---------------------------
    // Single writer assumed for the lifetime of the registry.

    /// Add a new service. Fails with [`RegistryError::Exists`] when present.
    pub fn add(&self, service_id: &str, pops: &[Pop]) -> Result<(), RegistryError> {
        self.mutate(Mode::Add, service_id, pops)
    }

    /// Replace the PoPs of an existing service. Fails with
    /// [`RegistryError::NotFound`] when absent.
    pub fn replace(&self, service_id: &str, pops: &[Pop]) -> Result<(), RegistryError> {
        self.mutate(Mode::Replace, service_id, pops)
    }

    /// Insert or replace. Never `Exists`/`NotFound`.
    pub fn upsert(&self, service_id: &str, pops: &[Pop]) -> Result<(), RegistryError> {
        self.mutate(Mode::Upsert, service_id, pops)
    }

    /// Remove a service. Returns true iff it was erased; a missing service
    /// is not an error and publishes nothing.
    pub fn remove(&self, service_id: &str) -> bool {
        let snap = self.map.load();
        if !snap.contains_key(service_id) {
            return false;
        }
        let mut next = ServiceMap::clone(&snap);
        next.remove(service_id);
        self.map.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::Relaxed);
        self.removes.fetch_add(1, Ordering::Relaxed);
        debug!(service = service_id, "service removed");
        true
    }

    /// Publish an empty snapshot. Maintenance operation, not counted.
    pub fn clear(&self) {
        self.map.store(Arc::new(ServiceMap::new()));
        self.version.fetch_add(1, Ordering::Relaxed);
        debug!("registry cleared");
    }

    fn reject(&self, service_id: &str, err: RegistryError) -> Result<(), RegistryError> {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(service = service_id, %err, "registry mutation rejected");
        Err(err)
    }

    fn mutate(&self, mode: Mode, service_id: &str, pops: &[Pop]) -> Result<(), RegistryError> {
        if !valid_id(service_id, limits::MAX_ID_LEN) || !valid_pops(pops) {
            return self.reject(service_id, RegistryError::Invalid);
        }

        let snap = self.map.load();
        let exists = snap.contains_key(service_id);

        let counter = match mode {
            Mode::Add if exists => return self.reject(service_id, RegistryError::Exists),
            Mode::Replace if !exists => return self.reject(service_id, RegistryError::NotFound),
            Mode::Add => &self.adds,
            Mode::Replace => &self.replaces,
            Mode::Upsert => &self.upserts,
        };
        if !exists && snap.len() >= limits::MAX_SERVICES {
            return self.reject(service_id, RegistryError::Capacity);
        }

        // Copy-on-write: mutate a private copy, then publish it whole. The
        // release store pairs with readers' acquire loads so they observe a
        // fully constructed map or the old one, never a mix.
        let mut next = ServiceMap::clone(&snap);
        next.insert(service_id.to_owned(), pops.to_vec());
        self.map.store(Arc::new(next));

        self.version.fetch_add(1, Ordering::Relaxed);
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(service = service_id, pops = pops.len(), "service published");
        Ok(())
    }
}

// --------------------------- validation ---------------------------

/// `[A-Za-z0-9_-]`, 2..=max_len.
fn valid_id(id: &str, max_len: usize) -> bool {
    if id.len() < 2 || id.len() > max_len {
        return false;
    }
    id.bytes()
        .all(|b| b == b'_' || b == b'-' || b.is_ascii_alphanumeric())
}

fn valid_ip(ip: &str) -> bool {
    !ip.is_empty() && ip.len() <= limits::MAX_IP_LEN && ip.parse::<IpAddr>().is_ok()
}

/// Non-empty, bounded list with unique ids, valid fields, parseable IPs.
fn valid_pops(pops: &[Pop]) -> bool {
    if pops.is_empty() || pops.len() > limits::MAX_POPS_PER_SERVICE {
        return false;
    }
    for p in pops {
        if !valid_id(&p.id, limits::MAX_ID_LEN)
            || !valid_id(&p.region, limits::MAX_REGION_LEN)
            || !valid_ip(&p.ip)
        {
            return false;
        }
    }
    let mut ids: Vec<&str> = pops.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    ids.windows(2).all(|w| w[0] != w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pop(id: &str, region: &str, ip: &str) -> Pop {
        Pop::new(id, region, ip)
    }

    #[test]
    fn fresh_registry_is_empty() {
        let reg = ServiceRegistry::new();
        assert!(reg.snapshot().is_empty());
        assert_eq!(reg.version(), 0);
        assert_eq!(reg.stats(), RegistryStats::default());
    }

    #[test]
    fn add_then_query() {
        let reg = ServiceRegistry::new();
        let a = pop("nyc", "us-east", "192.0.2.10");
        let b = pop("sfo", "us-west", "198.51.100.20");
        reg.add("svc1", &[a.clone(), b.clone()]).unwrap();

        assert!(reg.has_service("svc1"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.pops_copy("svc1").unwrap(), vec![a, b]);
        assert_eq!(reg.version(), 1);
        assert_eq!(reg.stats().adds, 1);
    }

    #[test]
    fn add_existing_fails() {
        let reg = ServiceRegistry::new();
        let pops = [pop("p1", "r1", "203.0.113.1")];
        reg.add("svc", &pops).unwrap();
        assert_eq!(reg.add("svc", &pops), Err(RegistryError::Exists));
        assert_eq!(reg.stats().failures, 1);
    }

    #[test]
    fn replace_missing_fails() {
        let reg = ServiceRegistry::new();
        let pops = [pop("p1", "r1", "203.0.113.1")];
        assert_eq!(reg.replace("svc", &pops), Err(RegistryError::NotFound));
    }

    #[test]
    fn replace_swaps_content() {
        let reg = ServiceRegistry::new();
        reg.add("svc", &[pop("xx", "rx", "203.0.113.10")]).unwrap();
        reg.replace("svc", &[pop("yy", "ry", "203.0.113.11")])
            .unwrap();
        let pops = reg.pops_copy("svc").unwrap();
        assert_eq!(pops.len(), 1);
        assert_eq!(pops[0].id, "yy");
    }

    #[test]
    fn upsert_is_idempotent() {
        let reg = ServiceRegistry::new();
        let pops = [
            pop("a1", "r1", "203.0.113.1"),
            pop("a2", "r1", "203.0.113.2"),
        ];
        reg.upsert("svc", &pops).unwrap();
        let s1 = reg.pops_copy("svc").unwrap();
        reg.upsert("svc", &pops).unwrap();
        let s2 = reg.pops_copy("svc").unwrap();
        assert_eq!(s1, s2);
        assert_eq!(reg.stats().upserts, 2);
    }

    #[test]
    fn add_remove_round_trip() {
        let reg = ServiceRegistry::new();
        reg.add("keep", &[pop("p", "r", "203.0.113.3")]).unwrap();
        let before = reg.snapshot();

        reg.add("gone", &[pop("q", "r", "203.0.113.4")]).unwrap();
        assert!(reg.remove("gone"));
        let after = reg.snapshot();

        assert_eq!(*before, *after);
        assert!(!reg.remove("gone"));
    }

    #[test]
    fn clear_publishes_empty() {
        let reg = ServiceRegistry::new();
        reg.add("a", &[pop("p", "r", "203.0.113.3")]).unwrap();
        reg.add("b", &[pop("p", "r", "203.0.113.3")]).unwrap();
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn validation_rejections() {
        let reg = ServiceRegistry::new();

        // Bad service id (too short / bad chars).
        assert_eq!(
            reg.add("x", &[pop("p1", "r1", "203.0.113.1")]),
            Err(RegistryError::Invalid)
        );
        assert_eq!(
            reg.add("has space", &[pop("p1", "r1", "203.0.113.1")]),
            Err(RegistryError::Invalid)
        );

        // Bad IP.
        assert_eq!(
            reg.add("svc_bad_ip", &[pop("ny", "r1", "not_an_ip")]),
            Err(RegistryError::Invalid)
        );
        assert!(!reg.has_service("svc_bad_ip"));

        // Duplicate PoP ids.
        let dup = [pop("la", "r1", "192.0.2.10"), pop("la", "r2", "192.0.2.11")];
        assert_eq!(reg.add("svc_dup", &dup), Err(RegistryError::Invalid));
        assert!(!reg.has_service("svc_dup"));

        // Empty and oversized lists.
        assert_eq!(reg.add("svc_empty", &[]), Err(RegistryError::Invalid));
        let too_many: Vec<Pop> = (0..limits::MAX_POPS_PER_SERVICE + 1)
            .map(|i| pop(&format!("p{i:02}"), "r1", "203.0.113.1"))
            .collect();
        assert_eq!(reg.add("svc_many", &too_many), Err(RegistryError::Invalid));

        assert_eq!(reg.stats().failures, 6);
        assert_eq!(reg.version(), 0);
    }

    #[test]
    fn ipv6_accepted() {
        let reg = ServiceRegistry::new();
        reg.add("svc_v6", &[pop("fra", "eu-central", "2001:db8::1")])
            .unwrap();
        assert!(reg.has_service("svc_v6"));
    }

    #[test]
    fn capacity_limit() {
        let reg = ServiceRegistry::new();
        let pops = [pop("p1", "r1", "203.0.113.1")];
        for i in 0..limits::MAX_SERVICES {
            reg.add(&format!("svc{i:03}"), &pops).unwrap();
        }
        assert_eq!(
            reg.add("svc_overflow", &pops),
            Err(RegistryError::Capacity)
        );
        // Replacing an existing entry is still allowed at capacity.
        reg.replace("svc000", &pops).unwrap();
    }
}
