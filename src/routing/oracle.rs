//! Pluggable oracle answering "which PoP serves this anycast service?".
//!
//! Used by the route-informed ingress mode. The simulator stands in until a
//! real routing daemon integration exists.

use crate::config::constants;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Oracle interface consulted by the ingress selector.
pub trait BgpOracle: Send + Sync {
    /// PoP id that would serve `service_id` for the given client, or `None`
    /// when the oracle has no route. `client_src_ip` is optional; `None`
    /// asks for the best overall answer.
    fn serving_pop(&self, service_id: &str, client_src_ip: Option<&str>) -> Option<String>;
}

/// Simulated BGP route candidate to a service (anycast prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRoute {
    pub pop_id: String,
    /// Higher wins.
    pub local_pref: u32,
    /// Lower wins.
    pub as_path_len: u32,
    /// Lower wins.
    pub med: u32,
    /// Lower wins.
    pub igp_cost: u32,
}

impl SimRoute {
    /// Route with the default attribute values.
    pub fn new(pop_id: impl Into<String>) -> Self {
        Self {
            pop_id: pop_id.into(),
            local_pref: constants::BGP_SIM_DEFAULT_LOCAL_PREF,
            as_path_len: constants::BGP_SIM_DEFAULT_AS_PATH,
            med: constants::BGP_SIM_DEFAULT_MED,
            igp_cost: constants::BGP_SIM_DEFAULT_IGP_COST,
        }
    }
}

/// Per service id: candidate routes with attributes.
pub type SimRouteMap = HashMap<String, Vec<SimRoute>>;

/// Route-informed oracle backed by static simulated BGP attributes.
///
/// Best-path order: local-pref descending, then AS-path length, MED, and
/// IGP cost ascending, with the lexicographically smallest PoP id as the
/// final tie-breaker.
#[derive(Debug, Default)]
pub struct SimulatedBgpOracle {
    routes: RwLock<SimRouteMap>,
}

impl SimulatedBgpOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the simulator's route table.
    pub fn load_routes(&self, routes: SimRouteMap) {
        *self.routes.write() = routes;
    }
}

impl BgpOracle for SimulatedBgpOracle {
    fn serving_pop(&self, service_id: &str, _client_src_ip: Option<&str>) -> Option<String> {
        let routes = self.routes.read();
        let cands = routes.get(service_id)?;
        let mut best = cands.first()?;
        for r in cands {
            if r.local_pref != best.local_pref {
                if r.local_pref > best.local_pref {
                    best = r;
                }
            } else if r.as_path_len != best.as_path_len {
                if r.as_path_len < best.as_path_len {
                    best = r;
                }
            } else if r.med != best.med {
                if r.med < best.med {
                    best = r;
                }
            } else if r.igp_cost != best.igp_cost {
                if r.igp_cost < best.igp_cost {
                    best = r;
                }
            } else if r.pop_id < best.pop_id {
                best = r;
            }
        }
        Some(best.pop_id.clone())
    }
}
