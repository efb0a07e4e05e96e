//! Point-of-presence (PoP) model shared across the routing components.
//!
//! The registry, ingress selector, and path-selection glue all speak in
//! `Pop` values; centralizing the type keeps comparisons consistent (the
//! registry's copy-on-write diffs rely on structural equality).

use serde::{Deserialize, Serialize};

/// Health reported for a PoP.
///
/// `Up` is eligible for selection, `Degraded` is eligible but may be
/// deprioritized by policies, `Down` is ineligible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Up,
    Degraded,
    Down,
}

/// Minimal PoP descriptor.
///
/// No uniqueness is enforced here; the registry checks `id` uniqueness per
/// service when a list is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pop {
    /// Human-readable PoP identifier, e.g. "nyc".
    pub id: String,
    /// Region or group label, e.g. "us-east".
    pub region: String,
    /// Control-plane address as an IPv4/IPv6 literal.
    pub ip: String,
    /// Load-balancing weight.
    #[serde(default = "default_weight")]
    pub weight: u16,
    /// Reported health.
    #[serde(default)]
    pub health: Health,
}

fn default_weight() -> u16 {
    100
}

impl Pop {
    /// Construct a PoP with the default weight (100) and `Up` health.
    pub fn new(id: impl Into<String>, region: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            ip: ip.into(),
            weight: default_weight(),
            health: Health::Up,
        }
    }
}

/// Ordered list of PoPs for one service.
pub type PopList = Vec<Pop>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Pop::new("nyc", "us-east", "192.0.2.10");
        let mut b = a.clone();
        assert_eq!(a, b);
        b.weight = 50;
        assert_ne!(a, b);
    }

    #[test]
    fn defaults() {
        let p = Pop::new("sfo", "us-west", "198.51.100.20");
        assert_eq!(p.weight, 100);
        assert_eq!(p.health, Health::Up);
    }
}
