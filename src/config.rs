//! Router configuration aggregate and named defaults.
//!
//! All defaults live here as named constants so the rest of the codebase is
//! free of magic numbers. File parsing is intentionally not wired; `load`
//! hands back the defaults.

use crate::routing::failover::FailoverConfig;
use crate::routing::ingress::IngressConfig;
use crate::routing::qos::{QosClass, QosConfig, QosThresholds, QosWeights};
use tracing::debug;

/// Named defaults for the control-plane components.
pub mod constants {
    // DSCP PHB codepoints (6-bit, RFC 2474/2597/3246).
    /// Best Effort: 000000.
    pub const DSCP_BE: u8 = 0x00;
    /// Class Selector 1: 001000.
    pub const DSCP_CS1: u8 = 0x08;
    /// Assured Forwarding 31: 101000.
    pub const DSCP_AF31: u8 = 0x28;
    /// Expedited Forwarding: 101110.
    pub const DSCP_EF: u8 = 0x2E;

    // QoS targets per class: microseconds for latency/jitter, fraction for
    // loss.
    pub const QOS_BULK_MAX_LAT_US: u32 = 20_000;
    pub const QOS_BULK_MAX_JITTER_US: u32 = 10_000;
    pub const QOS_BULK_MAX_LOSS: f64 = 0.05;

    pub const QOS_BE_MAX_LAT_US: u32 = 15_000;
    pub const QOS_BE_MAX_JITTER_US: u32 = 8_000;
    pub const QOS_BE_MAX_LOSS: f64 = 0.02;

    pub const QOS_INT_MAX_LAT_US: u32 = 8_000;
    pub const QOS_INT_MAX_JITTER_US: u32 = 3_000;
    pub const QOS_INT_MAX_LOSS: f64 = 0.01;

    pub const QOS_RT_MAX_LAT_US: u32 = 4_000;
    pub const QOS_RT_MAX_JITTER_US: u32 = 1_500;
    pub const QOS_RT_MAX_LOSS: f64 = 0.005;

    // QoS blend weights.
    pub const QOS_WEIGHT_LATENCY: f64 = 0.6;
    pub const QOS_WEIGHT_JITTER: f64 = 0.3;
    pub const QOS_WEIGHT_LOSS: f64 = 0.1;

    // Failover defaults.
    pub const FAILOVER_RETURN_TO_PRIMARY: bool = true;
    pub const FAILOVER_IMPROVE_PCT_TO_SWITCH: f64 = 0.10;
    pub const FAILOVER_MIN_HOLD_MS: u32 = 3_000;
    pub const FAILOVER_RECOVERY_HOLD_MS: u32 = 5_000;

    // Ingress selector defaults.
    pub const INGRESS_HASH_SEED_DEFAULT: u64 = 0xA17A_5EED;

    // Anycast/BGP simulator default attributes.
    pub const BGP_SIM_DEFAULT_LOCAL_PREF: u32 = 100;
    pub const BGP_SIM_DEFAULT_AS_PATH: u32 = 2;
    pub const BGP_SIM_DEFAULT_MED: u32 = 100;
    pub const BGP_SIM_DEFAULT_IGP_COST: u32 = 100;
}

/// Aggregate of the sub-configs the control plane needs.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub qos: QosConfig,
    pub failover: FailoverConfig,
    pub ingress: IngressConfig,
}

impl RouterConfig {
    /// Defaults for every sub-config, built from the named constants.
    pub fn defaults() -> Self {
        Self {
            qos: default_qos(),
            failover: FailoverConfig::default(),
            ingress: IngressConfig::default(),
        }
    }

    /// Load configuration for `path`. Parsing is not wired yet; the named
    /// defaults are returned for any path.
    pub fn load(path: &str) -> Self {
        debug!(path, "config parsing not wired; using named defaults");
        Self::defaults()
    }
}

/// Default QoS configuration: per-class targets, blend weights, and the
/// class-to-DSCP map.
pub fn default_qos() -> QosConfig {
    use constants::*;

    let mut cfg = QosConfig {
        weights: QosWeights {
            latency: QOS_WEIGHT_LATENCY,
            jitter: QOS_WEIGHT_JITTER,
            loss: QOS_WEIGHT_LOSS,
        },
        ..QosConfig::default()
    };
    cfg.thresholds_by_class.insert(
        QosClass::Bulk,
        QosThresholds {
            max_latency_us: QOS_BULK_MAX_LAT_US,
            max_jitter_us: QOS_BULK_MAX_JITTER_US,
            max_loss: QOS_BULK_MAX_LOSS,
        },
    );
    cfg.thresholds_by_class.insert(
        QosClass::BestEffort,
        QosThresholds {
            max_latency_us: QOS_BE_MAX_LAT_US,
            max_jitter_us: QOS_BE_MAX_JITTER_US,
            max_loss: QOS_BE_MAX_LOSS,
        },
    );
    cfg.thresholds_by_class.insert(
        QosClass::Interactive,
        QosThresholds {
            max_latency_us: QOS_INT_MAX_LAT_US,
            max_jitter_us: QOS_INT_MAX_JITTER_US,
            max_loss: QOS_INT_MAX_LOSS,
        },
    );
    cfg.thresholds_by_class.insert(
        QosClass::Realtime,
        QosThresholds {
            max_latency_us: QOS_RT_MAX_LAT_US,
            max_jitter_us: QOS_RT_MAX_JITTER_US,
            max_loss: QOS_RT_MAX_LOSS,
        },
    );
    cfg.dscp_by_class.insert(QosClass::Bulk, DSCP_CS1);
    cfg.dscp_by_class.insert(QosClass::BestEffort, DSCP_BE);
    cfg.dscp_by_class.insert(QosClass::Interactive, DSCP_AF31);
    cfg.dscp_by_class.insert(QosClass::Realtime, DSCP_EF);
    cfg
}
