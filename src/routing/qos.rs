//! QoS policy: per-class thresholds and weighted scoring of candidate paths.
//!
//! Read-mostly and deterministic. Each metric is normalized against its
//! class target (at or under target scores ~1.0, above decays toward 0) and
//! the components are blended with configured weights into a single score.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Application-level traffic classes, mapped to DSCP PHBs by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    /// Backups and sync, latency-insensitive.
    Bulk,
    /// Default class.
    BestEffort,
    /// Latency-sensitive but tolerant.
    Interactive,
    /// Voice and video, most stringent.
    Realtime,
}

/// SLO-style targets used for normalization and compliance checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QosThresholds {
    /// Latency ceiling in microseconds.
    pub max_latency_us: u32,
    /// Jitter ceiling in microseconds.
    pub max_jitter_us: u32,
    /// Loss ceiling as a fraction in [0, 1].
    pub max_loss: f64,
}

impl Default for QosThresholds {
    fn default() -> Self {
        Self {
            max_latency_us: 10_000,
            max_jitter_us: 5_000,
            max_loss: 0.01,
        }
    }
}

/// Relative importance of each metric in the blended score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QosWeights {
    pub latency: f64,
    pub jitter: f64,
    pub loss: f64,
}

impl Default for QosWeights {
    fn default() -> Self {
        Self {
            latency: 0.6,
            jitter: 0.3,
            loss: 0.1,
        }
    }
}

/// Immutable configuration bundle for scoring and DSCP mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QosConfig {
    pub thresholds_by_class: HashMap<QosClass, QosThresholds>,
    pub weights: QosWeights,
    /// DSCP codepoint (6 bits) per class.
    pub dscp_by_class: HashMap<QosClass, u8>,
}

/// Telemetry sample for one path, as supplied by the metrics collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSample {
    /// Stable identifier, e.g. "pop_sfo_primary".
    pub path_id: String,
    pub latency_us: u32,
    pub jitter_us: u32,
    /// Loss ratio in [0, 1].
    pub loss: f64,
}

/// Scoring result for one path; higher score is better, range [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosScore {
    pub path_id: String,
    pub score: f64,
    /// True when every metric meets its class target.
    pub within_thresholds: bool,
}

/// Concrete QoS policy. Safe for concurrent readers; configuration swaps
/// are the single writer's job.
#[derive(Debug, Clone)]
pub struct QosPolicy {
    cfg: QosConfig,
}

impl QosPolicy {
    pub fn new(cfg: QosConfig) -> Self {
        Self { cfg }
    }

    /// DSCP codepoint for a class; defaults to Best Effort (0) when
    /// unmapped.
    pub fn dscp(&self, class: QosClass) -> u8 {
        self.cfg.dscp_by_class.get(&class).copied().unwrap_or(0)
    }

    /// Score one path against a class's targets and weights.
    pub fn score_path(&self, sample: &PathSample, class: QosClass) -> QosScore {
        let th = self
            .cfg
            .thresholds_by_class
            .get(&class)
            .copied()
            .unwrap_or_default();

        let nlat = normalize(sample.latency_us as f64, th.max_latency_us as f64);
        let njit = normalize(sample.jitter_us as f64, th.max_jitter_us as f64);
        let nloss = normalize(sample.loss, th.max_loss);

        let within_thresholds = sample.latency_us <= th.max_latency_us
            && sample.jitter_us <= th.max_jitter_us
            && sample.loss <= th.max_loss;

        QosScore {
            path_id: sample.path_id.clone(),
            score: blend(nlat, njit, nloss, &self.cfg.weights),
            within_thresholds,
        }
    }

    /// Best candidate among the samples.
    ///
    /// With `require_within_thresholds` only compliant paths compete first;
    /// if none complies the best overall wins so traffic is not blackholed.
    pub fn choose_best(
        &self,
        candidates: &[PathSample],
        class: QosClass,
        require_within_thresholds: bool,
    ) -> Option<QosScore> {
        let mut best: Option<QosScore> = None;
        for sample in candidates {
            let s = self.score_path(sample, class);
            if require_within_thresholds && !s.within_thresholds {
                continue;
            }
            if best.as_ref().map_or(true, |b| s.score > b.score) {
                best = Some(s);
            }
        }

        if best.is_none() && require_within_thresholds {
            for sample in candidates {
                let s = self.score_path(sample, class);
                if best.as_ref().map_or(true, |b| s.score > b.score) {
                    best = Some(s);
                }
            }
        }

        best
    }

    /// Current configuration, by value.
    pub fn config(&self) -> QosConfig {
        self.cfg.clone()
    }

    /// Replace the configuration (single control-plane writer expected).
    pub fn update_config(&mut self, cfg: QosConfig) {
        self.cfg = cfg;
    }
}

/// At or under target scores 1.0; above target decays smoothly toward 0.
/// A zero target is treated as non-compliant.
fn normalize(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    let ratio = value / target;
    1.0 / (1.0 + (ratio - 1.0).max(0.0))
}

fn blend(nlat: f64, njit: f64, nloss: f64, w: &QosWeights) -> f64 {
    let sumw = (w.latency + w.jitter + w.loss).max(1e-9);
    let raw = (nlat * w.latency + njit * w.jitter + nloss * w.loss) / sumw;
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn policy() -> QosPolicy {
        QosPolicy::new(config::default_qos())
    }

    fn sample(path_id: &str, latency_us: u32, jitter_us: u32, loss: f64) -> PathSample {
        PathSample {
            path_id: path_id.into(),
            latency_us,
            jitter_us,
            loss,
        }
    }

    #[test]
    fn compliant_path_scores_high() {
        let p = policy();
        let s = p.score_path(&sample("good", 2_000, 500, 0.001), QosClass::Realtime);
        assert!(s.within_thresholds);
        assert!(s.score > 0.95, "score was {}", s.score);
    }

    #[test]
    fn breaching_path_scores_lower_and_flags() {
        let p = policy();
        let s = p.score_path(&sample("bad", 40_000, 20_000, 0.2), QosClass::Realtime);
        assert!(!s.within_thresholds);
        assert!(s.score < 0.5, "score was {}", s.score);
    }

    #[test]
    fn choose_best_prefers_compliant_in_strict_mode() {
        let p = policy();
        // "fast" breaches jitter badly but has great latency; "steady"
        // complies on everything.
        let cands = vec![
            sample("fast", 1_000, 50_000, 0.0),
            sample("steady", 3_500, 1_000, 0.001),
        ];
        let best = p.choose_best(&cands, QosClass::Realtime, true).unwrap();
        assert_eq!(best.path_id, "steady");
    }

    #[test]
    fn strict_mode_falls_back_when_nothing_complies() {
        let p = policy();
        let cands = vec![
            sample("bad1", 50_000, 50_000, 0.5),
            sample("bad2", 20_000, 20_000, 0.1),
        ];
        let best = p.choose_best(&cands, QosClass::Realtime, true).unwrap();
        assert_eq!(best.path_id, "bad2");
        assert!(!best.within_thresholds);
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert!(policy().choose_best(&[], QosClass::Bulk, false).is_none());
    }

    #[test]
    fn dscp_lookup_defaults_to_best_effort() {
        let p = policy();
        assert_eq!(p.dscp(QosClass::Realtime), config::constants::DSCP_EF);
        let unmapped = QosPolicy::new(QosConfig::default());
        assert_eq!(unmapped.dscp(QosClass::Realtime), 0);
    }
}
