//! Failover policy with hysteresis and optional return-to-primary.
//!
//! Evaluation is pure over its inputs (scores, health, a monotonic "now"),
//! which keeps the dwell-timer logic testable without real sleeps.

use crate::config::constants;
use crate::routing::qos::QosScore;
use std::time::Instant;

/// High-level health classification of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Up,
    Degraded,
    Down,
}

/// Configuration for failover hysteresis and return-to-primary.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// Preferred path identifier; empty disables return-to-primary.
    pub primary_path_id: String,
    /// Return to the primary once it has recovered.
    pub return_to_primary: bool,
    /// Relative score improvement required before switching away from a
    /// healthy current path.
    pub improve_pct_to_switch: f64,
    /// Dwell time on the current path before a margin-based switch.
    pub min_hold_ms: u32,
    /// Time the primary must have been stable before returning to it.
    pub recovery_hold_ms: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            primary_path_id: String::new(),
            return_to_primary: constants::FAILOVER_RETURN_TO_PRIMARY,
            improve_pct_to_switch: constants::FAILOVER_IMPROVE_PCT_TO_SWITCH,
            min_hold_ms: constants::FAILOVER_MIN_HOLD_MS,
            recovery_hold_ms: constants::FAILOVER_RECOVERY_HOLD_MS,
        }
    }
}

/// Health of one path and when it last changed state.
#[derive(Debug, Clone)]
pub struct PathHealth {
    pub path_id: String,
    pub state: HealthState,
    /// Last state change; `None` means "never changed", which passes every
    /// dwell check.
    pub last_change: Option<Instant>,
}

/// Result of a failover evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverDecision {
    pub next_path_id: String,
    /// Reason label for logs and decision events.
    pub reason: &'static str,
}

/// Decides whether and when to switch paths based on QoS scores and health.
#[derive(Debug, Clone, Default)]
pub struct FailoverPolicy {
    cfg: FailoverConfig,
}

impl FailoverPolicy {
    pub fn new(cfg: FailoverConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.cfg
    }

    pub fn update_config(&mut self, cfg: FailoverConfig) {
        self.cfg = cfg;
    }

    /// Evaluate the need to switch away from `current`.
    ///
    /// Returns `None` to keep the current path. Unknown paths are treated
    /// as `Down`.
    pub fn evaluate(
        &self,
        current: &str,
        scores: &[QosScore],
        health: &[PathHealth],
        now: Instant,
    ) -> Option<FailoverDecision> {
        let cur_state = state_of(current, health);
        let cur_score = find_score(scores, current);
        let cur_last_change = health
            .iter()
            .find(|h| h.path_id == current)
            .and_then(|h| h.last_change);

        // Best healthy candidate by score.
        let best = scores
            .iter()
            .filter(|s| state_of(&s.path_id, health) != HealthState::Down)
            .max_by(|a, b| a.score.total_cmp(&b.score))?;

        // Current down: switch immediately.
        if cur_state == HealthState::Down {
            return Some(FailoverDecision {
                next_path_id: best.path_id.clone(),
                reason: "current_down",
            });
        }

        match cur_score {
            Some(cur) => {
                // Stickiness: require the improvement margin plus the dwell
                // time before switching to a better candidate.
                let needed = cur.score * (1.0 + self.cfg.improve_pct_to_switch);
                if best.path_id != current
                    && best.score >= needed
                    && allow_switch(cur_last_change, now, self.cfg.min_hold_ms)
                {
                    return Some(FailoverDecision {
                        next_path_id: best.path_id.clone(),
                        reason: "better_candidate_with_margin",
                    });
                }
            }
            None => {
                return Some(FailoverDecision {
                    next_path_id: best.path_id.clone(),
                    reason: "no_current_score",
                });
            }
        }

        // Return-to-primary once the primary has recovered and held.
        if self.cfg.return_to_primary
            && !self.cfg.primary_path_id.is_empty()
            && self.cfg.primary_path_id != current
        {
            let primary = &self.cfg.primary_path_id;
            let prim_score = find_score(scores, primary);
            let prim_last_change = health
                .iter()
                .find(|h| &h.path_id == primary)
                .and_then(|h| h.last_change);
            if let Some(prim) = prim_score {
                if state_of(primary, health) != HealthState::Down
                    && prim.score >= best.score
                    && allow_switch(prim_last_change, now, self.cfg.recovery_hold_ms)
                {
                    return Some(FailoverDecision {
                        next_path_id: primary.clone(),
                        reason: "return_to_primary",
                    });
                }
            }
        }

        None
    }
}

fn find_score<'a>(scores: &'a [QosScore], id: &str) -> Option<&'a QosScore> {
    scores.iter().find(|s| s.path_id == id)
}

/// Unknown paths are conservatively treated as down.
fn state_of(id: &str, health: &[PathHealth]) -> HealthState {
    health
        .iter()
        .find(|h| h.path_id == id)
        .map(|h| h.state)
        .unwrap_or(HealthState::Down)
}

fn allow_switch(last_change: Option<Instant>, now: Instant, hold_ms: u32) -> bool {
    match last_change {
        None => true,
        Some(last) => now.saturating_duration_since(last).as_millis() >= u128::from(hold_ms),
    }
}
