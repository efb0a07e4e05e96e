//! Observability: decision events, counters, and an off-hot-path recorder.
//!
//! The sink is injected, not a process global. The control plane records
//! [`DecisionEvent`]s either directly through an [`Observer`] or via
//! [`DecisionRecorder`], which hands events to a background thread over a
//! bounded lock-free channel so recording never stalls the caller.

use crate::routing::qos::{QosClass, QosScore};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Process-level counters for routing decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Total decisions recorded.
    pub decisions: u64,
    /// Times a failover was triggered.
    pub failover_triggers: u64,
    /// Decisions that selected a non-compliant path.
    pub degraded_choices: u64,
}

/// Payload describing a single routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Caller-provided id (UUID or monotonic counter).
    pub decision_id: String,
    /// Chosen path identifier.
    pub selected_path: String,
    /// Traffic class the decision was made for.
    pub class: QosClass,
    /// Score of the selected path.
    pub best_score: f64,
    /// Whether threshold compliance was enforced.
    pub strict_mode: bool,
    /// Scores of all candidates considered.
    pub scored: Vec<QosScore>,
    /// Reason label, for humans and logs.
    pub reason: String,
}

/// Observability sink interface.
pub trait Observer: Send + Sync {
    /// Record one decision event.
    fn record(&self, event: &DecisionEvent);
    /// Snapshot of the counters so far.
    fn snapshot(&self) -> Counters;
}

/// Observer emitting one structured log line per decision and keeping the
/// counters under a mutex (this sink is not on the packet hot path).
#[derive(Default)]
pub struct LogObserver {
    counters: Mutex<Counters>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for LogObserver {
    fn record(&self, event: &DecisionEvent) {
        {
            let mut ctr = self.counters.lock();
            ctr.decisions += 1;
            if event.reason.contains("failover") {
                ctr.failover_triggers += 1;
            }
            if event
                .scored
                .iter()
                .any(|s| !s.within_thresholds && s.path_id == event.selected_path)
            {
                ctr.degraded_choices += 1;
            }
        }
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(target: "apex_router::decisions", %payload, "path decision");
    }

    fn snapshot(&self) -> Counters {
        *self.counters.lock()
    }
}

/// Capacity of the recorder channel; events beyond it are dropped rather
/// than applying backpressure to the caller.
const RECORDER_QUEUE_DEPTH: usize = 1024;

/// Hands decision events to a background thread so the recording caller
/// never blocks on the sink.
pub struct DecisionRecorder {
    tx: Sender<DecisionEvent>,
    worker: Option<JoinHandle<()>>,
}

impl DecisionRecorder {
    /// Spawn the recorder thread draining into `observer`.
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        let (tx, rx) = bounded::<DecisionEvent>(RECORDER_QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("decision-recorder".to_string())
            .spawn(move || {
                for event in rx.iter() {
                    observer.record(&event);
                }
            })
            .expect("failed to spawn decision recorder thread");
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Enqueue an event. Returns false when the queue is full and the event
    /// was dropped (recording must not stall the caller).
    pub fn record(&self, event: DecisionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Drop for DecisionRecorder {
    fn drop(&mut self) {
        // Closing the channel ends the worker's iterator; join so queued
        // events are flushed into the observer before we return.
        drop(std::mem::replace(&mut self.tx, bounded(1).0));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(selected: &str, reason: &str, scored: Vec<QosScore>) -> DecisionEvent {
        DecisionEvent {
            decision_id: "d-1".into(),
            selected_path: selected.into(),
            class: QosClass::Realtime,
            best_score: 0.9,
            strict_mode: false,
            scored,
            reason: reason.into(),
        }
    }

    #[test]
    fn counters_track_reasons_and_compliance() {
        let obs = LogObserver::new();
        obs.record(&event("a", "better_candidate_with_margin", vec![]));
        obs.record(&event("b", "failover: current_down", vec![]));
        obs.record(&event(
            "c",
            "steady_state",
            vec![QosScore {
                path_id: "c".into(),
                score: 0.4,
                within_thresholds: false,
            }],
        ));

        let ctr = obs.snapshot();
        assert_eq!(ctr.decisions, 3);
        assert_eq!(ctr.failover_triggers, 1);
        assert_eq!(ctr.degraded_choices, 1);
    }

    #[test]
    fn recorder_flushes_on_drop() {
        let obs = Arc::new(LogObserver::new());
        {
            let recorder = DecisionRecorder::new(obs.clone());
            for _ in 0..10 {
                assert!(recorder.record(event("a", "steady_state", vec![])));
            }
        }
        assert_eq!(obs.snapshot().decisions, 10);
    }

    #[test]
    fn events_serialize_to_json() {
        let e = event("nyc", "return_to_primary", vec![]);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"selected_path\":\"nyc\""));
        assert!(json.contains("return_to_primary"));
    }
}
