//! Concurrency core of a simulated smart packet router.
//!
//! A single control plane publishes routing state (service registry, per-path
//! metrics, the active selection policy); data-plane workers consume it and
//! make per-packet path decisions with no locks, no allocations, and bounded
//! retries on the hot path.

pub mod config;
pub mod obs;
pub mod packet;
pub mod pool;
pub mod routing;
pub mod rt;
pub mod spsc;
pub mod worker;

// Re-exports for the common wiring paths.
pub use config::RouterConfig;
pub use packet::{Packet, PacketHandle};
pub use pool::PacketPool;
pub use routing::binding::PolicyBinding;
pub use routing::path::{
    CandidateRef, ChoosePolicy, FlowHashPolicy, LatencyAwareConfig, LatencyAwarePolicy,
    MetricsSlot, PacketContext, PathId, PathMetrics, RoundRobinPolicy,
};
pub use routing::pop::{Health, Pop, PopList};
pub use routing::registry::{RegistryError, ServiceRegistry};
pub use spsc::{SpscError, SpscRing};
pub use worker::{DpWorker, PathTable};
