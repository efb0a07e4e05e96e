//! Real-time affinity and scheduling helpers for the current thread.
//!
//! Mechanism only: applying a [`RtConfig`] pins the calling thread and sets
//! its scheduler policy/priority. Which priorities to use is policy and
//! lives in [`prio`]. Everything here is best-effort; failure never aborts
//! the program (real-time policies usually need elevated privileges).

/// Real-time scheduling policy.
///
/// `Fifo` is fixed-priority run-to-block; `RoundRobin` time-slices among
/// equal priorities (prefer it when several threads share one priority).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RtSchedPolicy {
    #[default]
    Fifo,
    RoundRobin,
}

/// RT configuration for the current thread.
#[derive(Debug, Clone, Copy)]
pub struct RtConfig {
    /// CPU index to pin to; -1 skips pinning.
    pub cpu: i32,
    pub policy: RtSchedPolicy,
    /// RT priority (Linux SCHED_FIFO/RR range is typically 1..=99). No
    /// default on purpose; callers pick from [`prio`].
    pub priority: i32,
}

/// Priority presets for the router's thread roles. Mid-band values leave
/// headroom for exceptional tasks.
pub mod prio {
    /// General-purpose RT work (telemetry, soft tasks).
    pub const DEFAULT: i32 = 50;
    /// Ingress worker (RX).
    pub const RX: i32 = 60;
    /// Egress worker (TX); slightly above RX to drain promptly.
    pub const TX: i32 = 70;
    /// Critical short-lived tasks (watchdog). Use sparingly.
    pub const WATCHDOG: i32 = 80;
}

/// Apply CPU affinity (optional) and RT policy/priority to the current
/// thread. Returns true when both steps succeeded on this platform.
#[cfg(target_os = "linux")]
pub fn bind_and_prioritize(cfg: &RtConfig) -> bool {
    set_affinity(cfg.cpu) && set_sched(cfg.policy, cfg.priority)
}

/// Non-Linux targets: unsupported, reported as failure.
#[cfg(not(target_os = "linux"))]
pub fn bind_and_prioritize(_cfg: &RtConfig) -> bool {
    false
}

/// Pin the current thread to `cpu` (skipped for negative values).
/// Affinity is applied before the policy change so the thread does not
/// migrate after becoming RT.
#[cfg(target_os = "linux")]
fn set_affinity(cpu: i32) -> bool {
    if cpu < 0 {
        return true;
    }
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu as usize, &mut set);
        libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        ) == 0
    }
}

#[cfg(target_os = "linux")]
fn set_sched(policy: RtSchedPolicy, priority: i32) -> bool {
    let policy = match policy {
        RtSchedPolicy::Fifo => libc::SCHED_FIFO,
        RtSchedPolicy::RoundRobin => libc::SCHED_RR,
    };
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        libc::pthread_setschedparam(libc::pthread_self(), policy, &param) == 0
    }
}
