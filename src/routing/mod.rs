//! Routing layer: service registry, path metrics, selection policies, and
//! the control-plane/data-plane publication cells.

pub mod binding;
pub mod failover;
pub mod ingress;
pub mod oracle;
pub mod path;
pub mod pop;
pub mod qos;
pub mod registry;
