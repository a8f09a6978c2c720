//! OpenStack volume and port operations
//!
//! - [`resource`] - reconciliation core (reconciler, state waiter, lookups)
//! - [`openstack`] - Keystone authentication and REST transport
//! - [`ops`] - volume and port node operations
//! - [`config`] - persisted settings and credential resolution

pub mod config;
pub mod openstack;
pub mod ops;
pub mod resource;

/// Version injected at compile time via OSOPS_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("OSOPS_VERSION") {
    Some(v) => v,
    None => "dev",
};
