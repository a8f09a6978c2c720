//! Resource reconciliation core
//!
//! This module turns declared resources into concrete OpenStack resources
//! and waits for them to become usable. It only talks to the cloud through
//! the [`ProviderClient`] capability, so it runs the same against the REST
//! provider and against test doubles.
//!
//! # Architecture
//!
//! - [`provider`] - Capability trait, handles, descriptors, attribute merge
//! - [`reconciler`] - Adopt-or-create with id/name resolution
//! - [`waiter`] - Bounded polling for a target status
//! - [`attachment`] - "Is X attached to Y" lookups
//! - [`policy`] - Security-group style list attachment
//! - [`registry`] - Resource kind definitions from embedded JSON
//! - [`rest`] - `ProviderClient` over the OpenStack REST APIs
//!
//! # Resource Definitions
//!
//! Kinds are defined in JSON files under `src/resources/`:
//! - `cinder.json` - block storage volumes
//! - `neutron.json` - network ports
//!
//! # Example
//!
//! ```ignore
//! use osops::resource::{Reconciler, ResourceDescriptor, RestProvider, StateWaiter, WaitSpec};
//!
//! async fn ensure_volume(client: OsClient) -> anyhow::Result<String> {
//!     let volumes = RestProvider::new(client, "volume")?;
//!     let handle = Reconciler::new(&volumes)
//!         .reconcile(&ResourceDescriptor::existing("data"))
//!         .await?;
//!     let errors = &volumes.definition().error_statuses;
//!     StateWaiter::new(&volumes, errors)
//!         .wait_until(&handle.id, &WaitSpec::for_status("available"))
//!         .await?;
//!     Ok(handle.id)
//! }
//! ```

pub mod attachment;
pub mod error;
pub mod policy;
pub mod provider;
pub mod reconciler;
mod registry;
pub mod rest;
pub mod waiter;

#[cfg(test)]
pub(crate) mod fake;

pub use attachment::find_attachment;
pub use error::ResourceError;
pub use policy::{attach_policy, Ownership, PolicyList};
pub use provider::{
    merge_attributes, Attributes, AttachmentRef, ProviderClient, ResourceDescriptor,
    ResourceHandle, Sleeper, TokioSleeper,
};
pub use reconciler::{is_canonical_id, Reconciler, Relationship};
pub use registry::*;
pub use rest::RestProvider;
pub use waiter::{StateWaiter, WaitOutcome, WaitSpec};
