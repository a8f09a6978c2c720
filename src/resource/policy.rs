//! Security-group style relationship mutation
//!
//! A resource carries a list of policy ids (Neutron port
//! `security_groups`). Attaching a policy either verifies an adopted
//! relationship or appends to the list.
//!
//! The append is a read-modify-write and is NOT atomic: a concurrent change
//! to the same list between the fetch and the update is lost. The provider
//! API has no atomic append, so callers must serialize `attach_policy` per
//! resource.

use super::error::ResourceError;
use super::provider::{Attributes, ProviderClient};
use serde::Deserialize;
use serde_json::Value;

/// List field holding ids of a policy kind (`security_groups` of
/// `security_group`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyList {
    pub kind: String,
    pub field: String,
}

impl PolicyList {
    pub fn new(kind: &str, field: &str) -> Self {
        Self {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }
}

/// Who manages the relationship being attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Both ends pre-exist; the relationship must already be in place
    External,
    /// The relationship is created by this run
    Owned,
}

impl Ownership {
    pub fn from_external(external: bool) -> Self {
        if external {
            Self::External
        } else {
            Self::Owned
        }
    }
}

/// Attach `policy_id` to the `policy.field` list of `resource_id`
pub async fn attach_policy<P: ProviderClient + ?Sized>(
    provider: &P,
    policy: &PolicyList,
    resource_id: &str,
    policy_id: &str,
    ownership: Ownership,
) -> Result<(), ResourceError> {
    let kind = provider.kind();
    let handle = provider
        .fetch_by_id(resource_id)
        .await?
        .ok_or_else(|| ResourceError::not_found(kind, resource_id))?;
    let mut policies = handle.string_list(&policy.field);

    match ownership {
        Ownership::External => {
            if policies.iter().any(|p| p == policy_id) {
                return Ok(());
            }
            Err(ResourceError::not_connected(
                kind,
                resource_id,
                &policy.kind,
                policy_id,
            ))
        }
        Ownership::Owned => {
            tracing::info!(
                "Attaching {} to {} {} (current: {:?})",
                policy_id,
                kind,
                resource_id,
                policies
            );
            policies.push(policy_id.to_string());

            let mut fields = Attributes::new();
            fields.insert(
                policy.field.clone(),
                Value::Array(policies.into_iter().map(Value::String).collect()),
            );
            provider.update(resource_id, &fields).await?;
            Ok(())
        }
    }
}
