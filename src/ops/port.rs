//! Network port operations

use super::{OpContext, RuntimeProperties, COMMON_RUNTIME_KEYS, EXTERNAL_ID, EXTERNAL_TYPE};
use crate::resource::{
    attach_policy, Attributes, Ownership, ProviderClient, Reconciler, Relationship,
    ResourceDescriptor,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PORT_TYPE: &str = "port";
pub const NETWORK_TYPE: &str = "network";

/// Declared properties of a port node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortProperties {
    /// Name of the new port, or id/name of the existing one
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub use_external_resource: bool,
    /// Extra create attributes (`fixed_ips`, `admin_state_up`, ...)
    #[serde(default)]
    pub port: Attributes,
}

/// Create or adopt a port on `network_id`
///
/// An adopted port must already sit on `network_id` when one is given. A
/// new port needs `network_id` and starts with no security groups;
/// `props.port` overrides any default.
pub async fn create<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    props: &PortProperties,
    network_id: Option<&str>,
) -> Result<RuntimeProperties> {
    let reconciler = Reconciler::new(ctx.provider).name_field(&ctx.def.name_field);
    let network_field = ctx.def.related_field(NETWORK_TYPE).unwrap_or("network_id");

    let handle = if props.use_external_resource {
        let relationship = network_id.map(|id| Relationship::new(NETWORK_TYPE, network_field, id));
        reconciler
            .reconcile_verified(
                &ResourceDescriptor::existing(props.resource_id.clone()),
                relationship.as_ref(),
            )
            .await?
    } else {
        let network_id = network_id.with_context(|| {
            format!("Creating port '{}' requires a network", props.resource_id)
        })?;
        let mut defaults = Attributes::new();
        defaults.insert(
            network_field.to_string(),
            Value::String(network_id.to_string()),
        );
        if let Some(policy) = &ctx.def.policy {
            defaults.insert(policy.field.clone(), Value::Array(Vec::new()));
        }
        reconciler
            .defaults(defaults)
            .reconcile(&ResourceDescriptor::create(
                props.resource_id.clone(),
                props.port.clone(),
            ))
            .await?
    };

    let mut runtime = RuntimeProperties::new();
    runtime.set(EXTERNAL_ID, handle.id);
    runtime.set(EXTERNAL_TYPE, PORT_TYPE);
    Ok(runtime)
}

/// Delete the port unless it was adopted; always clear its runtime keys
pub async fn delete<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    props: &PortProperties,
    runtime: &mut RuntimeProperties,
) -> Result<()> {
    if !props.use_external_resource {
        let port_id = runtime.require_str(EXTERNAL_ID)?.to_string();
        ctx.provider
            .delete(&port_id)
            .await
            .with_context(|| format!("Failed to delete port {}", port_id))?;
        tracing::info!("Deleted port {}", port_id);
    }

    for key in COMMON_RUNTIME_KEYS {
        runtime.remove(key);
    }
    Ok(())
}

/// Put the port recorded in `runtime` into `security_group_id`
///
/// For an external relationship the group must already be on the port. For
/// an owned one the group is appended; see [`attach_policy`] for why that
/// must not run concurrently for the same port.
pub async fn connect_security_group<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    runtime: &RuntimeProperties,
    security_group_id: &str,
    ownership: Ownership,
) -> Result<()> {
    let port_id = runtime.require_str(EXTERNAL_ID)?;
    let policy = ctx
        .def
        .policy
        .as_ref()
        .context("Port definition has no security group field")?;

    tracing::info!(
        "connect_security_group(): port={} security_group={} ownership={:?}",
        port_id,
        security_group_id,
        ownership
    );
    attach_policy(
        ctx.provider,
        policy,
        port_id,
        security_group_id,
        ownership,
    )
    .await?;
    Ok(())
}
