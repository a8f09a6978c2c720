//! Block storage volume operations

use super::{OpContext, RuntimeProperties};
use crate::resource::{
    find_attachment, AttachmentRef, Attributes, ProviderClient, Reconciler, ResourceDescriptor,
    StateWaiter, WaitSpec,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const VOLUME_ID: &str = "volume_id";
pub const VOLUME_DEVICE_NAME: &str = "volume_device_name";

const DEFAULT_DEVICE_NAME: &str = "auto";

/// Declared properties of a volume node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProperties {
    /// Name of the new volume, or id/name of the existing one
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub use_external_resource: bool,
    /// Device the volume should appear as once attached
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Extra create attributes (`size`, `volume_type`, ...)
    #[serde(default)]
    pub volume: Attributes,
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

impl Default for VolumeProperties {
    fn default() -> Self {
        Self {
            resource_id: String::new(),
            use_external_resource: false,
            device_name: default_device_name(),
            volume: Attributes::new(),
        }
    }
}

impl VolumeProperties {
    fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            use_existing: self.use_external_resource,
            identifier: self.resource_id.clone(),
            attributes: self.volume.clone(),
        }
    }
}

/// Create or adopt a volume and wait for it to become available
///
/// A volume that is still not ready when the budget runs out is recorded
/// anyway; the wait logs a warning and the next step decides.
pub async fn create<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    props: &VolumeProperties,
    wait: &WaitSpec,
) -> Result<RuntimeProperties> {
    let handle = Reconciler::new(ctx.provider)
        .name_field(&ctx.def.name_field)
        .reconcile(&props.descriptor())
        .await?;

    let outcome = StateWaiter::new(ctx.provider, &ctx.def.error_statuses)
        .with_sleeper(ctx.sleeper)
        .wait_until(&handle.id, wait)
        .await?;

    tracing::info!(
        "Volume {} ready: {} (status '{}')",
        handle.id,
        outcome.reached_target,
        outcome.handle.status
    );

    let mut runtime = RuntimeProperties::new();
    runtime.set(VOLUME_ID, handle.id);
    runtime.set(VOLUME_DEVICE_NAME, props.device_name.clone());
    Ok(runtime)
}

/// Delete the volume unless it was adopted
pub async fn delete<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    props: &VolumeProperties,
    runtime: &mut RuntimeProperties,
) -> Result<()> {
    if props.use_external_resource {
        tracing::info!("Leaving external volume {} in place", props.resource_id);
        return Ok(());
    }

    let volume_id = runtime.require_str(VOLUME_ID)?.to_string();
    ctx.provider
        .delete(&volume_id)
        .await
        .with_context(|| format!("Failed to delete volume {}", volume_id))?;
    runtime.remove(VOLUME_ID);
    tracing::info!("Deleted volume {}", volume_id);
    Ok(())
}

/// Attachment of `volume` (id or name) to `server_id`, if any
pub async fn get_attachment<P: ProviderClient + ?Sized>(
    ctx: &OpContext<'_, P>,
    volume: &str,
    server_id: &str,
) -> Result<Option<AttachmentRef>> {
    Ok(find_attachment(ctx.provider, volume, server_id).await?)
}
