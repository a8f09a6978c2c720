//! Relationship attachment lookup

use super::error::ResourceError;
use super::provider::{AttachmentRef, ProviderClient};
use super::reconciler::Reconciler;

/// Find the attachment of `resource` (id or name) owned by `owner_id`
///
/// Read-only: resolves the resource, then scans its attachments in provider
/// order. `Ok(None)` means the resource exists but is not attached to the
/// owner.
pub async fn find_attachment<P: ProviderClient + ?Sized>(
    provider: &P,
    resource: &str,
    owner_id: &str,
) -> Result<Option<AttachmentRef>, ResourceError> {
    let handle = Reconciler::new(provider).resolve(resource).await?;
    Ok(handle.find_attachment(owner_id).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fake::{handle, FakeProvider};
    use serde_json::json;

    const VOLUME_ID: &str = "9b0e6c41-7d2f-4c3a-b8e5-1f6a2d9c0e73";

    fn attached_volume() -> FakeProvider {
        let mut volume = handle(VOLUME_ID, "data", "in-use");
        volume.attachments = vec![
            AttachmentRef {
                owner_id: "server-1".to_string(),
                raw: json!({"server_id": "server-1", "device": "/dev/vdb"}),
            },
            AttachmentRef {
                owner_id: "server-2".to_string(),
                raw: json!({"server_id": "server-2", "device": "/dev/vdc"}),
            },
        ];
        FakeProvider::new("volume").with(volume)
    }

    #[tokio::test]
    async fn test_finds_attachment_by_owner() {
        let provider = attached_volume();
        let found = find_attachment(&provider, VOLUME_ID, "server-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.raw["device"], "/dev/vdc");
        assert!(provider.updates().is_empty());
    }

    #[tokio::test]
    async fn test_unattached_owner_is_none() {
        let provider = attached_volume();
        let found = find_attachment(&provider, "data", "server-9").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unknown_resource_is_not_found() {
        let provider = attached_volume();
        let err = find_attachment(&provider, "missing", "server-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
    }
}
