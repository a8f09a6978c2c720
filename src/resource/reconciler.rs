//! Resource Reconciler
//!
//! Resolves a [`ResourceDescriptor`] to a concrete [`ResourceHandle`] by
//! either adopting an existing resource (by id or unique name) or creating
//! a new one. Adoption only reads; creation issues exactly one write. No
//! compensation is attempted on failure, rollback is the caller's policy.

use super::error::ResourceError;
use super::provider::{
    merge_attributes, Attributes, ProviderClient, ResourceDescriptor, ResourceHandle,
};
use serde_json::Value;
use uuid::Uuid;

/// Required relationship between an adopted resource and another resource
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Kind of the related resource, for messages (e.g. `network`)
    pub related_kind: String,
    /// Dotted path of the field on the adopted resource
    pub field: String,
    /// Id the field must hold
    pub expected: String,
}

impl Relationship {
    pub fn new(related_kind: &str, field: &str, expected: &str) -> Self {
        Self {
            related_kind: related_kind.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Fail with a conflict unless `handle` points at the expected resource
    pub fn verify(&self, kind: &str, handle: &ResourceHandle) -> Result<(), ResourceError> {
        if handle.field_str(&self.field) == Some(self.expected.as_str()) {
            return Ok(());
        }
        Err(ResourceError::not_connected(
            kind,
            &handle.id,
            &self.related_kind,
            &self.expected,
        ))
    }
}

/// Whether `value` is a provider id in canonical form
///
/// Canonical means a UUID rendered lowercase and hyphenated
/// (`aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa`); anything else is a name.
pub fn is_canonical_id(value: &str) -> bool {
    Uuid::parse_str(value)
        .map(|id| id.hyphenated().to_string() == value)
        .unwrap_or(false)
}

/// Name used when a new resource gets no explicit one: `<kind>_<8 hex>`
pub fn default_resource_name(kind: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", kind, &id[..8])
}

pub struct Reconciler<'a, P: ?Sized> {
    provider: &'a P,
    name_field: String,
    defaults: Attributes,
}

impl<'a, P: ProviderClient + ?Sized> Reconciler<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            name_field: "name".to_string(),
            defaults: Attributes::new(),
        }
    }

    /// Attribute that carries the resource name on create
    pub fn name_field(mut self, field: &str) -> Self {
        self.name_field = field.to_string();
        self
    }

    /// Create defaults applied beneath the name and caller attributes
    pub fn defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    /// Adopt or create the resource described by `descriptor`
    pub async fn reconcile(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ResourceHandle, ResourceError> {
        self.reconcile_verified(descriptor, None).await
    }

    /// Like [`Reconciler::reconcile`], verifying `relationship` on adoption
    pub async fn reconcile_verified(
        &self,
        descriptor: &ResourceDescriptor,
        relationship: Option<&Relationship>,
    ) -> Result<ResourceHandle, ResourceError> {
        let kind = self.provider.kind();

        if descriptor.use_existing {
            let handle = self.resolve(&descriptor.identifier).await?;
            if let Some(relationship) = relationship {
                relationship.verify(kind, &handle)?;
            }
            tracing::info!("Using external {} {} ({})", kind, handle.id, handle.name);
            return Ok(handle);
        }

        let name = if descriptor.identifier.is_empty() {
            default_resource_name(kind)
        } else {
            descriptor.identifier.clone()
        };

        let mut defaults = self.defaults.clone();
        defaults.insert(self.name_field.clone(), Value::String(name));
        let attributes = merge_attributes(&defaults, &descriptor.attributes);

        let handle = self.provider.create(&attributes).await?;
        tracing::info!("Created {} {} ({})", kind, handle.id, handle.name);
        Ok(handle)
    }

    /// Resolve an id or unique name to a handle
    pub async fn resolve(&self, identifier: &str) -> Result<ResourceHandle, ResourceError> {
        let kind = self.provider.kind();

        if is_canonical_id(identifier) {
            return self
                .provider
                .fetch_by_id(identifier)
                .await?
                .ok_or_else(|| ResourceError::not_found(kind, identifier));
        }

        let mut matches = self
            .provider
            .list_all()
            .await?
            .into_iter()
            .filter(|h| h.name == identifier);

        match (matches.next(), matches.count()) {
            (None, _) => Err(ResourceError::not_found(kind, identifier)),
            (Some(handle), 0) => Ok(handle),
            (Some(_), extra) => Err(ResourceError::Ambiguous {
                kind: kind.to_string(),
                name: identifier.to_string(),
                count: extra + 1,
            }),
        }
    }
}
