//! Resource Registry - Load resource kind definitions from JSON
//!
//! This module loads the OpenStack resource kinds this tool manages from
//! embedded JSON files and provides lookup functions for the providers and
//! operations.

use super::policy::PolicyList;
use super::provider::{lookup_path, AttachmentRef, ResourceHandle};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/cinder.json"),
    include_str!("../resources/neutron.json"),
];

/// Resource kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Keystone catalog service type (`volumev3`, `network`)
    pub service_type: String,
    /// Path of the collection under the service endpoint
    pub collection_path: String,
    /// Path listing every resource with full details
    pub list_path: String,
    /// Envelope key of a single resource document
    pub singular_key: String,
    /// Envelope key of a list response
    pub plural_key: String,
    pub id_field: String,
    pub name_field: String,
    pub status_field: String,
    #[serde(default)]
    pub attachments_path: Option<String>,
    #[serde(default)]
    pub attachment_owner_field: Option<String>,
    /// List field mutated by policy attachment
    #[serde(default)]
    pub policy: Option<PolicyList>,
    /// Status meaning "ready for use", if the kind has one worth waiting for
    #[serde(default)]
    pub ready_status: Option<String>,
    /// Statuses from which the resource never recovers on its own
    #[serde(default)]
    pub error_statuses: Vec<String>,
    /// Related kind -> field holding its id
    #[serde(default)]
    pub related: HashMap<String, String>,
}

impl ResourceDef {
    /// Map a provider document to a handle
    pub fn handle_from(&self, doc: Value) -> Result<ResourceHandle> {
        let id = lookup_path(&doc, &self.id_field)
            .and_then(Value::as_str)
            .with_context(|| format!("{} document has no '{}'", self.singular_key, self.id_field))?
            .to_string();

        let text = |path: &str| {
            lookup_path(&doc, path)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let attachments = match (&self.attachments_path, &self.attachment_owner_field) {
            (Some(path), Some(owner_field)) => lookup_path(&doc, path)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| {
                            let owner_id = lookup_path(item, owner_field)?.as_str()?;
                            Some(AttachmentRef {
                                owner_id: owner_id.to_string(),
                                raw: item.clone(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        Ok(ResourceHandle {
            name: text(&self.name_field),
            status: text(&self.status_field),
            id,
            attachments,
            raw: doc,
        })
    }

    /// Field on this kind that holds the id of a related kind
    pub fn related_field(&self, related_kind: &str) -> Option<&str> {
        self.related.get(related_kind).map(String::as_str)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by kind
pub fn get_resource(kind: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(kind)
}

/// Get a resource definition by kind, failing for unknown kinds
pub fn require_resource(kind: &str) -> Result<&'static ResourceDef> {
    get_resource(kind).with_context(|| format!("Unknown resource kind: {}", kind))
}

/// Get all resource kinds, sorted
pub fn get_all_resource_kinds() -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    kinds.sort_unstable();
    kinds
}
