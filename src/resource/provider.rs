//! Provider capability and the resource data model
//!
//! [`ProviderClient`] is the only seam between the reconciliation core and a
//! cloud API. The REST implementation lives in [`super::rest`]; tests use an
//! in-memory fake.

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// JSON object used for create attributes and update fields
pub type Attributes = Map<String, Value>;

/// Capability interface over one kind of remote resource
///
/// `fetch_by_id` returns `Ok(None)` when the provider reports the resource
/// as absent; every other failure is an `Err`.
pub trait ProviderClient: Send + Sync {
    /// Registry key of the managed kind (e.g. `volume`, `port`)
    fn kind(&self) -> &str;

    fn fetch_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ResourceHandle>>>;

    /// All resources of this kind visible to the caller's scope
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ResourceHandle>>>;

    fn create<'a>(&'a self, attributes: &'a Attributes) -> BoxFuture<'a, Result<ResourceHandle>>;

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;

    fn update<'a>(&'a self, id: &'a str, fields: &'a Attributes) -> BoxFuture<'a, Result<()>>;
}

/// Suspends the caller between polls; injected so tests never really sleep
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        (**self).sleep(duration)
    }
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Logical description of the resource an operation wants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Adopt an existing resource instead of creating one
    #[serde(default)]
    pub use_existing: bool,
    /// Id or name of the existing resource, or the name of the new one
    #[serde(default)]
    pub identifier: String,
    /// Caller-supplied create attributes; override defaults on collision
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceDescriptor {
    pub fn create(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            use_existing: false,
            identifier: name.into(),
            attributes,
        }
    }

    pub fn existing(identifier: impl Into<String>) -> Self {
        Self {
            use_existing: true,
            identifier: identifier.into(),
            attributes: Attributes::new(),
        }
    }
}

/// Weak reference from a resource to the resource it is attached to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentRef {
    pub owner_id: String,
    /// Provider document of the attachment (device, attachment id, ...)
    #[serde(skip_serializing_if = "Value::is_null")]
    pub raw: Value,
}

/// Concrete remote resource as last seen by a fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceHandle {
    pub id: String,
    pub name: String,
    pub status: String,
    pub attachments: Vec<AttachmentRef>,
    /// Full provider document
    #[serde(skip)]
    pub raw: Value,
}

impl ResourceHandle {
    /// First attachment owned by `owner_id`, in provider order
    pub fn find_attachment(&self, owner_id: &str) -> Option<&AttachmentRef> {
        self.attachments.iter().find(|a| a.owner_id == owner_id)
    }

    /// Look up a field of the provider document by dotted path
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.raw, path)
    }

    /// String value of a field, if present and a string
    pub fn field_str(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    /// String entries of an array field; missing field reads as empty
    pub fn string_list(&self, path: &str) -> Vec<String> {
        self.field(path)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Resolve a dotted path (`a.b.0.c`) inside a JSON document
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, part| match part.parse::<usize>() {
        Ok(idx) if current.is_array() => current.get(idx),
        _ => current.get(part),
    })
}

/// Merge create attributes: `defaults` first, then `overrides` by key
///
/// Keys present in both take the override's value; the result holds the
/// union of keys.
pub fn merge_attributes(defaults: &Attributes, overrides: &Attributes) -> Attributes {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
