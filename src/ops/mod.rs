//! Orchestration operations for volumes and ports
//!
//! Each operation reads declared node properties, reconciles and (for
//! volumes) waits through the resource core, and hands back the runtime
//! properties the orchestration host persists for later steps. The host
//! owns persistence; operations only read and return [`RuntimeProperties`].

pub mod port;
pub mod volume;

use crate::resource::{ProviderClient, ResourceDef, Sleeper, TokioSleeper};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Id of the OpenStack resource backing a node
pub const EXTERNAL_ID: &str = "external_id";
/// Kind of the OpenStack resource backing a node
pub const EXTERNAL_TYPE: &str = "external_type";
/// Keys every node that wraps an OpenStack resource carries
pub const COMMON_RUNTIME_KEYS: &[&str] = &[EXTERNAL_ID, EXTERNAL_TYPE];

/// Values an operation hands back to the orchestration host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeProperties(Map<String, Value>);

impl RuntimeProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String value of `key`, failing when it was never recorded
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .with_context(|| format!("Runtime property '{}' is not set", key))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Collaborators an operation runs against
pub struct OpContext<'a, P: ?Sized> {
    pub provider: &'a P,
    pub def: &'a ResourceDef,
    pub sleeper: &'a dyn Sleeper,
}

impl<'a, P: ProviderClient + ?Sized> OpContext<'a, P> {
    pub fn new(provider: &'a P, def: &'a ResourceDef) -> Self {
        Self {
            provider,
            def,
            sleeper: &TokioSleeper,
        }
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }
}
