//! In-memory provider and sleeper used by unit tests

use super::provider::{Attributes, ProviderClient, ResourceHandle, Sleeper};
use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Call log and contents of a [`FakeProvider`]
#[derive(Default)]
pub(crate) struct FakeState {
    pub resources: Vec<ResourceHandle>,
    /// Statuses handed out by successive fetches of an id; the last one sticks
    pub status_script: HashMap<String, VecDeque<String>>,
    /// Status script installed for the next created resource
    pub created_script: Option<VecDeque<String>>,
    pub fetch_calls: usize,
    pub list_calls: usize,
    pub created: Vec<Attributes>,
    pub updates: Vec<(String, Attributes)>,
    pub deletes: Vec<String>,
}

pub(crate) struct FakeProvider {
    kind: String,
    pub state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with(self, handle: ResourceHandle) -> Self {
        self.state.lock().unwrap().resources.push(handle);
        self
    }

    pub fn script(self, id: &str, statuses: &[&str]) -> Self {
        self.state.lock().unwrap().status_script.insert(
            id.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn script_created(self, statuses: &[&str]) -> Self {
        self.state.lock().unwrap().created_script =
            Some(statuses.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn created(&self) -> Vec<Attributes> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn updates(&self) -> Vec<(String, Attributes)> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }
}

/// Handle with the given identity and an object document mirroring it
pub(crate) fn handle(id: &str, name: &str, status: &str) -> ResourceHandle {
    ResourceHandle {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        attachments: Vec::new(),
        raw: serde_json::json!({"id": id, "name": name, "status": status}),
    }
}

/// Same as [`handle`] with extra document fields
pub(crate) fn handle_with(id: &str, name: &str, status: &str, extra: Value) -> ResourceHandle {
    let mut h = handle(id, name, status);
    if let (Value::Object(raw), Value::Object(extra)) = (&mut h.raw, extra) {
        raw.extend(extra);
    }
    h
}

impl ProviderClient for FakeProvider {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn fetch_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<ResourceHandle>>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.fetch_calls += 1;
            let next_status = state
                .status_script
                .get_mut(id)
                .and_then(|script| {
                    if script.len() > 1 {
                        script.pop_front()
                    } else {
                        script.front().cloned()
                    }
                });
            let Some(resource) = state.resources.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            if let Some(status) = next_status {
                resource.status = status;
            }
            Ok(Some(resource.clone()))
        })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<ResourceHandle>>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            Ok(state.resources.clone())
        })
    }

    fn create<'a>(&'a self, attributes: &'a Attributes) -> BoxFuture<'a, Result<ResourceHandle>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.created.push(attributes.clone());
            let id = uuid::Uuid::new_v4().to_string();
            let name = attributes
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mut created = handle(&id, name, "creating");
            if let Value::Object(raw) = &mut created.raw {
                raw.extend(attributes.clone());
                raw.insert("id".to_string(), Value::String(id.clone()));
            }
            if let Some(script) = state.created_script.take() {
                state.status_script.insert(id.clone(), script);
            }
            state.resources.push(created.clone());
            Ok(created)
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.deletes.push(id.to_string());
            state.resources.retain(|r| r.id != id);
            Ok(())
        })
    }

    fn update<'a>(&'a self, id: &'a str, fields: &'a Attributes) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.updates.push((id.to_string(), fields.clone()));
            if let Some(resource) = state.resources.iter_mut().find(|r| r.id == id) {
                if let Value::Object(raw) = &mut resource.raw {
                    raw.extend(fields.clone());
                }
            }
            Ok(())
        })
    }
}

/// Sleeper that returns immediately and remembers what it was asked
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }

    pub fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.slept.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}
