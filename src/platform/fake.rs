use crate::platform::error::ApiError;
use crate::platform::platform::Platform;
use crate::platform::resource::{resource_id, resource_name, ResourceKind};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

const VALID_SIZES: [&str; 4] = ["S", "M", "L", "XL"];

#[derive(Default)]
struct FakeState {
    /// Documents per kind, in creation order
    resources: HashMap<ResourceKind, Vec<Value>>,
    content: HashMap<String, Bytes>,
    sequence: u64,
    calls: HashMap<(ResourceKind, &'static str), usize>,
    fail_deletes: HashSet<String>,
    transient_failures: HashMap<ResourceKind, usize>,
    job_updates: HashMap<String, VecDeque<Value>>,
    deleted: Vec<(ResourceKind, String)>,
}

impl FakeState {
    fn record(&mut self, kind: ResourceKind, op: &'static str) -> Result<(), ApiError> {
        *self.calls.entry((kind, op)).or_default() += 1;
        if op == "create" || op == "delete" {
            return Ok(());
        }
        match self.transient_failures.get_mut(&kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::Transport {
                    kind,
                    reason: "503 Service Unavailable".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn insert(&mut self, kind: ResourceKind, space_id: Option<&str>, name: &str, entity: Value) -> Value {
        self.sequence += 1;
        let id = format!("{}-{}", id_prefix(kind), self.sequence);
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(self.sequence as i64);
        let doc = json!({
            "metadata": {
                "id": id,
                "name": name,
                "space_id": space_id,
                "created_at": created_at.to_rfc3339(),
                "href": format!("{}/{}", kind.path(), id),
            },
            "entity": entity,
        });
        self.resources.entry(kind).or_default().push(doc.clone());
        doc
    }

    fn exists(&self, kind: ResourceKind, space_id: Option<&str>, id: &str) -> bool {
        self.find(kind, space_id, id).is_some()
    }

    fn find(&self, kind: ResourceKind, space_id: Option<&str>, id: &str) -> Option<usize> {
        self.resources.get(&kind)?.iter().position(|doc| {
            resource_id(doc) == Some(id) && in_space(doc, space_id)
        })
    }
}

fn id_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Space => "space",
        ResourceKind::SoftwareSpecification => "spec",
        ResourceKind::Model => "model",
        ResourceKind::Deployment => "deployment",
        ResourceKind::Job => "job",
        ResourceKind::Connection => "connection",
        ResourceKind::Catalog => "catalog",
    }
}

fn in_space(doc: &Value, space_id: Option<&str>) -> bool {
    match space_id {
        None => true,
        Some(space_id) => doc.pointer("/metadata/space_id").and_then(Value::as_str) == Some(space_id),
    }
}

fn rejected(kind: ResourceKind, message: String) -> ApiError {
    ApiError::Rejected {
        kind,
        status: 400,
        message,
    }
}

/// `FakePlatform` is an in-memory implementation of the `Platform` trait for testing purposes.
/// It validates references the way the real platform does, records calls per kind,
/// and allows simulating failures and scripted job progress.
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakePlatform {
    /// Create a new empty FakePlatform instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource directly, bypassing call recording; returns its id
    pub fn fake_add(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        name: &str,
        entity: Value,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let doc = state.insert(kind, space_id, name, entity);
        resource_id(&doc).unwrap_or_default().to_string()
    }

    /// Seed the catalog with a software specification
    pub fn fake_add_software_specification(&self, name: &str) -> String {
        self.fake_add(
            ResourceKind::SoftwareSpecification,
            None,
            name,
            json!({ "software_specification": { "type": "base", "display_name": name } }),
        )
    }

    /// Make every delete of `id` fail with a transport error
    pub fn fake_fail_delete(&self, id: &str) {
        self.state.lock().unwrap().fail_deletes.insert(id.to_string());
    }

    /// Fail the next `count` list/get calls on `kind` with a transport error
    pub fn fake_fail_transiently(&self, kind: ResourceKind, count: usize) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(kind, count);
    }

    /// Queue a `decision_optimization` patch applied on the next fetch of `job_id`
    pub fn fake_push_job_update(&self, job_id: &str, patch: Value) {
        self.state
            .lock()
            .unwrap()
            .job_updates
            .entry(job_id.to_string())
            .or_default()
            .push_back(patch);
    }

    /// Number of calls of `op` ("list", "get", "create", "delete", "upload") on `kind`
    pub fn calls(&self, kind: ResourceKind, op: &'static str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&(kind, op))
            .copied()
            .unwrap_or(0)
    }

    /// Number of resources of `kind` currently stored, optionally within a space
    pub fn count(&self, kind: ResourceKind, space_id: Option<&str>) -> usize {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(&kind)
            .map(|docs| docs.iter().filter(|d| in_space(d, space_id)).count())
            .unwrap_or(0)
    }

    pub fn document(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .find(kind, None, id)
            .map(|index| state.resources[&kind][index].clone())
    }

    /// Successful deletes, in the order they happened
    pub fn deleted(&self) -> Vec<(ResourceKind, String)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn content(&self, id: &str) -> Option<Bytes> {
        self.state.lock().unwrap().content.get(id).cloned()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn list(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(kind, "list")?;

        let name_filter = filters
            .iter()
            .find(|(key, _)| *key == "name")
            .map(|(_, value)| *value);

        Ok(state
            .resources
            .get(&kind)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| in_space(doc, space_id))
                    .filter(|doc| name_filter.map_or(true, |name| resource_name(doc) == Some(name)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(kind, "get")?;

        let index = state.find(kind, space_id, id).ok_or(ApiError::NotFound {
            kind,
            id: id.to_string(),
        })?;

        let patch = state
            .job_updates
            .get_mut(id)
            .and_then(|updates| updates.pop_front());

        let doc = &mut state.resources.get_mut(&kind).unwrap()[index];
        if let Some(Value::Object(patch)) = patch {
            if let Some(target) = doc
                .pointer_mut("/entity/decision_optimization")
                .and_then(Value::as_object_mut)
            {
                for (key, value) in patch {
                    target.insert(key, value);
                }
            }
        }
        Ok(doc.clone())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(kind, "create")?;

        let name = body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut entity = body.clone();

        match kind {
            ResourceKind::Deployment => {
                let model_id = body.pointer("/asset/id").and_then(Value::as_str).unwrap_or_default();
                if !state.exists(ResourceKind::Model, space_id, model_id) {
                    return Err(rejected(kind, format!("Model {} does not exist", model_id)));
                }
                let size = body
                    .pointer("/hardware_spec/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !VALID_SIZES.contains(&size) {
                    return Err(rejected(kind, format!("Unknown hardware spec '{}'", size)));
                }
            }
            ResourceKind::Job => {
                let deployment_id = body
                    .pointer("/deployment/id")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !state.exists(ResourceKind::Deployment, space_id, deployment_id) {
                    return Err(rejected(
                        kind,
                        format!("Deployment {} does not exist", deployment_id),
                    ));
                }
                if let Some(decision) = entity
                    .get_mut("decision_optimization")
                    .and_then(Value::as_object_mut)
                {
                    decision.insert("status".to_string(), json!({ "state": "queued" }));
                }
            }
            ResourceKind::Space => {
                if let Some(crn) = body.pointer("/storage/resource_crn").cloned() {
                    let sequence = state.sequence + 1;
                    let mut storage = Map::new();
                    storage.insert("type".to_string(), json!("bmcos_object_storage"));
                    storage.insert("resource_crn".to_string(), crn);
                    storage.insert(
                        "properties".to_string(),
                        json!({
                            "bucket_name": format!("space-{}-storage", sequence),
                            "endpoint_url": "https://s3.fake.example.com",
                        }),
                    );
                    entity["storage"] = Value::Object(storage);
                }
            }
            _ => {}
        }

        let doc = state.insert(kind, space_id, &name, entity);
        if kind == ResourceKind::Space {
            // Every space comes with its own asset catalog
            let space = resource_id(&doc).unwrap_or_default().to_string();
            state.insert(ResourceKind::Catalog, Some(space.as_str()), &name, json!({}));
        }
        Ok(doc)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(kind, "delete")?;

        if state.fail_deletes.contains(id) {
            return Err(ApiError::Transport {
                kind,
                reason: format!("Simulated failure deleting {}", id),
            });
        }

        let index = state.find(kind, space_id, id).ok_or(ApiError::NotFound {
            kind,
            id: id.to_string(),
        })?;
        state.resources.get_mut(&kind).unwrap().remove(index);
        state.content.remove(id);
        state.deleted.push((kind, id.to_string()));
        Ok(())
    }

    async fn upload_content(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
        content: Bytes,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.record(kind, "upload")?;

        if !state.exists(kind, space_id, id) {
            return Err(ApiError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        state.content.insert(id.to_string(), content);
        Ok(())
    }
}
