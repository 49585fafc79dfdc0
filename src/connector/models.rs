use crate::platform::{resource_id, resource_name};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on the node count of a deployment
pub const MAX_NODES: u32 = 10;

/// Optimization runtime a model is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Runtime {
    Do12_10,
    Do20_1,
    Do22_1,
}

impl Runtime {
    pub const ALL: [Runtime; 3] = [Runtime::Do12_10, Runtime::Do20_1, Runtime::Do22_1];

    pub fn latest() -> Runtime {
        Runtime::Do22_1
    }

    /// Catalog name of the runtime's software specification
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Do12_10 => "do_12.10",
            Runtime::Do20_1 => "do_20.1",
            Runtime::Do22_1 => "do_22.1",
        }
    }

    fn version(&self) -> &'static str {
        &self.as_str()[3..]
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Runtime::ALL
            .into_iter()
            .find(|r| r.as_str() == s || r.version() == s)
            .ok_or_else(|| format!("unknown runtime '{}'", s))
    }
}

/// Kind of optimization model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelType {
    /// Mathematical programming (LP, MPS, SAV files)
    Cplex,
    /// Constraint programming
    Cpo,
    Opl,
    /// Python model built with docplex
    Docplex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{model_type} models are not supported on runtime {runtime}")]
pub struct UnsupportedModelType {
    pub model_type: ModelType,
    pub runtime: Runtime,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Cplex => "cplex",
            ModelType::Cpo => "cpo",
            ModelType::Opl => "opl",
            ModelType::Docplex => "docplex",
        }
    }

    /// Platform model type for this kind of model on `runtime`
    pub fn type_tag(&self, runtime: Runtime) -> Result<&'static str, UnsupportedModelType> {
        let tag = match (runtime, self) {
            (Runtime::Do12_10, ModelType::Cplex) => Some("do-cplex_12.10"),
            (Runtime::Do12_10, ModelType::Cpo) => Some("do-cpo_12.10"),
            (Runtime::Do12_10, ModelType::Opl) => Some("do-opl_12.10"),
            (Runtime::Do12_10, ModelType::Docplex) => None,
            (Runtime::Do20_1, ModelType::Cplex) => Some("do-cplex_20.1"),
            (Runtime::Do20_1, ModelType::Cpo) => Some("do-cpo_20.1"),
            (Runtime::Do20_1, ModelType::Opl) => Some("do-opl_20.1"),
            (Runtime::Do20_1, ModelType::Docplex) => Some("do-docplex_20.1"),
            (Runtime::Do22_1, ModelType::Cplex) => Some("do-cplex_22.1"),
            (Runtime::Do22_1, ModelType::Cpo) => Some("do-cpo_22.1"),
            (Runtime::Do22_1, ModelType::Opl) => Some("do-opl_22.1"),
            (Runtime::Do22_1, ModelType::Docplex) => Some("do-docplex_22.1"),
        };
        tag.ok_or(UnsupportedModelType {
            model_type: *self,
            runtime,
        })
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cplex" => Ok(ModelType::Cplex),
            "cpo" => Ok(ModelType::Cpo),
            "opl" => Ok(ModelType::Opl),
            "docplex" => Ok(ModelType::Docplex),
            _ => Err(format!("unknown model type '{}'", s)),
        }
    }
}

/// Compute tier of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TShirtSize {
    S,
    M,
    L,
    XL,
}

impl TShirtSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            TShirtSize::S => "S",
            TShirtSize::M => "M",
            TShirtSize::L => "L",
            TShirtSize::XL => "XL",
        }
    }
}

impl fmt::Display for TShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TShirtSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "S" => Ok(TShirtSize::S),
            "M" => Ok(TShirtSize::M),
            "L" => Ok(TShirtSize::L),
            "XL" => Ok(TShirtSize::XL),
            _ => Err(format!("unknown size '{}', expected S, M, L or XL", s)),
        }
    }
}

fn str_at(doc: &Value, pointer: &str) -> Option<String> {
    doc.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

/// Storage bound to a deployment space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceStorage {
    pub kind: String,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub resource_crn: Option<String>,
}

impl SpaceStorage {
    /// Parse the `entity.storage` part of a space document
    pub fn from_document(doc: &Value) -> Option<Self> {
        let storage = doc.pointer("/entity/storage")?;
        Some(Self {
            kind: str_at(storage, "/type").unwrap_or_default(),
            bucket: str_at(storage, "/properties/bucket_name"),
            endpoint: str_at(storage, "/properties/endpoint_url"),
            resource_crn: str_at(storage, "/resource_crn"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSpace {
    pub id: String,
    pub name: String,
    pub storage: Option<SpaceStorage>,
}

impl DeploymentSpace {
    pub fn from_document(doc: &Value) -> Option<Self> {
        Some(Self {
            id: resource_id(doc)?.to_string(),
            name: resource_name(doc).unwrap_or_default().to_string(),
            storage: SpaceStorage::from_document(doc),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareSpecification {
    pub id: String,
    pub name: String,
}

impl SoftwareSpecification {
    pub fn from_document(doc: &Value) -> Option<Self> {
        Some(Self {
            id: resource_id(doc)?.to_string(),
            name: resource_name(doc).unwrap_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAsset {
    pub id: String,
    pub name: String,
    pub type_tag: Option<String>,
    pub software_spec_id: Option<String>,
    pub href: Option<String>,
}

impl ModelAsset {
    pub fn from_document(doc: &Value) -> Option<Self> {
        Some(Self {
            id: resource_id(doc)?.to_string(),
            name: resource_name(doc).unwrap_or_default().to_string(),
            type_tag: str_at(doc, "/entity/type"),
            software_spec_id: str_at(doc, "/entity/software_spec/id"),
            href: str_at(doc, "/metadata/href"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub model_id: Option<String>,
    pub size: Option<String>,
    pub nodes: Option<u32>,
}

impl Deployment {
    pub fn from_document(doc: &Value) -> Option<Self> {
        Some(Self {
            id: resource_id(doc)?.to_string(),
            name: resource_name(doc).unwrap_or_default().to_string(),
            model_id: str_at(doc, "/entity/asset/id"),
            size: str_at(doc, "/entity/hardware_spec/name"),
            nodes: doc
                .pointer("/entity/hardware_spec/num_nodes")
                .and_then(Value::as_u64)
                .map(|n| n as u32),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub deployment_id: Option<String>,
    /// Platform status string, as reported
    pub state: Option<String>,
}

impl JobSummary {
    pub fn from_document(doc: &Value) -> Option<Self> {
        Some(Self {
            id: resource_id(doc)?.to_string(),
            deployment_id: str_at(doc, "/entity/deployment/id"),
            state: str_at(doc, "/entity/decision_optimization/status/state"),
        })
    }
}

/// Number of resources removed by each phase of a space cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub jobs: usize,
    pub deployments: usize,
    pub models: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_runtime_maps_except_docplex_on_12_10() {
        for runtime in Runtime::ALL {
            for model_type in [ModelType::Cplex, ModelType::Cpo, ModelType::Opl, ModelType::Docplex] {
                let tag = model_type.type_tag(runtime);
                if runtime == Runtime::Do12_10 && model_type == ModelType::Docplex {
                    assert!(tag.is_err());
                } else {
                    let tag = tag.unwrap();
                    assert!(tag.starts_with(&format!("do-{}_", model_type)));
                    assert!(tag.ends_with(runtime.version()));
                }
            }
        }
    }

    #[test]
    fn enums_parse_from_their_short_names() {
        assert_eq!("do_20.1".parse::<Runtime>(), Ok(Runtime::Do20_1));
        assert_eq!("22.1".parse::<Runtime>(), Ok(Runtime::Do22_1));
        assert!("do_9.0".parse::<Runtime>().is_err());
        assert_eq!("CPO".parse::<ModelType>(), Ok(ModelType::Cpo));
        assert_eq!("xl".parse::<TShirtSize>(), Ok(TShirtSize::XL));
        assert!("XXL".parse::<TShirtSize>().is_err());
    }

    #[test]
    fn deployment_reads_hardware_spec() {
        let doc = json!({
            "metadata": { "id": "d-1", "name": "diet" },
            "entity": { "asset": { "id": "m-1" }, "hardware_spec": { "name": "M", "num_nodes": 2 } }
        });
        let deployment = Deployment::from_document(&doc).unwrap();
        assert_eq!(deployment.model_id.as_deref(), Some("m-1"));
        assert_eq!(deployment.size.as_deref(), Some("M"));
        assert_eq!(deployment.nodes, Some(2));
        assert!(Deployment::from_document(&json!({ "entity": {} })).is_none());
    }

    #[test]
    fn space_storage_is_optional() {
        let doc = json!({
            "metadata": { "id": "s-1", "name": "space" },
            "entity": { "storage": {
                "type": "bmcos_object_storage",
                "resource_crn": "crn:v1:cos",
                "properties": { "bucket_name": "b", "endpoint_url": "https://s3.example.com" }
            }}
        });
        let space = DeploymentSpace::from_document(&doc).unwrap();
        let storage = space.storage.unwrap();
        assert_eq!(storage.bucket.as_deref(), Some("b"));
        assert_eq!(storage.resource_crn.as_deref(), Some("crn:v1:cos"));

        let bare = json!({ "metadata": { "id": "s-2", "name": "local" }, "entity": {} });
        assert!(DeploymentSpace::from_document(&bare).unwrap().storage.is_none());
    }
}
