use serde_json::Value;
use std::fmt;

/// API version date sent with every platform request
pub const API_VERSION: &str = "2021-06-01";

/// Which base URL a resource kind lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBase {
    /// Machine-learning API: models, deployments, jobs, software specifications
    Api,
    /// Data-platform API: spaces, connections, catalogs
    Platform,
}

/// Every remote resource kind the orchestrator manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Space,
    SoftwareSpecification,
    Model,
    Deployment,
    Job,
    Connection,
    Catalog,
}

impl ResourceKind {
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Space => "/v2/spaces",
            ResourceKind::SoftwareSpecification => "/v2/software_specifications",
            ResourceKind::Model => "/ml/v4/models",
            ResourceKind::Deployment => "/ml/v4/deployments",
            ResourceKind::Job => "/ml/v4/deployment_jobs",
            ResourceKind::Connection => "/v2/connections",
            ResourceKind::Catalog => "/v2/catalogs",
        }
    }

    pub fn base(&self) -> ApiBase {
        match self {
            ResourceKind::Space | ResourceKind::Connection | ResourceKind::Catalog => {
                ApiBase::Platform
            }
            _ => ApiBase::Api,
        }
    }

    /// Field holding the array in a list response
    pub fn list_field(&self) -> &'static str {
        match self {
            ResourceKind::Catalog => "catalogs",
            _ => "resources",
        }
    }

    /// Human-readable name used in logs and errors
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Space => "deployment space",
            ResourceKind::SoftwareSpecification => "software specification",
            ResourceKind::Model => "model",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Job => "job",
            ResourceKind::Connection => "connection",
            ResourceKind::Catalog => "catalog",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resource id from `metadata.id`, `metadata.asset_id` or `metadata.guid`
pub fn resource_id(doc: &Value) -> Option<&str> {
    let metadata = doc.get("metadata")?;
    ["id", "asset_id", "guid"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(Value::as_str))
}

pub fn resource_name(doc: &Value) -> Option<&str> {
    doc.pointer("/metadata/name")
        .or_else(|| doc.pointer("/entity/name"))
        .and_then(Value::as_str)
}

pub fn created_at(doc: &Value) -> Option<&str> {
    doc.pointer("/metadata/created_at").and_then(Value::as_str)
}

/// Deterministic pick among documents sharing a name: oldest first, then smallest id.
///
/// The platform does not enforce name uniqueness, so duplicates are expected.
pub fn first_match<'a>(docs: &'a [Value], name: &str) -> Option<&'a Value> {
    docs.iter()
        .filter(|doc| resource_name(doc) == Some(name))
        .min_by(|a, b| {
            (created_at(a).unwrap_or(""), resource_id(a).unwrap_or(""))
                .cmp(&(created_at(b).unwrap_or(""), resource_id(b).unwrap_or("")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_id_checks_all_id_fields() {
        assert_eq!(resource_id(&json!({"metadata": {"id": "a"}})), Some("a"));
        assert_eq!(resource_id(&json!({"metadata": {"asset_id": "b"}})), Some("b"));
        assert_eq!(resource_id(&json!({"metadata": {"guid": "c"}})), Some("c"));
        assert_eq!(resource_id(&json!({"entity": {}})), None);
    }

    #[test]
    fn first_match_prefers_oldest_then_lowest_id() {
        let docs = vec![
            json!({"metadata": {"id": "z", "name": "dup", "created_at": "2024-01-02T00:00:00Z"}}),
            json!({"metadata": {"id": "y", "name": "dup", "created_at": "2024-01-01T00:00:00Z"}}),
            json!({"metadata": {"id": "x", "name": "dup", "created_at": "2024-01-01T00:00:00Z"}}),
            json!({"metadata": {"id": "w", "name": "other", "created_at": "2023-01-01T00:00:00Z"}}),
        ];

        let picked = first_match(&docs, "dup").unwrap();
        assert_eq!(resource_id(picked), Some("x"));
        assert!(first_match(&docs, "missing").is_none());
    }
}
