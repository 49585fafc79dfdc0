use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Attachment holding the engine log
pub const LOG_ATTACHMENT: &str = "log.txt";
/// Attachment holding the solution document
pub const SOLUTION_ATTACHMENT: &str = "solution.json";
/// Output pattern matching every attachment the job produces
pub const ALL_OUTPUTS: &str = ".*";

/// Payload of an inline data reference
#[derive(Debug, Clone, PartialEq)]
pub enum InlineContent {
    Text(String),
    Bytes(Vec<u8>),
    /// Tabular data sent as `fields` and `values` rows
    Table {
        fields: Vec<String>,
        values: Vec<Vec<Value>>,
    },
}

/// Input or output data for a job, embedded in the job document or stored in a bucket
#[derive(Debug, Clone, PartialEq)]
pub enum DataReference {
    Inline {
        id: String,
        content: InlineContent,
    },
    External {
        id: String,
        connection_id: String,
        bucket: String,
        key: String,
    },
}

impl DataReference {
    pub fn inline_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        DataReference::Inline {
            id: id.into(),
            content: InlineContent::Text(text.into()),
        }
    }

    pub fn inline_bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        DataReference::Inline {
            id: id.into(),
            content: InlineContent::Bytes(bytes.into()),
        }
    }

    pub fn inline_table(id: impl Into<String>, fields: Vec<String>, values: Vec<Vec<Value>>) -> Self {
        DataReference::Inline {
            id: id.into(),
            content: InlineContent::Table { fields, values },
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DataReference::Inline { id, .. } | DataReference::External { id, .. } => id,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, DataReference::Inline { .. })
    }

    /// JSON form used in `input_data`, `input_data_references` and `output_data_references`
    pub fn to_json(&self) -> Value {
        match self {
            DataReference::Inline { id, content } => match content {
                InlineContent::Text(text) => json!({ "id": id, "content": STANDARD.encode(text) }),
                InlineContent::Bytes(bytes) => json!({ "id": id, "content": STANDARD.encode(bytes) }),
                InlineContent::Table { fields, values } => {
                    json!({ "id": id, "fields": fields, "values": values })
                }
            },
            DataReference::External {
                id,
                connection_id,
                bucket,
                key,
            } => json!({
                "id": id,
                "type": "connection_asset",
                "connection": { "id": connection_id },
                "location": { "bucket": bucket, "file_name": key },
            }),
        }
    }
}

/// Definition of a job run against a deployment
#[derive(Debug, Clone)]
pub struct JobRequest {
    deployment_id: String,
    name: Option<String>,
    inputs: Vec<DataReference>,
    inline_outputs: Vec<String>,
    output_references: Vec<DataReference>,
    solve_parameters: BTreeMap<String, String>,
}

impl JobRequest {
    pub fn new(deployment_id: impl Into<String>) -> Self {
        let mut solve_parameters = BTreeMap::new();
        solve_parameters.insert("oaas.logAttachmentName".to_string(), LOG_ATTACHMENT.to_string());
        solve_parameters.insert("oaas.logTailEnabled".to_string(), "true".to_string());
        solve_parameters.insert("oaas.resultsFormat".to_string(), "JSON".to_string());

        Self {
            deployment_id: deployment_id.into(),
            name: None,
            inputs: Vec::new(),
            inline_outputs: Vec::new(),
            output_references: Vec::new(),
            solve_parameters,
        }
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input(mut self, input: DataReference) -> Self {
        self.inputs.push(input);
        self
    }

    /// Return attachments whose id matches `pattern` inline in the job document
    pub fn with_inline_output(mut self, pattern: impl Into<String>) -> Self {
        self.inline_outputs.push(pattern.into());
        self
    }

    pub fn with_output_reference(mut self, output: DataReference) -> Self {
        self.output_references.push(output);
        self
    }

    pub fn with_solve_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.solve_parameters.insert(key.into(), value.into());
        self
    }

    /// Platform job document. Without any requested output every attachment is returned inline.
    pub fn to_body(&self, space_id: &str) -> Value {
        let (inline, external): (Vec<_>, Vec<_>) = self.inputs.iter().partition(|i| i.is_inline());

        let mut decision = Map::new();
        decision.insert("solve_parameters".to_string(), json!(self.solve_parameters));
        decision.insert(
            "input_data".to_string(),
            Value::Array(inline.iter().map(|i| i.to_json()).collect()),
        );
        if !external.is_empty() {
            decision.insert(
                "input_data_references".to_string(),
                Value::Array(external.iter().map(|i| i.to_json()).collect()),
            );
        }

        let mut inline_outputs = self.inline_outputs.clone();
        if inline_outputs.is_empty() && self.output_references.is_empty() {
            inline_outputs.push(ALL_OUTPUTS.to_string());
        }
        decision.insert(
            "output_data".to_string(),
            Value::Array(inline_outputs.iter().map(|id| json!({ "id": id })).collect()),
        );
        if !self.output_references.is_empty() {
            decision.insert(
                "output_data_references".to_string(),
                Value::Array(self.output_references.iter().map(|o| o.to_json()).collect()),
            );
        }

        let mut body = json!({
            "space_id": space_id,
            "deployment": { "id": self.deployment_id },
            "decision_optimization": decision,
        });
        if let Some(name) = &self.name {
            body["name"] = json!(name);
        }
        body
    }
}

/// One decoded output attachment of a finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAttachment {
    pub id: String,
    pub content: Vec<u8>,
}

impl OutputAttachment {
    /// Content as UTF-8 text, if valid
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// A KPI reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Number(f64),
    Text(String),
}

impl KpiValue {
    /// Numbers stay numbers; strings holding a number are parsed
    pub fn from_json(value: &Value) -> KpiValue {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(KpiValue::Number)
                .unwrap_or_else(|| KpiValue::Text(n.to_string())),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(KpiValue::Number)
                .unwrap_or_else(|_| KpiValue::Text(s.clone())),
            other => KpiValue::Text(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KpiValue::Number(n) => Some(*n),
            KpiValue::Text(_) => None,
        }
    }
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Number(n) => write!(f, "{}", n),
            KpiValue::Text(s) => f.write_str(s),
        }
    }
}
