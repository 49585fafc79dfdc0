use crate::job::data::{KpiValue, OutputAttachment};
use crate::job::state::JobState;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

const KPI_PREFIX: &str = "KPI.";

#[derive(Debug, Default, Deserialize)]
struct DecisionOptimization {
    #[serde(default)]
    status: Option<StatusDoc>,
    #[serde(default)]
    solve_state: Option<SolveStateDoc>,
    #[serde(default)]
    output_data: Vec<OutputDoc>,
}

#[derive(Debug, Deserialize)]
struct StatusDoc {
    state: String,
    #[serde(default)]
    failure: Option<FailureDoc>,
}

#[derive(Debug, Deserialize)]
struct FailureDoc {
    #[serde(default)]
    errors: Vec<RemoteError>,
}

#[derive(Debug, Default, Deserialize)]
struct SolveStateDoc {
    #[serde(default)]
    solve_status: Option<String>,
    #[serde(default)]
    latest_engine_activity: Vec<String>,
    #[serde(default)]
    details: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct OutputDoc {
    id: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

/// One error reported by the platform for a failed job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Everything known about a job after one status fetch
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    /// `None` when the platform reported a state we do not know
    pub state: Option<JobState>,
    pub solve_status: Option<String>,
    pub latest_engine_activity: Vec<String>,
    pub kpis: BTreeMap<String, KpiValue>,
    pub outputs: Vec<OutputAttachment>,
    pub errors: Vec<RemoteError>,
}

impl JobSnapshot {
    pub fn created() -> Self {
        Self {
            state: Some(JobState::Created),
            solve_status: None,
            latest_engine_activity: Vec::new(),
            kpis: BTreeMap::new(),
            outputs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Parse the `entity.decision_optimization` part of a job document
    pub fn from_document(doc: &Value) -> Result<Self, String> {
        let decision = match doc.pointer("/entity/decision_optimization") {
            Some(value) => DecisionOptimization::deserialize(value).map_err(|e| e.to_string())?,
            None => return Err("missing entity.decision_optimization".to_string()),
        };

        let (state, errors) = match decision.status {
            Some(status) => (
                JobState::from_platform(&status.state),
                status.failure.map(|f| f.errors).unwrap_or_default(),
            ),
            None => (None, Vec::new()),
        };

        let solve_state = decision.solve_state.unwrap_or_default();
        let kpis = solve_state
            .details
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(KPI_PREFIX)
                    .map(|name| (name.to_string(), KpiValue::from_json(value)))
            })
            .collect();

        let outputs = decision
            .output_data
            .into_iter()
            .filter_map(|output| match decode_output(output) {
                Ok(attachment) => Some(attachment),
                Err(reason) => {
                    warn!("Skipping output attachment: {}", reason);
                    None
                }
            })
            .collect();

        Ok(Self {
            state,
            solve_status: solve_state.solve_status,
            latest_engine_activity: solve_state.latest_engine_activity,
            kpis,
            outputs,
            errors,
        })
    }
}

fn decode_output(output: OutputDoc) -> Result<OutputAttachment, String> {
    let content = match (output.content, output.fields, output.values) {
        (Some(content), _, _) => STANDARD
            .decode(content.as_bytes())
            .map_err(|e| format!("attachment {} is not base64: {}", output.id, e))?,
        (None, Some(fields), values) => table_to_csv(&fields, &values.unwrap_or_default()),
        (None, None, _) => Vec::new(),
    };
    Ok(OutputAttachment {
        id: output.id,
        content,
    })
}

/// Tabular attachments are rendered as CSV
fn table_to_csv(fields: &[String], rows: &[Vec<Value>]) -> Vec<u8> {
    let mut csv = fields.join(",");
    csv.push('\n');
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv.into_bytes()
}
