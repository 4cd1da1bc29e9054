//! Job payload and job status types exchanged with the optimization service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::table::Table;

/// Dataset id of the places table in a job payload.
pub const PLACES_DATASET: &str = "places.csv";
/// Dataset id of the routes table in a job payload.
pub const ROUTES_DATASET: &str = "routes.csv";
/// Output pattern of the tabular solution artifact.
pub const CSV_OUTPUT_PATTERN: &str = r".*\.csv";
/// Output pattern of the plaintext status artifact.
pub const TEXT_OUTPUT_PATTERN: &str = r".*\.txt";

/// How an output artifact is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Rows of selected sites, decoded with the artifact's own field list
    Csv,
    /// A base64-encoded message in the first cell
    Text,
}

/// An output the job is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredOutput {
    pub pattern: &'static str,
    pub kind: OutputKind,
}

/// Outputs requested from every solve job.
pub const DECLARED_OUTPUTS: [DeclaredOutput; 2] = [
    DeclaredOutput {
        pattern: CSV_OUTPUT_PATTERN,
        kind: OutputKind::Csv,
    },
    DeclaredOutput {
        pattern: TEXT_OUTPUT_PATTERN,
        kind: OutputKind::Text,
    },
];

/// A named input table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDataset {
    pub id: String,
    #[serde(flatten)]
    pub table: Table,
}

/// Reference to an expected output, by id pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputReference {
    pub id: String,
}

/// Body of a job submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPayload {
    pub input_data: Vec<InputDataset>,
    pub output_data: Vec<OutputReference>,
}

impl JobPayload {
    /// Payload carrying the places and routes tables and requesting the
    /// standard outputs.
    pub fn new(places: &Table, routes: &Table) -> Self {
        Self {
            input_data: vec![
                InputDataset {
                    id: PLACES_DATASET.to_string(),
                    table: places.clone(),
                },
                InputDataset {
                    id: ROUTES_DATASET.to_string(),
                    table: routes.clone(),
                },
            ],
            output_data: DECLARED_OUTPUTS
                .iter()
                .map(|o| OutputReference {
                    id: o.pattern.to_string(),
                })
                .collect(),
        }
    }
}

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Failed,
    Canceled,
    /// Any non-terminal state (`queued`, `running`, ...)
    Pending(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::Pending(s) => s,
        }
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s {
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "canceled" => JobState::Canceled,
            other => JobState::Pending(other.to_string()),
        }
    }
}

/// An artifact produced by a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl OutputArtifact {
    /// Tabular artifact with an explicit field list.
    pub fn table(id: impl Into<String>, fields: &[&str], values: Vec<Vec<Value>>) -> Self {
        Self {
            id: id.into(),
            fields: Some(fields.iter().map(|f| f.to_string()).collect()),
            values,
        }
    }

    /// Text artifact holding an already base64-encoded message.
    pub fn text(id: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: None,
            values: vec![vec![Value::String(encoded.into())]],
        }
    }
}

/// Status object of a job. Anything beyond `state` is kept verbatim for logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOptimization {
    pub status: JobStatus,
    #[serde(default)]
    pub output_data: Vec<OutputArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntity {
    pub decision_optimization: DecisionOptimization,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, alias = "guid")]
    pub id: Option<String>,
}

/// Job details as returned by submission and status requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(default)]
    pub metadata: JobMetadata,
    pub entity: JobEntity,
}

impl JobDetails {
    /// Details of a job in `state` with no outputs.
    pub fn new(job_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            metadata: JobMetadata {
                id: Some(job_id.into()),
            },
            entity: JobEntity {
                decision_optimization: DecisionOptimization {
                    status: JobStatus {
                        state: state.into(),
                        extra: Map::new(),
                    },
                    output_data: Vec::new(),
                },
            },
        }
    }

    pub fn with_output(mut self, artifact: OutputArtifact) -> Self {
        self.entity.decision_optimization.output_data.push(artifact);
        self
    }

    /// Attach an extra field to the status object.
    pub fn with_status_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entity
            .decision_optimization
            .status
            .extra
            .insert(key.into(), value);
        self
    }

    pub fn job_id(&self) -> Option<&str> {
        self.metadata.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn state(&self) -> &str {
        &self.entity.decision_optimization.status.state
    }

    pub fn job_state(&self) -> JobState {
        JobState::from(self.state())
    }

    pub fn status(&self) -> &JobStatus {
        &self.entity.decision_optimization.status
    }

    pub fn outputs(&self) -> &[OutputArtifact] {
        &self.entity.decision_optimization.output_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shape() {
        let places = Table::from_parts(vec!["id".into()], vec![vec![json!("p1")]]).unwrap();
        let routes = Table::default();
        let payload = serde_json::to_value(JobPayload::new(&places, &routes)).unwrap();

        assert_eq!(
            payload,
            json!({
                "input_data": [
                    {"id": "places.csv", "fields": ["id"], "values": [["p1"]]},
                    {"id": "routes.csv", "fields": [], "values": []}
                ],
                "output_data": [{"id": ".*\\.csv"}, {"id": ".*\\.txt"}]
            })
        );
    }

    #[test]
    fn test_job_state_terminality() {
        assert!(JobState::from("completed").is_terminal());
        assert!(JobState::from("failed").is_terminal());
        assert!(JobState::from("canceled").is_terminal());
        assert!(!JobState::from("running").is_terminal());
        assert!(!JobState::from("queued").is_terminal());
        assert_eq!(JobState::from("running").as_str(), "running");
    }

    #[test]
    fn test_parse_job_details() {
        let raw = json!({
            "metadata": {"id": "job-42", "created_at": "2024-01-01T00:00:00Z"},
            "entity": {
                "decision_optimization": {
                    "status": {"state": "completed", "completed_at": "2024-01-01T00:01:00Z"},
                    "output_data": [
                        {"id": "solution.csv", "fields": ["id"], "values": [["p1"]]},
                        {"id": "log.txt", "values": [["aGk="]]}
                    ]
                }
            }
        });

        let details: JobDetails = serde_json::from_value(raw).unwrap();
        assert_eq!(details.job_id(), Some("job-42"));
        assert_eq!(details.job_state(), JobState::Completed);
        assert_eq!(details.outputs().len(), 2);
        assert_eq!(details.outputs()[1].fields, None);
        assert!(details.status().extra.contains_key("completed_at"));
    }

    #[test]
    fn test_legacy_guid_is_accepted() {
        let raw = json!({
            "metadata": {"guid": "legacy-1"},
            "entity": {"decision_optimization": {"status": {"state": "queued"}}}
        });
        let details: JobDetails = serde_json::from_value(raw).unwrap();
        assert_eq!(details.job_id(), Some("legacy-1"));
        assert!(details.outputs().is_empty());
    }
}
