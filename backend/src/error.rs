//! Error types for solve operations.
//!
//! Every failure in the dispatch layer ends up as a [`SolveError`]. The facade
//! never returns it as an `Err`: it is carried next to the human-readable
//! status string so callers can branch on [`SolveErrorKind`] while the
//! presentation layer keeps consuming the status text.

use std::fmt;

use crate::table::TableError;

/// Status reported when a remote job ends in `failed` or `canceled`.
pub const NO_SOLUTION_STATUS: &str =
    "Model did not solve. There may not have been a possible solution. Adjust settings and try again.";

/// Status reported when the remote service cannot be reached or rejects the job.
pub const COMMUNICATION_FAULT_STATUS: &str =
    "Failed to create job. Please verify optimization service credentials and deployment info";

/// Result type for solve operations
pub type SolveResult<T> = Result<T, SolveError>;

/// Structured context for communication errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "create_job", "job_details")
    pub operation: Option<String>,
    /// Deployment the job was submitted to
    pub deployment: Option<String>,
    /// Remote job identifier, once known
    pub job_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref deployment) = self.deployment {
            parts.push(format!("deployment={}", deployment));
        }
        if let Some(ref id) = self.job_id {
            parts.push(format!("job={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Coarse classification of a [`SolveError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveErrorKind {
    InfeasibleOrNoSolution,
    BackendFault,
    CommunicationFault,
    Timeout,
    Cancelled,
    IncompleteOutput,
    DataShape,
    InvalidInput,
}

/// Error type for solve operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    /// The remote job reached `failed` or `canceled`.
    #[error("Job ended in state '{state}': {detail}")]
    InfeasibleOrNoSolution { state: String, detail: String },

    /// The in-process model failed. `detail` is the model's own message.
    #[error("{0}")]
    BackendFault(String),

    /// Submitting or tracking the remote job failed.
    #[error("Communication error: {message} {context}")]
    CommunicationFault {
        message: String,
        context: ErrorContext,
    },

    /// The job did not reach a terminal state within the poll bounds.
    #[error("Timed out after {attempts} status checks ({elapsed_secs}s)")]
    Timeout { attempts: u32, elapsed_secs: u64 },

    /// The caller cancelled the search. `job_id` is set once a job was submitted.
    #[error("Search cancelled{}", .job_id.as_deref().map(|id| format!(" while waiting for job {}", id)).unwrap_or_default())]
    Cancelled { job_id: Option<String> },

    /// The job completed but some declared outputs were not returned.
    #[error("Job completed without outputs: {}", .missing.join(", "))]
    IncompleteOutput { missing: Vec<String> },

    /// Returned output artifacts could not be decoded.
    #[error("Malformed output: {0}")]
    DataShape(String),

    /// The input records could not be normalized.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SolveError {
    /// Create a communication error with no context.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationFault {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a communication error with full context.
    pub fn communication_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::CommunicationFault {
            message: message.into(),
            context,
        }
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape(message.into())
    }

    pub fn kind(&self) -> SolveErrorKind {
        match self {
            Self::InfeasibleOrNoSolution { .. } => SolveErrorKind::InfeasibleOrNoSolution,
            Self::BackendFault(_) => SolveErrorKind::BackendFault,
            Self::CommunicationFault { .. } => SolveErrorKind::CommunicationFault,
            Self::Timeout { .. } => SolveErrorKind::Timeout,
            Self::Cancelled { .. } => SolveErrorKind::Cancelled,
            Self::IncompleteOutput { .. } => SolveErrorKind::IncompleteOutput,
            Self::DataShape(_) => SolveErrorKind::DataShape,
            Self::InvalidInput(_) => SolveErrorKind::InvalidInput,
        }
    }

    /// The status string reported to callers when this error ends a solve.
    ///
    /// Remote no-solution and communication failures map to fixed advisory
    /// messages; the service's own details only reach the logs.
    pub fn status_message(&self) -> String {
        match self {
            Self::InfeasibleOrNoSolution { .. } => NO_SOLUTION_STATUS.to_string(),
            Self::BackendFault(detail) => detail.clone(),
            Self::CommunicationFault { .. } => COMMUNICATION_FAULT_STATUS.to_string(),
            Self::Timeout {
                attempts,
                elapsed_secs,
            } => format!(
                "Timed out waiting for the optimization job after {} status checks ({}s). Try again later.",
                attempts, elapsed_secs
            ),
            Self::Cancelled { job_id: Some(id) } => format!(
                "Stopped waiting for optimization job {} before it finished.",
                id
            ),
            Self::Cancelled { job_id: None } => {
                "Site search was cancelled before a job was submitted.".to_string()
            }
            Self::IncompleteOutput { missing } => format!(
                "Optimization job completed without outputs: {}",
                missing.join(", ")
            ),
            Self::DataShape(detail) => {
                format!("Optimization service returned malformed output: {}", detail)
            }
            Self::InvalidInput(detail) => format!("Invalid input: {}", detail),
        }
    }

    /// Get the error context, if this error carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::CommunicationFault { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<TableError> for SolveError {
    fn from(err: TableError) -> Self {
        SolveError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_fault_status_is_the_detail() {
        let err = SolveError::BackendFault("no solution".to_string());
        assert_eq!(err.status_message(), "no solution");
        assert_eq!(err.to_string(), "no solution");
        assert_eq!(err.kind(), SolveErrorKind::BackendFault);
    }

    #[test]
    fn test_remote_failures_use_fixed_advice() {
        let infeasible = SolveError::InfeasibleOrNoSolution {
            state: "failed".to_string(),
            detail: "{\"message\":\"infeasible\"}".to_string(),
        };
        assert_eq!(infeasible.status_message(), NO_SOLUTION_STATUS);

        let comm = SolveError::communication_with_context(
            "401 Unauthorized",
            ErrorContext::new("create_job").with_deployment("dep-1"),
        );
        assert_eq!(comm.status_message(), COMMUNICATION_FAULT_STATUS);
        assert!(comm.to_string().contains("operation=create_job"));
        assert!(comm.to_string().contains("deployment=dep-1"));
    }

    #[test]
    fn test_cancelled_status_depends_on_submission() {
        let before = SolveError::Cancelled { job_id: None };
        assert_eq!(before.to_string(), "Search cancelled");
        assert!(before.status_message().contains("before a job was submitted"));

        let during = SolveError::Cancelled {
            job_id: Some("job-7".to_string()),
        };
        assert_eq!(during.to_string(), "Search cancelled while waiting for job job-7");
        assert!(during.status_message().contains("job-7"));
    }

    #[test]
    fn test_context_display_lists_set_fields() {
        let context = ErrorContext::new("job_details")
            .with_deployment("dep-1")
            .with_job_id("job-3");
        assert_eq!(
            context.to_string(),
            "[operation=job_details, deployment=dep-1, job=job-3]"
        );
    }

    #[test]
    fn test_table_error_becomes_invalid_input() {
        let err: SolveError = TableError::RowWidth {
            row: 0,
            expected: 2,
            found: 1,
        }
        .into();
        assert_eq!(err.kind(), SolveErrorKind::InvalidInput);
        assert!(err.status_message().starts_with("Invalid input:"));
    }
}
