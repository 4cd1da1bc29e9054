//! Job tracking for remote solves.
//!
//! Each remote backend keeps a tracker that records when a job was submitted,
//! every state observed while polling, and how the job ended. The trace is
//! returned to callers next to the solve result for diagnostics.

use parking_lot::RwLock;
use std::sync::Arc;

/// A single observed job state with timestamp.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub state: String,
}

/// How tracking of a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutcome {
    /// Still polling
    Running,
    /// Reached `completed`, `failed` or `canceled`
    Terminal,
    /// Gave up on the poll bounds
    TimedOut,
    /// Abandoned through the cancellation token
    Abandoned,
    /// A status request failed
    Lost,
}

/// History of one remote job.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobTrace {
    pub job_id: String,
    pub deployment_id: String,
    pub outcome: TraceOutcome,
    pub states: Vec<StateEntry>,
    /// Status requests issued after submission
    pub polls: u32,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl JobTrace {
    /// The most recently observed state.
    pub fn last_state(&self) -> Option<&str> {
        self.states.last().map(|e| e.state.as_str())
    }
}

/// In-memory job tracker.
#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<Vec<JobTrace>>>,
}

impl JobTracker {
    /// Create a new job tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a submitted job.
    pub fn submitted(&self, job_id: &str, deployment_id: &str, state: &str) {
        let now = chrono::Utc::now();
        self.jobs.write().push(JobTrace {
            job_id: job_id.to_string(),
            deployment_id: deployment_id.to_string(),
            outcome: TraceOutcome::Running,
            states: vec![StateEntry {
                timestamp: now,
                state: state.to_string(),
            }],
            polls: 0,
            submitted_at: now,
            finished_at: None,
        });
    }

    /// Record the state returned by one status request.
    pub fn polled(&self, job_id: &str, state: &str) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.iter_mut().rev().find(|j| j.job_id == job_id) {
            job.polls += 1;
            job.states.push(StateEntry {
                timestamp: chrono::Utc::now(),
                state: state.to_string(),
            });
        }
    }

    /// Mark a job as no longer tracked.
    pub fn finish(&self, job_id: &str, outcome: TraceOutcome) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.iter_mut().rev().find(|j| j.job_id == job_id) {
            job.outcome = outcome;
            job.finished_at = Some(chrono::Utc::now());
        }
    }

    /// Get a job by ID.
    pub fn get_job(&self, job_id: &str) -> Option<JobTrace> {
        self.jobs
            .read()
            .iter()
            .rev()
            .find(|j| j.job_id == job_id)
            .cloned()
    }

    /// The most recently submitted job.
    pub fn latest(&self) -> Option<JobTrace> {
        self.jobs.read().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_job_lifecycle() {
        let tracker = JobTracker::new();
        tracker.submitted("job-1", "dep-1", "queued");
        tracker.polled("job-1", "running");
        tracker.polled("job-1", "completed");
        tracker.finish("job-1", TraceOutcome::Terminal);

        let job = tracker.get_job("job-1").unwrap();
        assert_eq!(job.deployment_id, "dep-1");
        assert_eq!(job.polls, 2);
        assert_eq!(job.last_state(), Some("completed"));
        assert_eq!(job.outcome, TraceOutcome::Terminal);
        assert!(job.finished_at.is_some());
        assert_eq!(tracker.latest(), Some(job));
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let tracker = JobTracker::new();
        tracker.polled("missing", "running");
        tracker.finish("missing", TraceOutcome::Lost);
        assert!(tracker.get_job("missing").is_none());
        assert!(tracker.latest().is_none());
    }
}
