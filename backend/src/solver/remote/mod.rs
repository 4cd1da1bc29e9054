//! Remote backend: solve as an asynchronous job on an optimization service.
//!
//! A solve runs in three phases:
//!
//! 1. **Submit** the places and routes tables as named input datasets,
//!    declaring a tabular result output and a plaintext status output.
//! 2. **Poll** the job every [`PollPolicy::interval`] until it reaches
//!    `completed`, `failed` or `canceled`. The wait is bounded by the policy.
//!
//! A fired [`CancellationToken`] stops the search at any point: nothing is
//! submitted once it has fired, and pending service requests are dropped.
//! 3. **Resolve** the outputs of a completed job into site records and a
//!    status message.

#[cfg(feature = "remote-http")]
pub mod http;
pub mod job;
pub mod outputs;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{Solution, SolveBackend};
use crate::config::PollPolicy;
use crate::error::{ErrorContext, SolveError, SolveResult};
use crate::services::job_tracker::{JobTrace, JobTracker, TraceOutcome};
use crate::table::Table;

#[cfg(feature = "remote-http")]
pub use http::HttpJobService;
pub use job::{JobDetails, JobPayload, JobState, OutputArtifact, DECLARED_OUTPUTS};
pub use outputs::{resolve_outputs, ResolvedOutputs};

/// Job API of the remote optimization service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a job to `deployment_id` and return its initial details.
    async fn create_job(&self, deployment_id: &str, payload: &JobPayload) -> SolveResult<JobDetails>;

    /// Fetch the current details of a job.
    async fn job_details(&self, job_id: &str) -> SolveResult<JobDetails>;
}

/// Backend that runs each solve as a job on a remote deployment.
pub struct RemoteBackend {
    deployment_id: String,
    service: Arc<dyn JobService>,
    polling: PollPolicy,
    cancel: CancellationToken,
    tracker: JobTracker,
}

impl RemoteBackend {
    pub fn new(deployment_id: impl Into<String>, service: Arc<dyn JobService>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            service,
            polling: PollPolicy::default(),
            cancel: CancellationToken::new(),
            tracker: JobTracker::new(),
        }
    }

    pub fn with_polling(mut self, polling: PollPolicy) -> Self {
        self.polling = polling;
        self
    }

    /// Stop waiting for the job once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fill in the deployment and job of a communication error's context.
    fn annotate(&self, err: SolveError, operation: &str, job_id: Option<&str>) -> SolveError {
        match err {
            SolveError::CommunicationFault { message, context } => {
                let mut filled =
                    ErrorContext::new(context.operation.unwrap_or_else(|| operation.to_string()))
                        .with_deployment(
                            context
                                .deployment
                                .unwrap_or_else(|| self.deployment_id.clone()),
                        );
                if let Some(id) = context.job_id.or_else(|| job_id.map(str::to_string)) {
                    filled = filled.with_job_id(id);
                }
                if let Some(details) = context.details {
                    filled = filled.with_details(details);
                }
                SolveError::communication_with_context(message, filled)
            }
            other => other,
        }
    }

    /// Run a service request unless the search is cancelled first.
    async fn until_cancelled<T, F>(&self, job_id: Option<&str>, request: F) -> SolveResult<T>
    where
        F: Future<Output = SolveResult<T>> + Send,
        T: Send,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SolveError::Cancelled {
                job_id: job_id.map(str::to_string),
            }),
            result = request => result,
        }
    }

    async fn submit(&self, places: &Table, routes: &Table) -> SolveResult<(String, JobDetails)> {
        if self.cancel.is_cancelled() {
            info!("Search cancelled before submitting to {}", self.deployment_id);
            return Err(SolveError::Cancelled { job_id: None });
        }

        let payload = JobPayload::new(places, routes);

        info!("Solving using deployment: {}", self.deployment_id);
        let details = self
            .until_cancelled(None, self.service.create_job(&self.deployment_id, &payload))
            .await
            .map_err(|e| {
                if matches!(e, SolveError::Cancelled { .. }) {
                    warn!(
                        "Search cancelled during submission; a job may still run on {}",
                        self.deployment_id
                    );
                }
                self.annotate(e, "create_job", None)
            })?;

        let job_id = details.job_id().map(str::to_string).ok_or_else(|| {
            SolveError::communication_with_context(
                "job submission response carried no job id",
                ErrorContext::new("create_job").with_deployment(self.deployment_id.clone()),
            )
        })?;

        info!("Running job: {}", job_id);
        self.tracker
            .submitted(&job_id, &self.deployment_id, details.state());
        Ok((job_id, details))
    }

    /// Re-fetch the job until it reaches a terminal state.
    async fn wait_for_terminal(&self, job_id: &str, mut details: JobDetails) -> SolveResult<JobDetails> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if details.job_state().is_terminal() {
                self.tracker.finish(job_id, TraceOutcome::Terminal);
                return Ok(details);
            }

            info!("{}...", details.state());

            let over_attempts = self.polling.max_attempts.is_some_and(|max| attempts >= max);
            let over_time = self
                .polling
                .timeout
                .is_some_and(|limit| started.elapsed() >= limit);
            if over_attempts || over_time {
                self.tracker.finish(job_id, TraceOutcome::TimedOut);
                let err = SolveError::Timeout {
                    attempts,
                    elapsed_secs: started.elapsed().as_secs(),
                };
                warn!("Job {}: {}", job_id, err);
                return Err(err);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.tracker.finish(job_id, TraceOutcome::Abandoned);
                    warn!("Stopped waiting for job {}", job_id);
                    return Err(SolveError::Cancelled {
                        job_id: Some(job_id.to_string()),
                    });
                }
                _ = tokio::time::sleep(self.polling.interval) => {}
            }

            attempts += 1;
            let polled = self
                .until_cancelled(Some(job_id), self.service.job_details(job_id))
                .await;
            details = match polled {
                Ok(details) => details,
                Err(e @ SolveError::Cancelled { .. }) => {
                    self.tracker.finish(job_id, TraceOutcome::Abandoned);
                    warn!("Stopped waiting for job {}", job_id);
                    return Err(e);
                }
                Err(e) => {
                    self.tracker.finish(job_id, TraceOutcome::Lost);
                    return Err(self.annotate(e, "job_details", Some(job_id)));
                }
            };
            self.tracker.polled(job_id, details.state());
        }
    }

    fn resolve(&self, details: &JobDetails) -> SolveResult<Solution> {
        let state = details.job_state();
        info!("{}", state.as_str());

        match state {
            JobState::Failed | JobState::Canceled => {
                let detail = serde_json::to_string(details.status())
                    .unwrap_or_else(|_| state.as_str().to_string());
                warn!("Job ended in state '{}': {}", state.as_str(), detail);
                Err(SolveError::InfeasibleOrNoSolution {
                    state: state.as_str().to_string(),
                    detail,
                })
            }
            _ => {
                let resolved = resolve_outputs(details.outputs(), &DECLARED_OUTPUTS)?;
                if !resolved.missing.is_empty() {
                    warn!(
                        "Job completed without outputs: {}",
                        resolved.missing.join(", ")
                    );
                }

                Ok(Solution {
                    sites: resolved.sites.unwrap_or_default(),
                    status: resolved
                        .message
                        .unwrap_or_else(|| state.as_str().to_string()),
                    missing_outputs: resolved.missing,
                })
            }
        }
    }
}

#[async_trait]
impl SolveBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn solve(&self, places: &Table, routes: &Table, count: usize) -> SolveResult<Solution> {
        // The site count is a parameter of the deployed model, not of the job.
        debug!("Requested {} sites from deployment {}", count, self.deployment_id);

        let result = async {
            let (job_id, details) = self.submit(places, routes).await?;
            let details = self.wait_for_terminal(&job_id, details).await?;
            self.resolve(&details)
        }
        .await;

        if let Err(SolveError::CommunicationFault { message, context }) = &result {
            warn!(
                "Unable to deploy using deployment {}: {} {}",
                self.deployment_id, message, context
            );
        }
        result
    }

    fn job_trace(&self) -> Option<JobTrace> {
        self.tracker.latest()
    }
}
