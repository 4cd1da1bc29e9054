//! In-process backend.
//!
//! Runs the site-selection model on tokio's blocking pool. Whatever goes wrong
//! inside the model (an infeasible problem, malformed input, a panic) is
//! reported the same way: a [`SolveError::BackendFault`] whose text is the
//! model's own message.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio::task;

use super::{Solution, SolveBackend};
use crate::error::{SolveError, SolveResult};
use crate::models::Record;
use crate::table::Table;

/// Output of a [`SiteModel`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSolution {
    pub sites: Vec<Record>,
    pub status: String,
}

impl ModelSolution {
    pub fn new(sites: Vec<Record>, status: impl Into<String>) -> Self {
        Self {
            sites,
            status: status.into(),
        }
    }
}

/// The site-selection optimization model.
///
/// Implementations build and solve the model for the given tables and return
/// one record per selected site. Errors are not classified: infeasibility and
/// bad input look the same to the caller.
pub trait SiteModel: Send + Sync {
    fn build_and_solve(
        &self,
        places: &Table,
        routes: &Table,
        count: usize,
    ) -> anyhow::Result<ModelSolution>;
}

impl<F> SiteModel for F
where
    F: Fn(&Table, &Table, usize) -> anyhow::Result<ModelSolution> + Send + Sync,
{
    fn build_and_solve(
        &self,
        places: &Table,
        routes: &Table,
        count: usize,
    ) -> anyhow::Result<ModelSolution> {
        self(places, routes, count)
    }
}

/// Backend that solves with an in-process [`SiteModel`].
#[derive(Clone)]
pub struct LocalBackend {
    model: Arc<dyn SiteModel>,
}

impl LocalBackend {
    pub fn new(model: Arc<dyn SiteModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl SolveBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn solve(&self, places: &Table, routes: &Table, count: usize) -> SolveResult<Solution> {
        info!("Running local model for {} sites", count);

        let model = Arc::clone(&self.model);
        let places = places.clone();
        let routes = routes.clone();

        let outcome =
            task::spawn_blocking(move || model.build_and_solve(&places, &routes, count)).await;

        match outcome {
            Ok(Ok(solution)) => {
                info!(
                    "Local model returned {} sites: {}",
                    solution.sites.len(),
                    solution.status
                );
                Ok(Solution::new(solution.sites, solution.status))
            }
            Ok(Err(e)) => {
                let detail = e.to_string();
                warn!("{}", detail);
                Err(SolveError::BackendFault(detail))
            }
            Err(join_err) => {
                let detail = panic_message(join_err);
                warn!("Local model aborted: {}", detail);
                Err(SolveError::BackendFault(detail))
            }
        }
    }
}

fn panic_message(err: task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "model panicked".to_string()
    }
}
