//! Execution backends for the site-selection model.
//!
//! A backend takes the normalized places and routes tables plus a requested
//! site count and returns the chosen sites as records. Two implementations
//! exist:
//!
//! - [`local::LocalBackend`]: runs a [`SiteModel`] in-process
//! - [`remote::RemoteBackend`]: submits an asynchronous job to an optimization
//!   service and polls it to completion
//!
//! [`factory`] decides which one handles a call.

pub mod factory;
pub mod local;
pub mod remote;

use async_trait::async_trait;

use crate::error::SolveResult;
use crate::models::Record;
use crate::services::job_tracker::JobTrace;
use crate::table::Table;

pub use factory::{resolve_deployment, BackendFactory, DeploymentTarget, LOCAL_DEPLOYMENT};
pub use local::{LocalBackend, ModelSolution, SiteModel};
pub use remote::{JobService, RemoteBackend};

/// Successful backend output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    /// Selected sites, in solver order. May hold fewer (or more) rows than requested.
    pub sites: Vec<Record>,
    /// Human-readable outcome reported by the backend
    pub status: String,
    /// Declared outputs the backend did not return
    pub missing_outputs: Vec<String>,
}

impl Solution {
    pub fn new(sites: Vec<Record>, status: impl Into<String>) -> Self {
        Self {
            sites,
            status: status.into(),
            missing_outputs: Vec::new(),
        }
    }
}

/// A strategy for solving one site-selection problem.
#[async_trait]
pub trait SolveBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Solve for `count` sites.
    async fn solve(&self, places: &Table, routes: &Table, count: usize) -> SolveResult<Solution>;

    /// History of the last remote job this backend ran, if any.
    fn job_trace(&self) -> Option<JobTrace> {
        None
    }
}
