//! Backend selection.
//!
//! A deployment identifier decides where a solve runs: absent or the literal
//! `"local"` runs the model in-process, anything else names a remote
//! deployment.

use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use super::local::{LocalBackend, SiteModel};
use super::remote::{JobService, RemoteBackend};
use super::SolveBackend;
use crate::config::FinderConfig;
use crate::error::SolveResult;

/// Deployment id that selects the in-process backend.
pub const LOCAL_DEPLOYMENT: &str = "local";

/// Pick the deployment for a call: the explicit argument wins over the
/// process-wide default.
pub fn resolve_deployment(explicit: Option<&str>, env: Option<&str>) -> Option<String> {
    explicit.or(env).map(str::to_string)
}

/// Where a solve runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentTarget {
    /// In-process model
    Local,
    /// Remote deployment with the given id
    Remote(String),
}

impl DeploymentTarget {
    /// Select a target for `deployment_id`.
    ///
    /// Only the exact string `"local"` is the local sentinel; `""` and
    /// `"LOCAL"` name remote deployments.
    pub fn select(deployment_id: Option<&str>) -> Self {
        match deployment_id {
            None | Some(LOCAL_DEPLOYMENT) => Self::Local,
            Some(id) => Self::Remote(id.to_string()),
        }
    }

    /// Target for the `WML_DEPLOYMENT_UID` environment variable.
    pub fn from_env() -> Self {
        Self::select(std::env::var("WML_DEPLOYMENT_UID").ok().as_deref())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl FromStr for DeploymentTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::select(Some(s)))
    }
}

/// Factory for solve backends.
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend for `target`.
    ///
    /// Remote backends use `job_service` when given, otherwise an HTTP client
    /// built from `config`'s credentials.
    pub fn create(
        target: DeploymentTarget,
        model: Arc<dyn SiteModel>,
        config: &FinderConfig,
        job_service: Option<Arc<dyn JobService>>,
        cancel: CancellationToken,
    ) -> SolveResult<Box<dyn SolveBackend>> {
        match target {
            DeploymentTarget::Local => Ok(Self::create_local(model)),
            DeploymentTarget::Remote(deployment_id) => {
                let service = match job_service {
                    Some(service) => service,
                    None => Self::create_job_service(config)?,
                };
                debug!("Using remote deployment {}", deployment_id);
                let backend = RemoteBackend::new(deployment_id, service)
                    .with_polling(config.polling.clone())
                    .with_cancellation(cancel);
                Ok(Box::new(backend))
            }
        }
    }

    /// Create an in-process backend.
    pub fn create_local(model: Arc<dyn SiteModel>) -> Box<dyn SolveBackend> {
        Box::new(LocalBackend::new(model))
    }

    /// Create the HTTP job service from `config`.
    #[cfg(feature = "remote-http")]
    pub fn create_job_service(config: &FinderConfig) -> SolveResult<Arc<dyn JobService>> {
        let service = super::remote::HttpJobService::new(config)?;
        Ok(Arc::new(service))
    }

    #[cfg(not(feature = "remote-http"))]
    pub fn create_job_service(config: &FinderConfig) -> SolveResult<Arc<dyn JobService>> {
        let _ = config;
        Err(crate::error::SolveError::communication_with_context(
            "remote job service feature not enabled",
            crate::error::ErrorContext::new("configure"),
        ))
    }
}
