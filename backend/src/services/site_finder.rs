//! Site search facade.
//!
//! [`SiteFinder::find_possible_sites`] normalizes the inputs, picks a backend
//! for the deployment, solves and turns the selected rows back into
//! [`Place`]s. It always returns a [`SiteSearch`]: failures are reported
//! through its status string and typed error, never as an `Err`.

use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::FinderConfig;
use crate::error::SolveError;
use crate::models::{Place, Record};
use crate::services::job_tracker::JobTrace;
use crate::solver::{
    resolve_deployment, BackendFactory, DeploymentTarget, JobService, SiteModel, Solution,
};
use crate::table::normalize_inputs;

/// Number of sites requested when the caller has no preference.
pub const DEFAULT_SITE_COUNT: usize = 3;

/// Outcome of a site search.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSearch {
    /// Selected sites; may be fewer than requested
    pub places: Vec<Place>,
    /// Human-readable outcome
    pub status: String,
    /// What went wrong, if anything
    pub error: Option<SolveError>,
    /// History of the remote job, for remote solves that got as far as submitting one
    pub job: Option<JobTrace>,
}

impl SiteSearch {
    fn failed(error: SolveError, job: Option<JobTrace>) -> Self {
        Self {
            places: Vec::new(),
            status: error.status_message(),
            error: Some(error),
            job,
        }
    }

    fn solved(solution: Solution, job: Option<JobTrace>) -> Self {
        let error = (!solution.missing_outputs.is_empty()).then(|| SolveError::IncompleteOutput {
            missing: solution.missing_outputs,
        });

        Self {
            places: solution.sites.into_iter().map(Place::from_dict).collect(),
            status: solution.status,
            error,
            job,
        }
    }

    /// True when no error was recorded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The `(places, status)` pair.
    pub fn into_parts(self) -> (Vec<Place>, String) {
        (self.places, self.status)
    }
}

/// Entry point for site searches.
#[derive(Clone)]
pub struct SiteFinder {
    model: Arc<dyn SiteModel>,
    config: FinderConfig,
    job_service: Option<Arc<dyn JobService>>,
}

impl SiteFinder {
    pub fn new(model: Arc<dyn SiteModel>, config: FinderConfig) -> Self {
        Self {
            model,
            config,
            job_service: None,
        }
    }

    /// Finder configured from environment variables.
    pub fn from_env(model: Arc<dyn SiteModel>) -> Self {
        Self::new(model, FinderConfig::from_env())
    }

    /// Use `service` for remote jobs instead of the HTTP client.
    pub fn with_job_service(mut self, service: Arc<dyn JobService>) -> Self {
        self.job_service = Some(service);
        self
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Find up to `count` sites among `places`.
    ///
    /// `deployment_id` overrides the configured deployment; with neither set
    /// the model runs in-process.
    pub async fn find_possible_sites(
        &self,
        places: &[Place],
        routes: &[Record],
        count: usize,
        deployment_id: Option<&str>,
    ) -> SiteSearch {
        self.find_possible_sites_with_cancel(
            places,
            routes,
            count,
            deployment_id,
            CancellationToken::new(),
        )
        .await
    }

    /// Like [`find_possible_sites`](Self::find_possible_sites), but stops
    /// once `cancel` fires. A search cancelled before submission never
    /// creates a remote job.
    pub async fn find_possible_sites_with_cancel(
        &self,
        places: &[Place],
        routes: &[Record],
        count: usize,
        deployment_id: Option<&str>,
        cancel: CancellationToken,
    ) -> SiteSearch {
        let (places_table, routes_table) = match normalize_inputs(places, routes) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Rejected site search input: {}", e);
                return SiteSearch::failed(e.into(), None);
            }
        };

        let deployment = resolve_deployment(deployment_id, self.config.deployment_id.as_deref());
        let target = DeploymentTarget::select(deployment.as_deref());

        let backend = match BackendFactory::create(
            target,
            Arc::clone(&self.model),
            &self.config,
            self.job_service.clone(),
            cancel,
        ) {
            Ok(backend) => backend,
            Err(e) => {
                warn!(
                    "Unable to deploy using deployment {}: {}",
                    deployment.as_deref().unwrap_or_default(),
                    e
                );
                return SiteSearch::failed(e, None);
            }
        };

        info!(
            "Searching for {} sites among {} places ({} backend)",
            count,
            places_table.len(),
            backend.name()
        );

        let result = backend.solve(&places_table, &routes_table, count).await;
        let job = backend.job_trace();

        match result {
            Ok(solution) => SiteSearch::solved(solution, job),
            Err(e) => SiteSearch::failed(e, job),
        }
    }

    /// Blocking variant for callers outside an async runtime.
    ///
    /// Called from inside a tokio runtime it reports a
    /// [`SolveError::BackendFault`] instead of blocking the runtime.
    pub fn find_possible_sites_blocking(
        &self,
        places: &[Place],
        routes: &[Record],
        count: usize,
        deployment_id: Option<&str>,
    ) -> SiteSearch {
        if tokio::runtime::Handle::try_current().is_ok() {
            let err = SolveError::BackendFault(
                "Blocking site search called from within an async runtime; use find_possible_sites"
                    .to_string(),
            );
            warn!("{}", err);
            return SiteSearch::failed(err, None);
        }

        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => {
                runtime.block_on(self.find_possible_sites(places, routes, count, deployment_id))
            }
            Err(e) => SiteSearch::failed(
                SolveError::BackendFault(format!("Failed to start async runtime: {}", e)),
                None,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveErrorKind;
    use crate::solver::ModelSolution;
    use crate::table::Table;
    use serde_json::json;

    fn echo_model() -> Arc<dyn SiteModel> {
        Arc::new(
            |places: &Table, _: &Table, count: usize| -> anyhow::Result<ModelSolution> {
                let sites = places.to_records().into_iter().take(count).collect();
                Ok(ModelSolution::new(sites, "optimal"))
            },
        )
    }

    fn place(id: &str) -> Place {
        Place::new().with("id", id).with("lat", 1.0)
    }

    #[test]
    fn test_blocking_local_search() {
        let finder = SiteFinder::new(echo_model(), FinderConfig::default());
        let search = finder.find_possible_sites_blocking(
            &[place("a"), place("b"), place("c")],
            &[],
            2,
            None,
        );

        assert!(search.is_success());
        assert_eq!(search.status, "optimal");
        assert_eq!(search.places.len(), 2);
        assert_eq!(search.places[1].id().as_deref(), Some("b"));
        assert!(search.job.is_none());
    }

    #[test]
    fn test_incomplete_output_keeps_sites() {
        let search = SiteSearch::solved(
            Solution {
                sites: vec![place("a").into_dict()],
                status: "completed".to_string(),
                missing_outputs: vec![r".*\.txt".to_string()],
            },
            None,
        );
        assert_eq!(search.places.len(), 1);
        assert_eq!(search.status, "completed");
        assert_eq!(
            search.error.as_ref().map(SolveError::kind),
            Some(SolveErrorKind::IncompleteOutput)
        );
    }

    #[test]
    fn test_into_parts() {
        let search = SiteSearch::failed(SolveError::BackendFault("no solution".into()), None);
        let (places, status) = search.into_parts();
        assert!(places.is_empty());
        assert_eq!(status, "no solution");
    }

    #[tokio::test]
    async fn test_blocking_search_inside_runtime_is_a_fault() {
        let finder = SiteFinder::new(echo_model(), FinderConfig::default());
        let search = finder.find_possible_sites_blocking(&[place("a")], &[], 1, None);

        assert!(search.places.is_empty());
        assert_eq!(
            search.error.as_ref().map(SolveError::kind),
            Some(SolveErrorKind::BackendFault)
        );
        assert!(search.status.contains("async runtime"));
    }

    #[tokio::test]
    async fn test_configured_deployment_is_used() {
        let config = FinderConfig::default().with_deployment("remote-dep");
        let finder = SiteFinder::new(echo_model(), config);

        // No credentials configured, so the remote backend cannot be built.
        let search = finder
            .find_possible_sites(&[place("a")], &[json!({"from": "a"}).as_object().cloned().unwrap()], 1, None)
            .await;
        assert_eq!(
            search.error.as_ref().map(SolveError::kind),
            Some(SolveErrorKind::CommunicationFault)
        );

        let search = finder
            .find_possible_sites(&[place("a")], &[], 1, Some("local"))
            .await;
        assert!(search.is_success());
    }
}
