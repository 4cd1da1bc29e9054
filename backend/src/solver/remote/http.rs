//! HTTP client for the optimization service's deployment job API.
//!
//! Requests are authorized with a bearer token obtained by exchanging the API
//! key at the token endpoint. The token is cached until shortly before it
//! expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::job::{JobDetails, JobPayload};
use super::JobService;
use crate::config::FinderConfig;
use crate::error::{ErrorContext, SolveError, SolveResult};

/// Tokens are refreshed this long before the service says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const API_KEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct DeploymentRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct CreateJobBody<'a> {
    deployment: DeploymentRef<'a>,
    decision_optimization: &'a JobPayload,
}

/// [`JobService`] backed by the service's REST API.
pub struct HttpJobService {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    instance_id: Option<String>,
    token_url: String,
    api_version: String,
    token: Mutex<Option<CachedToken>>,
}

impl HttpJobService {
    /// Build a client from `config`. Fails when credentials are incomplete.
    pub fn new(config: &FinderConfig) -> SolveResult<Self> {
        let missing = config.credentials.missing();
        if !missing.is_empty() {
            return Err(SolveError::communication_with_context(
                "optimization service credentials are incomplete",
                ErrorContext::new("configure")
                    .with_details(format!("missing: {}", missing.join(", "))),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SolveError::communication(format!("Failed to build HTTP client: {}", e)))?;

        let creds = &config.credentials;
        Ok(Self {
            http,
            base_url: creds
                .url
                .as_deref()
                .unwrap_or_default()
                .trim()
                .trim_end_matches('/')
                .to_string(),
            api_key: creds.api_key.clone().unwrap_or_default(),
            instance_id: creds
                .instance_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            token_url: config.token_url.clone(),
            api_version: config.api_version.clone(),
            token: Mutex::new(None),
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/ml/v4/deployment_jobs", self.base_url)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.jobs_url(), job_id)
    }

    async fn bearer_token(&self) -> SolveResult<String> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
            .map(|token| token.value.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        debug!("Requesting access token from {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", API_KEY_GRANT), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("token", e))?;
        let token: TokenResponse = read_json("token", response).await?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *self.token.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }

    fn authorize(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let request = request
            .bearer_auth(token)
            .query(&[("version", self.api_version.as_str())]);
        match &self.instance_id {
            Some(id) => request.header("ML-Instance-ID", id),
            None => request,
        }
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn create_job(&self, deployment_id: &str, payload: &JobPayload) -> SolveResult<JobDetails> {
        let token = self.bearer_token().await?;
        let body = CreateJobBody {
            deployment: DeploymentRef { id: deployment_id },
            decision_optimization: payload,
        };

        let response = self
            .authorize(self.http.post(self.jobs_url()), &token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("create_job", e))?;
        read_json("create_job", response).await
    }

    async fn job_details(&self, job_id: &str) -> SolveResult<JobDetails> {
        let token = self.bearer_token().await?;
        let response = self
            .authorize(self.http.get(self.job_url(job_id)), &token)
            .send()
            .await
            .map_err(|e| transport_error("job_details", e))?;
        read_json("job_details", response).await
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> SolveError {
    let details = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    SolveError::communication_with_context(
        err.to_string(),
        ErrorContext::new(operation).with_details(details),
    )
}

async fn read_json<T: DeserializeOwned>(operation: &str, response: reqwest::Response) -> SolveResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SolveError::communication_with_context(
            format!("HTTP {}", status),
            ErrorContext::new(operation).with_details(body),
        ));
    }

    response.json::<T>().await.map_err(|e| {
        SolveError::communication_with_context(
            format!("Failed to decode response: {}", e),
            ErrorContext::new(operation),
        )
    })
}
