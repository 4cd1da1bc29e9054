#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use site_finder::solver::remote::{JobDetails, JobPayload, JobService, OutputArtifact};
use site_finder::{Place, Record, SolveError, SolveResult};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Job service that replays scripted responses and records what it was sent.
pub struct ScriptedJobService {
    created: Mutex<Option<SolveResult<JobDetails>>>,
    polls: Mutex<VecDeque<SolveResult<JobDetails>>>,
    submissions: Mutex<Vec<(String, JobPayload)>>,
}

impl ScriptedJobService {
    /// `created` answers the submission; `polls` answer status requests in
    /// order, after which the job reports `running` forever.
    pub fn new(created: SolveResult<JobDetails>, polls: Vec<SolveResult<JobDetails>>) -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Some(created)),
            polls: Mutex::new(polls.into()),
            submissions: Mutex::new(Vec::new()),
        })
    }

    /// A job that is accepted and then reaches `details` on the first poll.
    pub fn finishing_with(details: JobDetails) -> Arc<Self> {
        Self::new(Ok(JobDetails::new("job-1", "queued")), vec![Ok(details)])
    }

    pub fn submissions(&self) -> Vec<(String, JobPayload)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobService for ScriptedJobService {
    async fn create_job(&self, deployment_id: &str, payload: &JobPayload) -> SolveResult<JobDetails> {
        self.submissions
            .lock()
            .unwrap()
            .push((deployment_id.to_string(), payload.clone()));
        self.created
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(SolveError::communication("job already submitted")))
    }

    async fn job_details(&self, job_id: &str) -> SolveResult<JobDetails> {
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobDetails::new(job_id, "running")))
    }
}

pub fn encode_text(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text)
}

pub fn csv_artifact(id: &str, fields: &[&str], rows: Vec<Vec<Value>>) -> OutputArtifact {
    OutputArtifact::table(id, fields, rows)
}

pub fn place(id: &str, lat: f64, lon: f64) -> Place {
    Place::new()
        .with("id", id)
        .with("lat", lat)
        .with("lon", lon)
        .with("demand", 10)
}

pub fn route(from: &str, to: &str, distance: f64) -> Record {
    match json!({"from": from, "to": to, "distance": distance}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn site_record(id: &str) -> Record {
    match json!({"id": id, "selected": true}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
