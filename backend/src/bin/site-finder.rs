//! Site Finder command-line entry point.
//!
//! Reads places and routes from JSON files, runs one site search and prints
//! the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! WML_API_KEY=... WML_URL=https://... \
//!   cargo run --bin site-finder -- --places places.json --routes routes.json \
//!     --count 3 --deployment <deployment-id>
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)
//! - `WML_*`, `SITE_POLL_*`: see [`site_finder::config`]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use site_finder::{
    FinderConfig, ModelSolution, Place, Record, SiteFinder, Table, DEFAULT_SITE_COUNT,
};

#[derive(Debug, Parser)]
#[command(name = "site-finder", about = "Find candidate facility sites")]
struct Args {
    /// JSON array of place objects
    #[arg(long)]
    places: PathBuf,

    /// JSON array of route objects
    #[arg(long)]
    routes: PathBuf,

    /// Number of sites to select
    #[arg(long, default_value_t = DEFAULT_SITE_COUNT)]
    count: usize,

    /// Deployment id (`local` runs in-process); defaults to `WML_DEPLOYMENT_UID`
    #[arg(long)]
    deployment: Option<String>,

    /// TOML configuration file; the environment is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Stand-in for builds without an in-process model.
fn unlinked_model(_: &Table, _: &Table, _: usize) -> anyhow::Result<ModelSolution> {
    anyhow::bail!("No local optimization model is linked into this binary; pass --deployment")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FinderConfig::from_file(path)?,
        None => FinderConfig::from_env(),
    };

    let places: Vec<Place> = read_json(&args.places)?;
    let routes: Vec<Record> = read_json(&args.routes)?;
    info!("Loaded {} places and {} routes", places.len(), routes.len());

    let finder = SiteFinder::new(Arc::new(unlinked_model), config);
    let search = finder
        .find_possible_sites(&places, &routes, args.count, args.deployment.as_deref())
        .await;

    let output = json!({
        "status": search.status,
        "error": search.error.as_ref().map(|e| e.to_string()),
        "places": search.places,
        "job": search.job,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
