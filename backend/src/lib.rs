//! # Site Finder
//!
//! Dispatch layer for facility-site selection.
//!
//! Given candidate places and the routes between them, this crate decides
//! which backend solves the site-selection model and reports the outcome in a
//! single shape: a list of selected places plus a status string. The model can
//! run in-process or as an asynchronous job on a remote optimization service.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: The [`Place`] domain object and raw records
//! - [`table`]: Normalization of places and routes into tables
//! - [`solver`]: Backend trait, backend selection, local and remote backends
//! - [`services`]: The [`SiteFinder`] facade and remote job tracking
//! - [`config`]: Configuration from the environment or `site-finder.toml`
//! - [`error`]: The [`SolveError`] taxonomy and status messages
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use site_finder::{FinderConfig, SiteFinder, DEFAULT_SITE_COUNT};
//!
//! let finder = SiteFinder::new(Arc::new(my_model), FinderConfig::from_env());
//! let search = finder
//!     .find_possible_sites(&places, &routes, DEFAULT_SITE_COUNT, None)
//!     .await;
//! println!("{}: {} sites", search.status, search.places.len());
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod solver;
pub mod table;

pub use config::{FinderConfig, PollPolicy, ServiceCredentials};
pub use error::{SolveError, SolveErrorKind, SolveResult};
pub use models::{Place, Record};
pub use services::{SiteFinder, SiteSearch, DEFAULT_SITE_COUNT};
pub use solver::{DeploymentTarget, JobService, ModelSolution, SiteModel};
pub use table::{normalize_inputs, Table};
