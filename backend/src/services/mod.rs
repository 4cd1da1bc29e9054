//! Service layer: the site search facade and remote job tracking.

pub mod job_tracker;
pub mod site_finder;

pub use job_tracker::{JobTrace, JobTracker, StateEntry, TraceOutcome};
pub use site_finder::{SiteFinder, SiteSearch, DEFAULT_SITE_COUNT};
