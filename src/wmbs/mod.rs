//! Workload bookkeeping tables and the queries that run against them.
//!
//! Filesets group files, files live at storage locations, and a subscription
//! binds a fileset to a workflow. Per subscription, each file is tracked as
//! acquired, failed or complete; anything else with a location is available.

pub mod available;
pub mod files;
pub mod filesets;
pub mod locations;
mod schema;
pub mod subscriptions;
pub mod workflows;

pub use available::{available_files, AvailableFile, SiteFilter};
pub use files::{File, NewFile};
pub use locations::Location;
pub use schema::{wmbs_schema, SUBSCRIPTION_TYPES, TABLES};
pub use subscriptions::{FileState, NewSubscription};

/// Row ids, always positive.
pub type FileId = i64;
pub type FilesetId = i64;
pub type LocationId = i64;
pub type SubscriptionId = i64;
pub type WorkflowId = i64;

/// Seconds since the Unix epoch, as stored in the `*_time` / `last_update` columns.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
