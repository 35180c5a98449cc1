//! wmbs-db - database access layer for workload/job bookkeeping.
//!
//! Builds the bookkeeping schema and answers which files a subscription may
//! process, honouring per-subscription site white/black lists.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod wmbs;
