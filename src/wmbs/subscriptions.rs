//! Subscription operations: creation, site white/black lists and the
//! per-file acquired/failed/complete markers.

use super::{locations, unix_now, FileId, FilesetId, LocationId, SubscriptionId, WorkflowId};
use crate::db::query_error;
use crate::error::{Result, WmbsError};
use serde::{Deserialize, Serialize};
use sqlx::{Any, AnyConnection, Executor, FromRow};
use tracing::{debug, info};

/// A subscription to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub fileset: FilesetId,
    pub workflow: WorkflowId,
    /// Name of a row in `wmbs_sub_types`, e.g. `Processing`.
    pub subscription_type: String,
    pub split_algo: String,
}

impl NewSubscription {
    /// Describes a subscription using the `FileBased` splitting algorithm.
    pub fn new(
        fileset: FilesetId,
        workflow: WorkflowId,
        subscription_type: impl Into<String>,
    ) -> Self {
        Self {
            fileset,
            workflow,
            subscription_type: subscription_type.into(),
            split_algo: "FileBased".to_string(),
        }
    }

    /// Overrides the job splitting algorithm name.
    pub fn with_split_algo(mut self, split_algo: impl Into<String>) -> Self {
        self.split_algo = split_algo.into();
        self
    }
}

/// A stored subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub fileset: FilesetId,
    pub workflow: WorkflowId,
    pub subscription_type: String,
    pub split_algo: String,
}

/// One entry of a subscription's site list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteListEntry {
    pub se_name: String,
    /// `true` for a whitelist entry, `false` for a blacklist entry.
    pub valid: bool,
}

/// Processing state of a file within a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Acquired,
    Failed,
    Complete,
}

impl FileState {
    /// Returns the state as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquired => "acquired",
            Self::Failed => "failed",
            Self::Complete => "complete",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::Acquired => "wmbs_sub_files_acquired",
            Self::Failed => "wmbs_sub_files_failed",
            Self::Complete => "wmbs_sub_files_complete",
        }
    }
}

/// Creates a subscription and returns its id.
///
/// Fails with a query error if the subscription type is unknown.
#[tracing::instrument(skip(exe), err)]
pub async fn insert<'c, E>(exe: E, subscription: &NewSubscription) -> Result<SubscriptionId>
where
    E: Executor<'c, Database = Any>,
{
    let query = "
        INSERT INTO wmbs_subscription (fileset, workflow, subtype, split_algo, last_update)
        SELECT $1, $2, id, $3, $4 FROM wmbs_sub_types WHERE name = $5
        RETURNING id
    ";

    let id: Option<SubscriptionId> = sqlx::query_scalar(query)
        .bind(subscription.fileset)
        .bind(subscription.workflow)
        .bind(subscription.split_algo.as_str())
        .bind(unix_now())
        .bind(subscription.subscription_type.as_str())
        .fetch_optional(exe)
        .await
        .map_err(|e| query_error("Failed to insert subscription", e))?;

    id.ok_or_else(|| {
        WmbsError::query(format!(
            "Unknown subscription type '{}'",
            subscription.subscription_type
        ))
    })
}

/// Gets a subscription by id.
pub async fn get<'c, E>(exe: E, id: SubscriptionId) -> Result<Option<Subscription>>
where
    E: Executor<'c, Database = Any>,
{
    let query = "
        SELECT ws.id, ws.fileset, ws.workflow, wst.name AS subscription_type, ws.split_algo
        FROM wmbs_subscription ws
        INNER JOIN wmbs_sub_types wst ON wst.id = ws.subtype
        WHERE ws.id = $1
    ";

    sqlx::query_as(query)
        .bind(id)
        .fetch_optional(exe)
        .await
        .map_err(|e| query_error("Failed to get subscription", e))
}

/// Puts `location` on the subscription's whitelist (`valid`) or blacklist.
///
/// An existing entry for the same location is replaced.
pub async fn set_site_list<'c, E>(
    exe: E,
    subscription: SubscriptionId,
    location: LocationId,
    valid: bool,
) -> Result<()>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query(
        "INSERT INTO wmbs_subscription_location (subscription, location, valid)
         VALUES ($1, $2, $3)
         ON CONFLICT (subscription, location) DO UPDATE SET valid = EXCLUDED.valid",
    )
    .bind(subscription)
    .bind(location)
    .bind(valid)
    .execute(exe)
    .await
    .map_err(|e| query_error("Failed to update site list", e))?;
    Ok(())
}

/// Whitelists the named sites, registering unknown ones as locations.
pub async fn add_white_list(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    sites: &[&str],
) -> Result<()> {
    add_site_list(conn, subscription, sites, true).await
}

/// Blacklists the named sites, registering unknown ones as locations.
pub async fn add_black_list(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    sites: &[&str],
) -> Result<()> {
    add_site_list(conn, subscription, sites, false).await
}

async fn add_site_list(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    sites: &[&str],
    valid: bool,
) -> Result<()> {
    for site in sites {
        let location = locations::insert(&mut *conn, site).await?;
        set_site_list(&mut *conn, subscription, location, valid).await?;
    }
    info!(
        "Subscription {}: {} {} sites",
        subscription,
        if valid { "whitelisted" } else { "blacklisted" },
        sites.len()
    );
    Ok(())
}

/// Returns the subscription's site list ordered by site name.
pub async fn site_list<'c, E>(exe: E, subscription: SubscriptionId) -> Result<Vec<SiteListEntry>>
where
    E: Executor<'c, Database = Any>,
{
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT wl.se_name, CAST(CASE WHEN wsl.valid THEN 1 ELSE 0 END AS BIGINT)
         FROM wmbs_subscription_location wsl
         INNER JOIN wmbs_location wl ON wl.id = wsl.location
         WHERE wsl.subscription = $1
         ORDER BY wl.se_name",
    )
    .bind(subscription)
    .fetch_all(exe)
    .await
    .map_err(|e| query_error("Failed to read site list", e))?;

    Ok(rows
        .into_iter()
        .map(|(se_name, valid)| SiteListEntry {
            se_name,
            valid: valid != 0,
        })
        .collect())
}

/// Removes every site list entry of the subscription.
pub async fn clear_site_list<'c, E>(exe: E, subscription: SubscriptionId) -> Result<u64>
where
    E: Executor<'c, Database = Any>,
{
    let result = sqlx::query("DELETE FROM wmbs_subscription_location WHERE subscription = $1")
        .bind(subscription)
        .execute(exe)
        .await
        .map_err(|e| query_error("Failed to clear site list", e))?;
    Ok(result.rows_affected())
}

/// Records `files` in `state` for the subscription (idempotent operation).
///
/// Marking a file failed or complete also drops its acquired marker. Run
/// inside a transaction to apply the whole batch atomically.
pub async fn mark(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    state: FileState,
    files: &[FileId],
) -> Result<()> {
    let insert = format!(
        "INSERT INTO {} (subscription, file) VALUES ($1, $2)
         ON CONFLICT (subscription, file) DO NOTHING",
        state.table()
    );

    for file in files {
        if state != FileState::Acquired {
            sqlx::query(
                "DELETE FROM wmbs_sub_files_acquired WHERE subscription = $1 AND file = $2",
            )
            .bind(subscription)
            .bind(*file)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("Failed to release acquired file", e))?;
        }

        sqlx::query(&insert)
            .bind(subscription)
            .bind(*file)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                query_error(&format!("Failed to mark file {file} {}", state.as_str()), e)
            })?;
    }

    debug!(
        "Subscription {}: marked {} files {}",
        subscription,
        files.len(),
        state.as_str()
    );
    Ok(())
}

/// Marks files as acquired by the subscription.
pub async fn mark_acquired(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    files: &[FileId],
) -> Result<()> {
    mark(conn, subscription, FileState::Acquired, files).await
}

/// Marks files as failed for the subscription.
pub async fn mark_failed(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    files: &[FileId],
) -> Result<()> {
    mark(conn, subscription, FileState::Failed, files).await
}

/// Marks files as complete for the subscription.
pub async fn mark_complete(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    files: &[FileId],
) -> Result<()> {
    mark(conn, subscription, FileState::Complete, files).await
}

/// Drops the acquired marker of `files`, making them available again.
pub async fn release(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
    files: &[FileId],
) -> Result<u64> {
    let mut released = 0;
    for file in files {
        let result = sqlx::query(
            "DELETE FROM wmbs_sub_files_acquired WHERE subscription = $1 AND file = $2",
        )
        .bind(subscription)
        .bind(*file)
        .execute(&mut *conn)
        .await
        .map_err(|e| query_error("Failed to release acquired file", e))?;
        released += result.rows_affected();
    }
    Ok(released)
}

/// Lists the files of the subscription in `state`, ordered by id.
pub async fn files_in_state<'c, E>(
    exe: E,
    subscription: SubscriptionId,
    state: FileState,
) -> Result<Vec<FileId>>
where
    E: Executor<'c, Database = Any>,
{
    let query = format!(
        "SELECT file FROM {} WHERE subscription = $1 ORDER BY file",
        state.table()
    );

    sqlx::query_scalar(&query)
        .bind(subscription)
        .fetch_all(exe)
        .await
        .map_err(|e| query_error(&format!("Failed to list {} files", state.as_str()), e))
}
