//! Files available for processing by a subscription.
//!
//! A file is available when it belongs to the subscription's fileset, has at
//! least one location, and is not acquired, failed or complete for that
//! subscription. The subscription's site list narrows the locations:
//! whitelisted sites only if any whitelist entry exists, otherwise every site
//! except the blacklisted ones.

use super::{FileId, SubscriptionId};
use crate::db::query_error;
use crate::error::Result;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::{Any, AnyConnection, Executor};
use std::collections::BTreeMap;
use tracing::debug;

const AVAILABLE_FILES_BASE: &str = "SELECT wff.file, wl.se_name
FROM wmbs_fileset_files wff
INNER JOIN wmbs_subscription ws ON ws.fileset = wff.fileset
INNER JOIN wmbs_file_location wfl ON wfl.file = wff.file
INNER JOIN wmbs_location wl ON wl.id = wfl.location
LEFT OUTER JOIN wmbs_sub_files_acquired wa ON wa.file = wff.file AND wa.subscription = ws.id
LEFT OUTER JOIN wmbs_sub_files_failed wf ON wf.file = wff.file AND wf.subscription = ws.id
LEFT OUTER JOIN wmbs_sub_files_complete wc ON wc.file = wff.file AND wc.subscription = ws.id
WHERE ws.id = $1 AND wa.file IS NULL AND wf.file IS NULL AND wc.file IS NULL";

const WHITELIST_CLAUSE: &str = "
  AND wfl.location IN (SELECT location FROM wmbs_subscription_location
                       WHERE subscription = $1 AND valid)";

const BLACKLIST_CLAUSE: &str = "
  AND wfl.location NOT IN (SELECT location FROM wmbs_subscription_location
                           WHERE subscription = $1 AND NOT valid)";

const ORDER_CLAUSE: &str = "
ORDER BY wff.file, wl.se_name";

/// How a subscription's site list restricts file locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteFilter {
    /// No site list entries: every location counts.
    #[default]
    Unrestricted,
    /// At least one whitelist entry: only whitelisted locations count.
    Whitelist,
    /// Only blacklist entries: every location but those counts.
    Blacklist,
}

impl SiteFilter {
    /// Picks the filter from the number of whitelist and blacklist entries.
    pub fn from_counts(whitelisted: i64, blacklisted: i64) -> Self {
        if whitelisted > 0 {
            Self::Whitelist
        } else if blacklisted > 0 {
            Self::Blacklist
        } else {
            Self::Unrestricted
        }
    }
}

/// A file available to a subscription, with the allowed locations holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableFile {
    pub file: FileId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

/// Determines the site filter of a subscription from its site list.
pub async fn site_filter<'c, E>(exe: E, subscription: SubscriptionId) -> Result<SiteFilter>
where
    E: Executor<'c, Database = Any>,
{
    let (whitelisted, blacklisted): (i64, i64) = sqlx::query_as(
        "SELECT
             CAST(COALESCE(SUM(CASE WHEN valid THEN 1 ELSE 0 END), 0) AS BIGINT),
             CAST(COALESCE(SUM(CASE WHEN valid THEN 0 ELSE 1 END), 0) AS BIGINT)
         FROM wmbs_subscription_location
         WHERE subscription = $1",
    )
    .bind(subscription)
    .fetch_one(exe)
    .await
    .map_err(|e| query_error("Failed to read subscription site list", e))?;

    Ok(SiteFilter::from_counts(whitelisted, blacklisted))
}

/// Builds the availability query for `filter`. The only bind parameter is
/// the subscription id, `$1`.
pub fn available_files_sql(filter: SiteFilter) -> String {
    let mut sql = String::from(AVAILABLE_FILES_BASE);
    match filter {
        SiteFilter::Whitelist => sql.push_str(WHITELIST_CLAUSE),
        SiteFilter::Blacklist => sql.push_str(BLACKLIST_CLAUSE),
        SiteFilter::Unrestricted => {}
    }
    sql.push_str(ORDER_CLAUSE);
    sql
}

/// Collapses `(file, se_name)` rows into one record per file.
///
/// Records are ordered by file id; locations keep first-seen order and
/// duplicates are dropped.
pub fn group_by_file<I>(rows: I) -> Vec<AvailableFile>
where
    I: IntoIterator<Item = (FileId, String)>,
{
    let mut grouped: BTreeMap<FileId, Vec<String>> = BTreeMap::new();
    for (file, se_name) in rows {
        let locations = grouped.entry(file).or_default();
        if !locations.contains(&se_name) {
            locations.push(se_name);
        }
    }

    grouped
        .into_iter()
        .map(|(file, locations)| AvailableFile { file, locations })
        .collect()
}

/// Returns the files available to `subscription`, grouped with their locations.
///
/// An unknown subscription yields an empty list.
#[tracing::instrument(skip(conn), err)]
pub async fn available_files(
    conn: &mut AnyConnection,
    subscription: SubscriptionId,
) -> Result<Vec<AvailableFile>> {
    let filter = site_filter(&mut *conn, subscription).await?;
    let sql = available_files_sql(filter);
    debug!("Subscription {} site filter: {:?}", subscription, filter);

    let mut rows = Vec::new();
    let mut stream = sqlx::query_as::<_, (FileId, String)>(&sql)
        .bind(subscription)
        .fetch(&mut *conn);
    while let Some(row) = stream
        .try_next()
        .await
        .map_err(|e| query_error("Failed to list available files", e))?
    {
        rows.push(row);
    }

    let files = group_by_file(rows);
    debug!(
        "Subscription {} has {} available files",
        subscription,
        files.len()
    );
    Ok(files)
}
