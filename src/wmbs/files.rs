//! File operations.

use super::{FileId, LocationId};
use crate::db::query_error;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};

/// A file to be registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    /// Logical file name, unique across the system.
    pub lfn: String,
    pub size: i64,
    pub events: i64,
    pub first_event: i64,
    pub merged: bool,
}

impl NewFile {
    /// Creates an unmerged, empty file description.
    pub fn new(lfn: impl Into<String>) -> Self {
        Self {
            lfn: lfn.into(),
            size: 0,
            events: 0,
            first_event: 0,
            merged: false,
        }
    }

    /// Sets size in bytes and event count.
    pub fn with_size(mut self, size: i64, events: i64) -> Self {
        self.size = size;
        self.events = events;
        self
    }
}

/// A registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    pub id: FileId,
    pub lfn: String,
    pub size: i64,
    pub events: i64,
    pub first_event: i64,
}

/// Registers a file and returns its id. Fails if the LFN already exists.
#[tracing::instrument(skip(exe), err)]
pub async fn insert<'c, E>(exe: E, file: &NewFile) -> Result<FileId>
where
    E: Executor<'c, Database = Any>,
{
    let query = "
        INSERT INTO wmbs_file_details (lfn, size, events, first_event, merged)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";

    sqlx::query_scalar(query)
        .bind(file.lfn.as_str())
        .bind(file.size)
        .bind(file.events)
        .bind(file.first_event)
        .bind(file.merged)
        .fetch_one(exe)
        .await
        .map_err(|e| query_error(&format!("Failed to insert file {}", file.lfn), e))
}

/// Gets a file by id.
pub async fn get<'c, E>(exe: E, id: FileId) -> Result<Option<File>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_as(
        "SELECT id, lfn, size, events, first_event FROM wmbs_file_details WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(exe)
    .await
    .map_err(|e| query_error("Failed to get file", e))
}

/// Gets a file id by LFN.
pub async fn id_by_lfn<'c, E>(exe: E, lfn: &str) -> Result<Option<FileId>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar("SELECT id FROM wmbs_file_details WHERE lfn = $1")
        .bind(lfn)
        .fetch_optional(exe)
        .await
        .map_err(|e| query_error("Failed to look up file", e))
}

/// Records that `file` has a replica at `location` (idempotent operation).
pub async fn add_location<'c, E>(exe: E, file: FileId, location: LocationId) -> Result<()>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query(
        "INSERT INTO wmbs_file_location (file, location) VALUES ($1, $2)
         ON CONFLICT (file, location) DO NOTHING",
    )
    .bind(file)
    .bind(location)
    .execute(exe)
    .await
    .map_err(|e| query_error("Failed to add file location", e))?;
    Ok(())
}

/// Removes the replica of `file` at `location`.
pub async fn remove_location<'c, E>(exe: E, file: FileId, location: LocationId) -> Result<bool>
where
    E: Executor<'c, Database = Any>,
{
    let result = sqlx::query("DELETE FROM wmbs_file_location WHERE file = $1 AND location = $2")
        .bind(file)
        .bind(location)
        .execute(exe)
        .await
        .map_err(|e| query_error("Failed to remove file location", e))?;
    Ok(result.rows_affected() > 0)
}

/// Returns the storage element names holding `file`, ordered by name.
pub async fn locations<'c, E>(exe: E, file: FileId) -> Result<Vec<String>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar(
        "SELECT wl.se_name FROM wmbs_file_location wfl
         INNER JOIN wmbs_location wl ON wl.id = wfl.location
         WHERE wfl.file = $1
         ORDER BY wl.se_name",
    )
    .bind(file)
    .fetch_all(exe)
    .await
    .map_err(|e| query_error("Failed to list file locations", e))
}
