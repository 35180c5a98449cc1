//! Storage location operations.

use super::LocationId;
use crate::db::query_error;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sqlx::{Any, Executor, FromRow};

/// A storage element files can be placed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: LocationId,
    pub se_name: String,
    pub job_slots: i64,
}

/// Inserts a location and returns its id (idempotent operation).
#[tracing::instrument(skip(exe), err)]
pub async fn insert<'c, E>(exe: E, se_name: &str) -> Result<LocationId>
where
    E: Executor<'c, Database = Any>,
{
    // The no-op update makes RETURNING yield the id on conflict too
    let query = "
        INSERT INTO wmbs_location (se_name)
        VALUES ($1)
        ON CONFLICT (se_name) DO UPDATE SET se_name = EXCLUDED.se_name
        RETURNING id
    ";

    sqlx::query_scalar(query)
        .bind(se_name)
        .fetch_one(exe)
        .await
        .map_err(|e| query_error("Failed to insert location", e))
}

/// Looks up a location id by storage element name.
pub async fn id_by_name<'c, E>(exe: E, se_name: &str) -> Result<Option<LocationId>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar("SELECT id FROM wmbs_location WHERE se_name = $1")
        .bind(se_name)
        .fetch_optional(exe)
        .await
        .map_err(|e| query_error("Failed to look up location", e))
}

/// Sets the number of job slots at a location.
pub async fn set_job_slots<'c, E>(exe: E, location: LocationId, slots: i64) -> Result<()>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query("UPDATE wmbs_location SET job_slots = $1 WHERE id = $2")
        .bind(slots)
        .bind(location)
        .execute(exe)
        .await
        .map_err(|e| query_error("Failed to update job slots", e))?;
    Ok(())
}

/// Lists all locations ordered by name.
pub async fn list<'c, E>(exe: E) -> Result<Vec<Location>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_as("SELECT id, se_name, job_slots FROM wmbs_location ORDER BY se_name")
        .fetch_all(exe)
        .await
        .map_err(|e| query_error("Failed to list locations", e))
}
