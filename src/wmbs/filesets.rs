//! Fileset operations.

use super::{unix_now, FileId, FilesetId};
use crate::db::query_error;
use crate::error::Result;
use sqlx::{Any, AnyConnection, Executor};
use tracing::debug;

/// Creates a fileset and returns its id (idempotent operation).
#[tracing::instrument(skip(exe), err)]
pub async fn insert<'c, E>(exe: E, name: &str) -> Result<FilesetId>
where
    E: Executor<'c, Database = Any>,
{
    let query = "
        INSERT INTO wmbs_fileset (name, open, last_update)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
    ";

    sqlx::query_scalar(query)
        .bind(name)
        .bind(true)
        .bind(unix_now())
        .fetch_one(exe)
        .await
        .map_err(|e| query_error("Failed to insert fileset", e))
}

/// Looks up a fileset id by name.
pub async fn id_by_name<'c, E>(exe: E, name: &str) -> Result<Option<FilesetId>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar("SELECT id FROM wmbs_fileset WHERE name = $1")
        .bind(name)
        .fetch_optional(exe)
        .await
        .map_err(|e| query_error("Failed to look up fileset", e))
}

/// Marks a fileset open or closed to new files.
pub async fn set_open<'c, E>(exe: E, fileset: FilesetId, open: bool) -> Result<()>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query("UPDATE wmbs_fileset SET open = $1, last_update = $2 WHERE id = $3")
        .bind(open)
        .bind(unix_now())
        .bind(fileset)
        .execute(exe)
        .await
        .map_err(|e| query_error("Failed to update fileset", e))?;
    Ok(())
}

/// Returns whether the fileset accepts new files, or `None` if it does not exist.
pub async fn is_open<'c, E>(exe: E, fileset: FilesetId) -> Result<Option<bool>>
where
    E: Executor<'c, Database = Any>,
{
    let open: Option<i64> = sqlx::query_scalar(
        "SELECT CAST(CASE WHEN open THEN 1 ELSE 0 END AS BIGINT) FROM wmbs_fileset WHERE id = $1",
    )
    .bind(fileset)
    .fetch_optional(exe)
    .await
    .map_err(|e| query_error("Failed to read fileset", e))?;
    Ok(open.map(|flag| flag != 0))
}

/// Adds files to a fileset. Files already in the fileset are left alone.
pub async fn add_files(
    conn: &mut AnyConnection,
    fileset: FilesetId,
    files: &[FileId],
) -> Result<()> {
    let now = unix_now();
    for file in files {
        sqlx::query(
            "INSERT INTO wmbs_fileset_files (file, fileset, insert_time) VALUES ($1, $2, $3)
             ON CONFLICT (file, fileset) DO NOTHING",
        )
        .bind(*file)
        .bind(fileset)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| query_error(&format!("Failed to add file {file} to fileset"), e))?;
    }
    debug!("Added {} files to fileset {}", files.len(), fileset);
    Ok(())
}

/// Lists the ids of every file in a fileset.
pub async fn files<'c, E>(exe: E, fileset: FilesetId) -> Result<Vec<FileId>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar("SELECT file FROM wmbs_fileset_files WHERE fileset = $1 ORDER BY file")
        .bind(fileset)
        .fetch_all(exe)
        .await
        .map_err(|e| query_error("Failed to list fileset files", e))
}
