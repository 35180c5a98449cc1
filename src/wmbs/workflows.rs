//! Workflow operations.

use super::WorkflowId;
use crate::db::query_error;
use crate::error::Result;
use sqlx::{Any, Executor};

/// Registers a workflow and returns its id (idempotent operation).
#[tracing::instrument(skip(exe), err)]
pub async fn insert<'c, E>(exe: E, spec: &str, name: &str, owner: &str) -> Result<WorkflowId>
where
    E: Executor<'c, Database = Any>,
{
    let query = "
        INSERT INTO wmbs_workflow (spec, name, owner)
        VALUES ($1, $2, $3)
        ON CONFLICT (spec, name, owner) DO UPDATE SET spec = EXCLUDED.spec
        RETURNING id
    ";

    sqlx::query_scalar(query)
        .bind(spec)
        .bind(name)
        .bind(owner)
        .fetch_one(exe)
        .await
        .map_err(|e| query_error("Failed to insert workflow", e))
}

/// Looks up a workflow id by its (spec, name, owner) identity.
pub async fn id_by_identity<'c, E>(
    exe: E,
    spec: &str,
    name: &str,
    owner: &str,
) -> Result<Option<WorkflowId>>
where
    E: Executor<'c, Database = Any>,
{
    sqlx::query_scalar(
        "SELECT id FROM wmbs_workflow WHERE spec = $1 AND name = $2 AND owner = $3",
    )
    .bind(spec)
    .bind(name)
    .bind(owner)
    .fetch_optional(exe)
    .await
    .map_err(|e| query_error("Failed to look up workflow", e))
}
