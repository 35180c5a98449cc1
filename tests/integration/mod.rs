//! Integration tests for wmbs-db.

pub mod availability_test;
pub mod postgres_test;
pub mod schema_test;

use tempfile::TempDir;
use wmbs_db::db::Database;
use wmbs_db::wmbs;

/// Opens a file-backed SQLite database with the schema applied.
pub async fn create_test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wmbs.db");
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect_url(&url).await.unwrap();
    db.create_schema(&wmbs::wmbs_schema(db.dialect()))
        .await
        .unwrap();
    (db, dir)
}
