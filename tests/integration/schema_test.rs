//! Schema creation integration tests.

use super::create_test_db;
use wmbs_db::db::{Database, Dialect, SchemaCreator, TableDef};
use wmbs_db::wmbs::{self, SUBSCRIPTION_TYPES, TABLES};

#[tokio::test]
async fn test_schema_creates_every_table() {
    let (db, _dir) = create_test_db().await;

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap();
    let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
    for table in TABLES {
        assert!(names.contains(&table), "missing table {table}");
    }

    let (types,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wmbs_sub_types")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(types, SUBSCRIPTION_TYPES.len() as i64);

    db.close().await;
}

#[tokio::test]
async fn test_schema_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("wmbs.db").display());

    let db = Database::connect_url(&url).await.unwrap();
    db.create_schema(&wmbs::wmbs_schema(Dialect::Sqlite))
        .await
        .unwrap();
    wmbs::locations::insert(db.pool(), "se.cern.ch").await.unwrap();
    db.close().await;

    let db = Database::connect_url(&url).await.unwrap();
    let all = wmbs::locations::list(db.pool()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].se_name, "se.cern.ch");

    // Creating again fails on the first table and names it.
    let err = db
        .create_schema(&wmbs::wmbs_schema(Dialect::Sqlite))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Schema Error");
    assert!(err.to_string().contains("wmbs_fileset"));
    db.close().await;
}

#[tokio::test]
async fn test_custom_schema_objects() {
    let (db, _dir) = create_test_db().await;

    let mut creator = SchemaCreator::new(db.dialect());
    creator
        .add_table(
            "01wmbs_job",
            TableDef::new("wmbs_job")
                .column(format!("id {}", db.dialect().serial_primary_key()))
                .column("subscription BIGINT NOT NULL")
                .column("name VARCHAR(255) NOT NULL")
                .constraint("wmbs_job_name_unique", "UNIQUE (name)")
                .constraint(
                    "wmbs_job_sub_fk",
                    "FOREIGN KEY (subscription) REFERENCES wmbs_subscription(id) ON DELETE CASCADE",
                ),
        )
        .add_index("wmbs_job_sub", "idx_wmbs_job_sub", "wmbs_job", &["subscription"], false);

    let report = db.create_schema(&creator).await.unwrap();
    assert_eq!(report.applied, 2);
    assert!(report.skipped.is_empty());

    // The foreign key is enforced.
    let result = sqlx::query("INSERT INTO wmbs_job (subscription, name) VALUES ($1, $2)")
        .bind(999_i64)
        .bind("orphan")
        .execute(db.pool())
        .await;
    assert!(result.is_err());

    db.close().await;
}

#[test]
fn test_rendered_schema_is_stable() {
    let first = wmbs::wmbs_schema(Dialect::Postgres).to_string();
    let second = wmbs::wmbs_schema(Dialect::Postgres).to_string();
    assert_eq!(first, second);
    assert!(first.starts_with("CREATE TABLE wmbs_fileset ("));
    assert!(first.contains("INSERT INTO wmbs_sub_types (name) VALUES ('Processing')"));
}
