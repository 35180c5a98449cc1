//! PostgreSQL integration tests.
//!
//! Each test works in a throwaway schema so it can run against a shared
//! database. Skipped unless DATABASE_URL points at PostgreSQL.

use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection};
use wmbs_db::config::DatabaseConfig;
use wmbs_db::db::{Database, Dialect};
use wmbs_db::wmbs::subscriptions::{self, NewSubscription};
use wmbs_db::wmbs::{self, available_files, files, filesets, locations, workflows, NewFile};

/// Helper to get a PostgreSQL test database from the environment.
async fn get_test_db() -> Option<Database> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig::from_url(url);
    if config.dialect().ok()? != Dialect::Postgres {
        return None;
    }
    Database::connect(&config).await.ok()
}

/// Creates a uniquely named schema and points the connection at it.
async fn scratch_schema(conn: &mut AnyConnection, tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let schema = format!("wmbs_test_{tag}_{}_{nanos}", std::process::id());
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&mut *conn)
        .await
        .unwrap();
    sqlx::query(&format!("SET search_path TO {schema}"))
        .execute(&mut *conn)
        .await
        .unwrap();
    schema
}

async fn drop_schema(mut conn: PoolConnection<Any>, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&mut *conn)
        .await
        .unwrap();
    sqlx::query("SET search_path TO DEFAULT")
        .execute(&mut *conn)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_postgres_schema_and_availability() {
    let Some(db) = get_test_db().await else {
        eprintln!("Skipping test: DATABASE_URL not set to a postgres URL");
        return;
    };

    let mut conn = db.acquire().await.unwrap();
    let schema = scratch_schema(&mut conn, "avail").await;

    let report = wmbs::wmbs_schema(Dialect::Postgres)
        .execute(&mut conn)
        .await
        .unwrap();
    assert!(report.skipped.is_empty(), "skipped: {:?}", report.skipped);

    let fileset = filesets::insert(&mut *conn, "fs").await.unwrap();
    let workflow = workflows::insert(&mut *conn, "s", "w", "o").await.unwrap();
    let sub = subscriptions::insert(&mut *conn, &NewSubscription::new(fileset, workflow, "Processing"))
        .await
        .unwrap();

    let a = files::insert(&mut *conn, &NewFile::new("/a")).await.unwrap();
    let b = files::insert(&mut *conn, &NewFile::new("/b")).await.unwrap();
    let cern = locations::insert(&mut *conn, "se.cern.ch").await.unwrap();
    let fnal = locations::insert(&mut *conn, "se.fnal.gov").await.unwrap();
    files::add_location(&mut *conn, a, cern).await.unwrap();
    files::add_location(&mut *conn, a, fnal).await.unwrap();
    files::add_location(&mut *conn, b, fnal).await.unwrap();
    filesets::add_files(&mut conn, fileset, &[a, b]).await.unwrap();

    let available = available_files(&mut conn, sub).await.unwrap();
    assert_eq!(available.len(), 2);
    assert_eq!(available[0].locations, vec!["se.cern.ch", "se.fnal.gov"]);

    subscriptions::add_white_list(&mut conn, sub, &["se.cern.ch"])
        .await
        .unwrap();
    let available = available_files(&mut conn, sub).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].file, a);
    assert_eq!(available[0].locations, vec!["se.cern.ch"]);

    subscriptions::clear_site_list(&mut *conn, sub).await.unwrap();
    subscriptions::add_black_list(&mut conn, sub, &["se.cern.ch"])
        .await
        .unwrap();
    subscriptions::mark_acquired(&mut conn, sub, &[b]).await.unwrap();
    let available = available_files(&mut conn, sub).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].locations, vec!["se.fnal.gov"]);

    drop_schema(conn, &schema).await;
    db.close().await;
}
