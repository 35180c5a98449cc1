//! Database access layer for wmbs-db.
//!
//! Wraps a sqlx `Any` pool so the same statements run against SQLite and
//! PostgreSQL. Statements use `$N` placeholders, which both drivers accept.

mod creator;

pub use creator::{SchemaCreator, SchemaReport, TableDef};

use crate::config::DatabaseConfig;
use crate::error::{Result, WmbsError};
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool, Transaction};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// SQL dialects understood by the schema builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Returns the dialect as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a dialect from a name or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Column definition for a 64-bit auto-incrementing surrogate key.
    pub fn serial_primary_key(&self) -> &'static str {
        match self {
            Self::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::Postgres => "BIGSERIAL PRIMARY KEY",
        }
    }

    /// Whether table constraints can be added after creation with
    /// `ALTER TABLE ... ADD CONSTRAINT`.
    pub fn supports_alter_constraints(&self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pooled connection to the bookkeeping database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Connects to the database described by `config`, retrying transient failures.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let url = config.url()?;
        let dialect = config.dialect()?;
        let display_url = config.display_url();

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match pool_options(config, dialect, url).connect(url).await {
                Ok(pool) => {
                    info!("Connected to {} database at {}", dialect, display_url);
                    return Ok(Self { pool, dialect });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, &display_url),
            None => WmbsError::connection(format!("Could not connect to {display_url}")),
        })
    }

    /// Connects with default pool settings.
    pub async fn connect_url(url: &str) -> Result<Self> {
        Self::connect(&DatabaseConfig::from_url(url)).await
    }

    /// Returns the SQL dialect of the connected database.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Checks out a single connection from the pool.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| WmbsError::connection(format!("Failed to acquire connection: {e}")))
    }

    /// Starts a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>> {
        self.pool
            .begin()
            .await
            .map_err(|e| WmbsError::query(format!("Failed to begin transaction: {e}")))
    }

    /// Creates every object registered in `creator` on a pooled connection.
    pub async fn create_schema(&self, creator: &SchemaCreator) -> Result<SchemaReport> {
        let mut conn = self.acquire().await?;
        creator.execute(&mut conn).await
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn pool_options(config: &DatabaseConfig, dialect: Dialect, url: &str) -> AnyPoolOptions {
    let mut options = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout());

    if dialect == Dialect::Sqlite {
        // Every in-memory connection is its own database.
        if url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        options = options.after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                Ok(())
            })
        });
    }

    options
}

/// Checks if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();
    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, display_url: &str) -> WmbsError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        WmbsError::connection(format!(
            "Cannot connect to {display_url}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        WmbsError::connection(format!(
            "Authentication failed for {display_url}. Check your credentials."
        ))
    } else if error_str.contains("unable to open database file") {
        WmbsError::connection(format!(
            "Cannot open database file for {display_url}. Check the path and add '?mode=rwc' to create it."
        ))
    } else if error_str.contains("timed out") {
        WmbsError::connection(format!("Connection to {display_url} timed out."))
    } else {
        WmbsError::connection(error.to_string())
    }
}

/// Formats a query error, keeping the database message and constraint name.
pub(crate) fn format_query_error(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => {
            let mut result = format!("ERROR: {}", db_error.message());
            if let Some(constraint) = db_error.constraint() {
                result.push_str("\n  CONSTRAINT: ");
                result.push_str(constraint);
            }
            result
        }
        None => error.to_string(),
    }
}

/// Wraps a sqlx error with context as a query error.
pub(crate) fn query_error(context: &str, error: sqlx::Error) -> WmbsError {
    WmbsError::query(format!("{context}: {}", format_query_error(&error)))
}
