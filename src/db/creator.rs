//! Generic creation of schema objects.
//!
//! A [`SchemaCreator`] collects CREATE TABLE, constraint, index and seed
//! insert statements under string keys and applies them in a fixed order.
//! Table creation is strict; everything after it is best effort.

use super::{format_query_error, Dialect};
use crate::error::{Result, WmbsError};
use serde::Serialize;
use sqlx::AnyConnection;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Definition of a table: columns plus named table constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<String>,
    constraints: Vec<(String, String)>,
}

impl TableDef {
    /// Starts a table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a column definition, e.g. `"lfn VARCHAR(500) NOT NULL"`.
    pub fn column(mut self, definition: impl Into<String>) -> Self {
        self.columns.push(definition.into());
        self
    }

    /// Adds a named table constraint, e.g. `("wmbs_fl_unique", "UNIQUE (file, location)")`.
    pub fn constraint(mut self, name: impl Into<String>, clause: impl Into<String>) -> Self {
        self.constraints.push((name.into(), clause.into()));
        self
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn create_sql(&self, inline_constraints: bool) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(|c| format!("    {c}")).collect();
        if inline_constraints {
            lines.extend(
                self.constraints
                    .iter()
                    .map(|(name, clause)| format!("    CONSTRAINT {name} {clause}")),
            );
        }
        format!("CREATE TABLE {} (\n{}\n)", self.name, lines.join(",\n"))
    }

    fn alter_sql(&self) -> impl Iterator<Item = (&str, String)> {
        self.constraints.iter().map(move |(name, clause)| {
            (
                name.as_str(),
                format!("ALTER TABLE {} ADD CONSTRAINT {name} {clause}", self.name),
            )
        })
    }
}

/// Outcome of applying a [`SchemaCreator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// Number of statements that succeeded.
    pub applied: usize,

    /// Keys of best-effort statements that failed and were skipped.
    pub skipped: Vec<String>,
}

/// Collection of schema statements, applied in key order within each phase.
#[derive(Debug, Clone)]
pub struct SchemaCreator {
    dialect: Dialect,
    create: BTreeMap<String, String>,
    constraints: BTreeMap<String, String>,
    indexes: BTreeMap<String, String>,
    inserts: BTreeMap<String, String>,
}

impl SchemaCreator {
    /// Creates an empty creator for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            create: BTreeMap::new(),
            constraints: BTreeMap::new(),
            indexes: BTreeMap::new(),
            inserts: BTreeMap::new(),
        }
    }

    /// Returns the dialect the statements are rendered for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Registers a table under `key`.
    ///
    /// Dialects that support it get the table constraints as separate
    /// `ALTER TABLE` statements keyed `"<key>_<constraint>"`; SQLite gets them
    /// inline in the CREATE.
    pub fn add_table(&mut self, key: impl Into<String>, table: TableDef) -> &mut Self {
        let key = key.into();
        let alter = self.dialect.supports_alter_constraints();

        self.create.insert(key.clone(), table.create_sql(!alter));
        if alter {
            for (name, sql) in table.alter_sql() {
                self.constraints.insert(format!("{key}_{name}"), sql);
            }
        }
        self
    }

    /// Registers a raw CREATE statement.
    pub fn add_create(&mut self, key: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.create.insert(key.into(), sql.into());
        self
    }

    /// Registers a raw constraint statement.
    pub fn add_constraint(&mut self, key: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.constraints.insert(key.into(), sql.into());
        self
    }

    /// Registers an index on `table(columns)`.
    pub fn add_index(
        &mut self,
        key: impl Into<String>,
        name: &str,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> &mut Self {
        let unique = if unique { "UNIQUE " } else { "" };
        let sql = format!(
            "CREATE {unique}INDEX {name} ON {table} ({})",
            columns.join(", ")
        );
        self.indexes.insert(key.into(), sql);
        self
    }

    /// Registers a seed insert.
    pub fn add_insert(&mut self, key: impl Into<String>, sql: impl Into<String>) -> &mut Self {
        self.inserts.insert(key.into(), sql.into());
        self
    }

    /// Returns the CREATE statements in execution order.
    pub fn create_statements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.create.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the total number of registered statements.
    pub fn len(&self) -> usize {
        self.create.len() + self.constraints.len() + self.indexes.len() + self.inserts.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every statement on `conn`.
    ///
    /// Tables are created first, in key order, and any failure aborts with
    /// the offending statement in the error. Constraints, indexes and inserts
    /// follow; their failures are logged and listed in the report.
    pub async fn execute(&self, conn: &mut AnyConnection) -> Result<SchemaReport> {
        let mut report = SchemaReport::default();

        for (key, sql) in &self.create {
            debug!("Creating {}", key);
            sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
                WmbsError::schema(format!(
                    "Failed to create '{key}':\n\n{}\n\n{}",
                    sql.trim(),
                    format_query_error(&e)
                ))
            })?;
            report.applied += 1;
        }

        for (phase, statements) in [
            ("constraint", &self.constraints),
            ("index", &self.indexes),
            ("insert", &self.inserts),
        ] {
            for (key, sql) in statements {
                debug!("Applying {} {}", phase, key);
                match sqlx::query(sql).execute(&mut *conn).await {
                    Ok(_) => report.applied += 1,
                    Err(e) => {
                        warn!("Skipping {} '{}': {}", phase, key, format_query_error(&e));
                        report.skipped.push(key.clone());
                    }
                }
            }
        }

        info!(
            "Schema applied: {} statements, {} skipped",
            report.applied,
            report.skipped.len()
        );
        Ok(report)
    }
}

impl fmt::Display for SchemaCreator {
    /// Every statement, left-trimmed, one per line: creates, constraints,
    /// inserts, then indexes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statements in [&self.create, &self.constraints, &self.inserts, &self.indexes] {
            for sql in statements.values() {
                writeln!(f, "{}", sql.trim_start())?;
            }
        }
        Ok(())
    }
}
