//! Command-line argument parsing for the `wmbs` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wmbs_db::db::Dialect;
use wmbs_db::wmbs::AvailableFile;

/// Workload bookkeeping database tool.
#[derive(Parser, Debug)]
#[command(name = "wmbs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database URL (e.g. sqlite:///var/lib/wmbs/wmbs.db?mode=rwc or postgres://user@host/wmbs)
    #[arg(long, value_name = "URL", env = "WMBS_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print or create the bookkeeping schema
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// List the files available to a subscription
    Available {
        /// Subscription id
        #[arg(value_name = "SUBSCRIPTION")]
        subscription: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Print the schema statements without touching a database
    Print {
        /// SQL dialect (sqlite or postgres); defaults to the database URL's
        #[arg(long, value_name = "DIALECT", value_parser = parse_dialect)]
        dialect: Option<Dialect>,
    },

    /// Create the schema in the configured database
    Create,
}

fn parse_dialect(s: &str) -> std::result::Result<Dialect, String> {
    Dialect::parse(s).ok_or_else(|| format!("Invalid dialect: {s}. Expected: sqlite or postgres"))
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path, using the default if not specified.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(wmbs_db::config::Config::default_path)
    }
}

/// Renders available files as `<file>\t<loc1>,<loc2>` lines.
pub fn format_available_text(files: &[AvailableFile]) -> String {
    files
        .iter()
        .map(|f| format!("{}\t{}\n", f.file, f.locations.join(",")))
        .collect()
}
