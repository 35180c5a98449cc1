//! wmbs - workload bookkeeping database tool.

mod cli;

use cli::{Cli, Command, SchemaCommand};
use tracing::{error, info};
use wmbs_db::config::{Config, DatabaseConfig};
use wmbs_db::db::{Database, Dialect};
use wmbs_db::error::{Result, WmbsError};
use wmbs_db::logging;
use wmbs_db::wmbs::{self, available_files};

#[tokio::main]
async fn main() {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    let config = match Config::load_from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    };

    logging::init_stderr_logging(&config.logging.level);
    info!("Loaded config from: {}", config_path.display());

    if let Err(e) = run(cli, config).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let database = config.resolve_database(cli.database_url.as_deref());

    match cli.command {
        Command::Schema(SchemaCommand::Print { dialect }) => {
            let dialect = match dialect {
                Some(dialect) => dialect,
                None => default_dialect(&database)?,
            };
            print!("{}", wmbs::wmbs_schema(dialect));
        }
        Command::Schema(SchemaCommand::Create) => {
            let db = Database::connect(&database).await?;
            let report = db.create_schema(&wmbs::wmbs_schema(db.dialect())).await?;
            println!(
                "Created schema: {} statements applied, {} skipped",
                report.applied,
                report.skipped.len()
            );
            for key in &report.skipped {
                println!("  skipped: {key}");
            }
            db.close().await;
        }
        Command::Available { subscription, json } => {
            let db = Database::connect(&database).await?;
            let mut conn = db.acquire().await?;
            let files = available_files(&mut conn, subscription).await?;
            drop(conn);
            db.close().await;

            if json {
                let rendered = serde_json::to_string_pretty(&files).map_err(|e| {
                    WmbsError::internal(format!("Failed to serialize results: {e}"))
                })?;
                println!("{rendered}");
            } else {
                print!("{}", cli::format_available_text(&files));
            }
        }
    }

    Ok(())
}

/// Uses the configured URL's dialect, or SQLite when no URL is configured.
fn default_dialect(database: &DatabaseConfig) -> Result<Dialect> {
    if database.url.is_some() {
        database.dialect()
    } else {
        Ok(Dialect::Sqlite)
    }
}
