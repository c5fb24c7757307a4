//! mysql-table-sync CLI - table transfers between MySQL databases.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mysql_table_sync::{
    Config, JobStatus, MysqlConnectionProvider, TransferEngine, TransferError,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mysql-table-sync")]
#[command(about = "Copy tables between MySQL databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer a table from one database to another
    Transfer {
        /// Source database name
        source: String,

        /// Target database name
        target: String,

        /// Table to transfer
        table: String,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Transfer every table from one database to another
    TransferAll {
        /// Source database name
        source: String,

        /// Target database name
        target: String,

        /// Comma-separated table list (default: all tables in the source)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List user databases on the server
    ListDatabases,

    /// List tables in a database with approximate row counts
    ListTables {
        /// Database name
        database: String,
    },

    /// Test the server connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, TransferError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let provider = MysqlConnectionProvider::new(
        config.server.clone(),
        config.transfer.max_connections,
    );

    match cli.command {
        Commands::Transfer {
            source,
            target,
            table,
            batch_size,
        } => {
            let engine =
                TransferEngine::new(Arc::new(provider), config.transfer.batch_size);
            let id = engine.start_transfer(&source, &target, &table, batch_size)?;

            // Foreground mode: block until the spawned job settles
            let state = engine.wait_for(id).await?;

            if cli.output_json {
                println!("{}", state.to_json()?);
            } else {
                println!("\nTransfer {}", match state.status {
                    JobStatus::Completed => "completed!",
                    _ => "failed.",
                });
                println!("  Job ID: {}", state.job.id);
                println!(
                    "  Table: {}.{} -> {}.{}",
                    state.job.source_database,
                    state.job.table,
                    state.job.target_database,
                    state.job.table
                );
                match state.total_rows {
                    Some(total) => println!("  Rows: {}/{}", state.rows_processed, total),
                    None => println!("  Rows: {}", state.rows_processed),
                }
                if let Some(secs) = state.elapsed_seconds() {
                    println!("  Duration: {:.2}s", secs);
                }
                if let Some(ref err) = state.last_error {
                    println!("  Error: {}", err);
                }
            }

            if state.status == JobStatus::Failed {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::TransferAll {
            source,
            target,
            tables,
            batch_size,
        } => {
            // Discover the table list before the provider moves into the engine
            let table_list = match tables {
                Some(list) => list,
                None => provider
                    .list_tables(&source)
                    .await?
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
            };

            let engine =
                TransferEngine::new(Arc::new(provider), config.transfer.batch_size);
            let summary = engine
                .transfer_all(&source, &target, &table_list, batch_size)
                .await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                println!("\nBulk transfer {} -> {}", source, target);
                for state in &summary.results {
                    let mark = if state.status == JobStatus::Completed {
                        "✓"
                    } else {
                        "✗"
                    };
                    println!("  {} {} ({} rows)", mark, state.job.table, state.rows_processed);
                    if let Some(ref err) = state.last_error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Tables: {}/{}",
                    summary.tables_succeeded, summary.tables_total
                );
                println!("  Rows: {}", summary.rows_transferred);
            }

            if !summary.all_succeeded() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::ListDatabases => {
            let databases = provider.list_databases().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                println!("Databases ({}):", databases.len());
                for db in &databases {
                    println!("  {}", db);
                }
            }
        }

        Commands::ListTables { database } => {
            let tables = provider.list_tables(&database).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                println!("Tables in '{}' ({}):", database, tables.len());
                for (name, rows) in &tables {
                    println!("  {} (~{} rows)", name, rows);
                }
            }
        }

        Commands::HealthCheck => {
            provider.ping().await?;
            println!(
                "Server {}:{} is reachable",
                config.server.host, config.server.port
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
