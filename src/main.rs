use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wikivec::config::{Config, DEFAULT_CONFIG_PATH, IndexMethod};
use wikivec::dataset;
use wikivec::db::Db;
use wikivec::db::models::VectorColumn;
use wikivec::db::search::SearchHit;
use wikivec::embedder::Embedder;
use wikivec::embedder::mock::MockEmbedder;
use wikivec::embedder::openai::OpenAiEmbedder;
use wikivec::walkthrough::{self, LoadMode, Walkthrough, WalkthroughOptions};

#[derive(Parser, Debug)]
#[command(
    name = "wikivec",
    version,
    about = "Load Wikipedia article embeddings into pgvector and search them"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "WIKIVEC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Embed queries with a deterministic local embedder instead of the API
    #[arg(long, global = true)]
    offline: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and run the canary query
    Ping,
    /// Enable pgvector and create the articles table
    Init {
        /// Drop the table first
        #[arg(long)]
        reset: bool,
    },
    /// Download and extract the dataset
    Fetch {
        /// Validate the CSV after fetching
        #[arg(long)]
        inspect: bool,
    },
    /// Bulk-copy the dataset CSV into the table
    Load {
        /// Empty the table before loading
        #[arg(long)]
        truncate: bool,
        /// Skip CSV validation before the copy
        #[arg(long)]
        skip_inspect: bool,
    },
    /// Build approximate nearest-neighbour indexes
    Index {
        #[arg(long, value_enum)]
        method: Option<IndexMethod>,
        /// Index only this column (default: both)
        #[arg(long, value_enum)]
        column: Option<VectorColumn>,
    },
    /// Embed a query and list the most similar articles
    Search {
        query: String,
        #[arg(long, value_enum, default_value = "content")]
        column: VectorColumn,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show connection, table and index state
    Status,
    /// Run every step in order
    Run {
        /// Query to run once the data is indexed
        #[arg(long)]
        query: Option<String>,
        #[arg(long, value_enum, default_value = "content")]
        column: VectorColumn,
        /// Drop and recreate the table first
        #[arg(long)]
        reset: bool,
        /// Reload even if the table already has rows
        #[arg(long)]
        truncate: bool,
        #[arg(long)]
        skip_inspect: bool,
    },
    /// Print the effective configuration (secrets omitted)
    Config,
}

#[derive(Serialize)]
struct Status {
    canary: String,
    server_version: String,
    table: String,
    table_exists: bool,
    rows: i64,
    indexes: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_embedder(config: &Config, offline: bool) -> Result<Box<dyn Embedder>> {
    if offline {
        info!("Using offline mock embedder ({} dims)", config.dimensions);
        return Ok(Box::new(MockEmbedder::new(config.dimensions)));
    }
    let embedder = OpenAiEmbedder::new(&config.openai, config.dimensions)
        .context("failed to set up embeddings client (set OPENAI_API_KEY or pass --offline)")?;
    Ok(Box::new(embedder))
}

fn print_hits(hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
    } else if hits.is_empty() {
        println!("No matches.");
    } else {
        for hit in hits {
            println!("{hit}");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_process_env();
    config.validate().context("invalid configuration")?;
    let table = config.table_name()?;

    match cli.command {
        Command::Config => {
            print_json(&config)?;
            if !cli.json {
                eprintln!(
                    "database password: {}, OpenAI API key: {}",
                    if config.database.password.is_some() { "set" } else { "unset" },
                    if config.openai.api_key.is_some() { "set" } else { "unset" },
                );
            }
        }
        Command::Fetch { inspect } => {
            let csv = dataset::fetch(&config.dataset)?;
            if inspect {
                let summary =
                    dataset::inspect::inspect_csv(&csv, Some(config.dimensions), None)?;
                if cli.json {
                    print_json(&summary)?;
                } else {
                    println!(
                        "{}: {} rows, {} dimensions",
                        csv.display(),
                        summary.rows,
                        summary.dimensions
                    );
                }
            } else {
                println!("{}", csv.display());
            }
        }
        Command::Ping => {
            let mut db = Db::connect(&config.database)?;
            println!("{}", db.ping()?);
        }
        Command::Init { reset } => {
            let mut db = Db::connect(&config.database)?;
            walkthrough::prepare_schema(&mut db, &table, config.dimensions, reset)?;
            println!("Table {table} ready.");
        }
        Command::Load {
            truncate,
            skip_inspect,
        } => {
            let csv = config.dataset.csv_path();
            anyhow::ensure!(
                csv.exists(),
                "{} not found; run `wikivec fetch` first",
                csv.display()
            );
            if !skip_inspect {
                dataset::inspect::inspect_csv(&csv, Some(config.dimensions), None)
                    .context("dataset failed validation")?;
            }
            let mut db = Db::connect(&config.database)?;
            let mode = if truncate {
                LoadMode::Truncate
            } else {
                LoadMode::FailIfPopulated
            };
            let outcome = walkthrough::load_dataset(&mut db, &table, &csv, mode)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Copied {} rows; {table} now holds {}.",
                    outcome.copied.unwrap_or(0),
                    outcome.total
                );
            }
        }
        Command::Index { method, column } => {
            let mut index = config.index.clone();
            if let Some(method) = method {
                index.method = method;
            }
            let columns = match column {
                Some(c) => vec![c],
                None => VectorColumn::ALL.to_vec(),
            };
            let mut db = Db::connect(&config.database)?;
            for name in walkthrough::build_indexes(&mut db, &table, &columns, &index)? {
                println!("{name}");
            }
        }
        Command::Search {
            query,
            column,
            top_k,
        } => {
            let embedder = build_embedder(&config, cli.offline)?;
            let mut db = Db::connect(&config.database)?;
            let hits = walkthrough::query(
                &mut db,
                embedder.as_ref(),
                &table,
                column,
                &query,
                top_k.unwrap_or(config.search_top_k),
            )?;
            print_hits(&hits, cli.json)?;
        }
        Command::Status => {
            let mut db = Db::connect(&config.database)?;
            let canary = db.ping()?;
            let server_version = db.server_version()?;
            let table_exists = db.table_exists(&table)?;
            let (rows, indexes) = if table_exists {
                (db.count_rows(&table)?, db.list_indexes(&table)?)
            } else {
                (0, Vec::new())
            };
            let status = Status {
                canary,
                server_version,
                table: table.qualified(),
                table_exists,
                rows,
                indexes,
            };
            if cli.json {
                print_json(&status)?;
            } else {
                println!("server:  PostgreSQL {}", status.server_version);
                println!("table:   {} (exists: {})", status.table, status.table_exists);
                println!("rows:    {}", status.rows);
                println!("indexes: {}", status.indexes.join(", "));
            }
        }
        Command::Run {
            query,
            column,
            reset,
            truncate,
            skip_inspect,
        } => {
            let embedder = match query {
                Some(_) => Some(build_embedder(&config, cli.offline)?),
                None => None,
            };
            let mut db = Db::connect(&config.database)?;
            let opts = WalkthroughOptions {
                reset,
                load_mode: if truncate {
                    LoadMode::Truncate
                } else {
                    LoadMode::SkipIfPopulated
                },
                inspect: !skip_inspect,
                query,
                column,
            };
            let report = Walkthrough::new(&config, &mut db, embedder.as_deref()).run(&opts)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{}", report.canary);
                println!(
                    "{table}: {} rows ({} copied), indexes: {}",
                    report.load.total,
                    report.load.copied.unwrap_or(0),
                    report.indexes.join(", ")
                );
                if opts.query.is_some() {
                    print_hits(&report.hits, false)?;
                }
            }
        }
    }

    Ok(())
}
