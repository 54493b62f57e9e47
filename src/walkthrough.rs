/// The end-to-end walkthrough and the individual steps it is made of.
///
/// Every step is usable on its own (the CLI exposes one subcommand per step);
/// [`Walkthrough::run`] chains them in order against one connection.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::{Config, IndexConfig};
use crate::dataset::{self, inspect::DatasetSummary};
use crate::db::models::VectorColumn;
use crate::db::search::SearchHit;
use crate::db::{Db, TableName};
use crate::embedder::Embedder;

/// What to do when the target table already holds rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Refuse to load.
    FailIfPopulated,
    /// Leave the existing rows alone and skip the copy.
    SkipIfPopulated,
    /// Empty the table, then copy.
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    /// Rows copied by this call; `None` when the copy was skipped.
    pub copied: Option<u64>,
    pub total: i64,
}

/// Enable pgvector and create the table, dropping it first when `reset`.
pub fn prepare_schema(db: &mut Db, table: &TableName, dims: usize, reset: bool) -> Result<()> {
    db.ensure_extension()
        .context("failed to enable the vector extension")?;
    if reset {
        db.drop_table(table)
            .with_context(|| format!("failed to drop {table}"))?;
    }
    db.create_table(table, dims)
        .with_context(|| format!("failed to create {table}"))?;
    Ok(())
}

/// Copy the dataset CSV into `table`.
pub fn load_dataset(
    db: &mut Db,
    table: &TableName,
    csv_path: &Path,
    mode: LoadMode,
) -> Result<LoadOutcome> {
    let existing = db.count_rows(table)?;
    if existing > 0 {
        match mode {
            LoadMode::SkipIfPopulated => {
                info!("{table} already holds {existing} rows, skipping load");
                return Ok(LoadOutcome {
                    copied: None,
                    total: existing,
                });
            }
            LoadMode::Truncate => db.truncate(table)?,
            LoadMode::FailIfPopulated => {
                db.ensure_empty(table)
                    .context("refusing to load into a populated table (use --truncate)")?;
            }
        }
    }

    let copied = db
        .copy_csv(table, csv_path)
        .with_context(|| format!("failed to copy {} into {table}", csv_path.display()))?;
    let total = db.count_rows(table)?;
    Ok(LoadOutcome {
        copied: Some(copied),
        total,
    })
}

/// Build ANN indexes on the given vector columns.
pub fn build_indexes(
    db: &mut Db,
    table: &TableName,
    columns: &[VectorColumn],
    index: &IndexConfig,
) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|&column| {
            db.create_index(table, column, index)
                .with_context(|| format!("failed to index {table}.{column}"))
        })
        .collect()
}

/// Embed `text` and return the `top_k` nearest articles.
pub fn query(
    db: &mut Db,
    embedder: &dyn Embedder,
    table: &TableName,
    column: VectorColumn,
    text: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "query text must not be empty");

    let vector = embedder
        .embed(text)
        .context("failed to embed query text")?;
    let hits = db
        .search(table, column, &vector, top_k)
        .context("similarity search failed")?;
    info!("Query {text:?} matched {} row(s) on {column}", hits.len());
    Ok(hits)
}

#[derive(Debug, Clone)]
pub struct WalkthroughOptions {
    pub reset: bool,
    pub load_mode: LoadMode,
    pub inspect: bool,
    pub query: Option<String>,
    pub column: VectorColumn,
}

impl Default for WalkthroughOptions {
    fn default() -> Self {
        Self {
            reset: false,
            load_mode: LoadMode::SkipIfPopulated,
            inspect: true,
            query: None,
            column: VectorColumn::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughReport {
    pub canary: String,
    pub dataset: Option<DatasetSummary>,
    pub load: LoadOutcome,
    pub indexes: Vec<String>,
    pub hits: Vec<SearchHit>,
}

/// Runs the whole sequence against one connection.
pub struct Walkthrough<'a> {
    config: &'a Config,
    db: &'a mut Db,
    embedder: Option<&'a dyn Embedder>,
}

impl<'a> Walkthrough<'a> {
    pub fn new(config: &'a Config, db: &'a mut Db, embedder: Option<&'a dyn Embedder>) -> Self {
        Self {
            config,
            db,
            embedder,
        }
    }

    pub fn run(&mut self, opts: &WalkthroughOptions) -> Result<WalkthroughReport> {
        let table = self.config.table_name()?;
        let dims = self.config.dimensions;

        info!("[1/6] Checking connection");
        let canary = self.db.ping().context("canary query failed")?;

        info!("[2/6] Preparing schema");
        prepare_schema(self.db, &table, dims, opts.reset)?;

        info!("[3/6] Fetching dataset");
        let csv_path = dataset::fetch(&self.config.dataset).context("failed to fetch dataset")?;

        info!("[4/6] Loading dataset");
        let dataset = if opts.inspect {
            Some(
                dataset::inspect::inspect_csv(&csv_path, Some(dims), None)
                    .context("dataset failed validation")?,
            )
        } else {
            None
        };
        let load = load_dataset(self.db, &table, &csv_path, opts.load_mode)?;

        info!("[5/6] Building indexes");
        let indexes = build_indexes(self.db, &table, &VectorColumn::ALL, &self.config.index)?;

        let hits = match (&opts.query, self.embedder) {
            (Some(text), Some(embedder)) => {
                info!("[6/6] Running query");
                query(
                    self.db,
                    embedder,
                    &table,
                    opts.column,
                    text,
                    self.config.search_top_k,
                )?
            }
            (Some(_), None) => anyhow::bail!("a query was given but no embedder is configured"),
            (None, _) => {
                info!("[6/6] No query given, done");
                Vec::new()
            }
        };

        Ok(WalkthroughReport {
            canary,
            dataset,
            load,
            indexes,
            hits,
        })
    }
}
