use tracing::info;

use super::models::VectorColumn;
use super::{Db, DbError, Result, TableName};
use crate::config::{IndexConfig, IndexMethod};

pub const CREATE_EXTENSION_SQL: &str = "CREATE EXTENSION IF NOT EXISTS vector";

/// DDL for the articles table with `dims`-wide vector columns.
#[must_use]
pub fn create_table_sql(table: &TableName, dims: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER NOT NULL PRIMARY KEY,
            url TEXT,
            title TEXT,
            content TEXT,
            title_vector VECTOR({dims}),
            content_vector VECTOR({dims}),
            vector_id INTEGER
        )",
        table.qualified()
    )
}

/// DDL for a cosine-distance ANN index over one vector column.
pub fn create_index_sql(
    table: &TableName,
    column: VectorColumn,
    index: &IndexConfig,
) -> Result<String> {
    let method = index.method.as_sql();
    let params = match index.method {
        IndexMethod::Ivfflat => format!("lists = {}", index.lists),
        IndexMethod::Hnsw => format!(
            "m = {}, ef_construction = {}",
            index.m, index.ef_construction
        ),
    };
    Ok(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING {method} ({} vector_cosine_ops) WITH ({params})",
        table.index_name(column.column_name(), method)?,
        table.qualified(),
        column.column_name(),
    ))
}

impl Db {
    /// Enable the pgvector extension.
    pub fn ensure_extension(&mut self) -> Result<()> {
        self.client.batch_execute(CREATE_EXTENSION_SQL)?;
        let row = self.client.query_opt(
            "SELECT extversion FROM pg_extension WHERE extname = 'vector'",
            &[],
        )?;
        if let Some(row) = row {
            let version: String = row.try_get(0)?;
            info!("pgvector version: {version}");
        }
        Ok(())
    }

    /// Create the articles table if missing.
    pub fn create_table(&mut self, table: &TableName, dims: usize) -> Result<()> {
        self.client.batch_execute(&create_table_sql(table, dims))?;
        info!("Table {table} ready (vector({dims}))");
        Ok(())
    }

    pub fn drop_table(&mut self, table: &TableName) -> Result<()> {
        self.client
            .batch_execute(&format!("DROP TABLE IF EXISTS {}", table.qualified()))?;
        info!("Dropped table {table}");
        Ok(())
    }

    /// Build an approximate nearest-neighbour index on `column`.
    ///
    /// ivfflat picks its centroids from the rows present at build time, so
    /// callers should load data first.
    pub fn create_index(
        &mut self,
        table: &TableName,
        column: VectorColumn,
        index: &IndexConfig,
    ) -> Result<String> {
        let name = table.index_name(column.column_name(), index.method.as_sql())?;
        let sql = create_index_sql(table, column, index)?;
        info!("Building {} index {name}", index.method.as_sql());
        self.client.batch_execute(&sql)?;
        Ok(name)
    }

    /// Names of all indexes defined on `table`.
    pub fn list_indexes(&mut self, table: &TableName) -> Result<Vec<String>> {
        let rows = self.client.query(
            "SELECT indexname FROM pg_indexes WHERE schemaname = $1 AND tablename = $2 ORDER BY indexname",
            &[&table.schema(), &table.table()],
        )?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(DbError::from))
            .collect()
    }

    /// Whether `table` exists.
    pub fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        let row = self.client.query_one(
            "SELECT to_regclass($1) IS NOT NULL",
            &[&table.qualified()],
        )?;
        Ok(row.try_get(0)?)
    }

    /// Declared width of a vector column, from its type modifier.
    ///
    /// `None` when the column is missing or declared without a width.
    pub fn column_dimensions(
        &mut self,
        table: &TableName,
        column: VectorColumn,
    ) -> Result<Option<usize>> {
        let row = self.client.query_opt(
            "SELECT atttypmod FROM pg_attribute
             WHERE attrelid = to_regclass($1) AND attname = $2 AND NOT attisdropped",
            &[&table.qualified(), &column.column_name()],
        )?;
        let Some(row) = row else {
            return Ok(None);
        };
        let typmod: i32 = row.try_get(0)?;
        Ok(usize::try_from(typmod).ok().filter(|d| *d > 0))
    }
}
