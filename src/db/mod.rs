//! Vector database module using PostgreSQL and pgvector
use std::sync::LazyLock;

use native_tls::TlsConnector;
use postgres::Client;
use postgres_native_tls::MakeTlsConnector;
use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, SslMode};

pub mod load;
pub mod models;
pub mod schema;
pub mod search;

/// Smoke query issued right after connecting.
pub const CANARY_SQL: &str = "SELECT 'Connection successful!'::text";
/// The exact value [`CANARY_SQL`] must return.
pub const CANARY_RESPONSE: &str = "Connection successful!";

const DEFAULT_SCHEMA: &str = "public";

/// Postgres truncates identifiers longer than this (`NAMEDATALEN - 1`).
pub const MAX_IDENT_LEN: usize = 63;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Errors raised by database operations.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("identifier {0:?} is longer than 63 bytes")]
    IdentifierTooLong(String),

    #[error("canary query returned {0:?}")]
    CanaryMismatch(String),

    #[error("query vector has {actual} dimensions but {column} expects {expected}")]
    DimensionMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("table {table} already holds {rows} rows")]
    TableNotEmpty { table: String, rows: i64 },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// A validated `schema.table` pair that is safe to splice into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();
        for ident in [&schema, &table] {
            if !IDENT_RE.is_match(ident) {
                return Err(DbError::InvalidIdentifier(ident.clone()));
            }
            if ident.len() > MAX_IDENT_LEN {
                return Err(DbError::IdentifierTooLong(ident.clone()));
            }
        }
        Ok(Self { schema, table })
    }

    /// Parse `table` or `schema.table`; a bare name lands in `public`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().split_once('.') {
            Some((schema, table)) => Self::new(schema, table),
            None => Self::new(DEFAULT_SCHEMA, raw.trim()),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Deterministic name for an index over `column` built with `method`.
    /// Fails rather than let Postgres silently truncate it into a clash.
    pub fn index_name(&self, column: &str, method: &str) -> Result<String> {
        let name = format!("{}_{}_{}_idx", self.table, column, method);
        if name.len() > MAX_IDENT_LEN {
            return Err(DbError::IdentifierTooLong(name));
        }
        Ok(name)
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

fn pg_ssl_mode(mode: SslMode) -> postgres::config::SslMode {
    match mode {
        SslMode::Disable => postgres::config::SslMode::Disable,
        SslMode::Prefer => postgres::config::SslMode::Prefer,
        SslMode::Require => postgres::config::SslMode::Require,
    }
}

fn tls_connector() -> Result<MakeTlsConnector> {
    let connector = TlsConnector::builder().build()?;
    Ok(MakeTlsConnector::new(connector))
}

/// A single blocking connection to the vector database.
pub struct Db {
    pub(crate) client: Client,
}

impl Db {
    /// Open a connection from discrete parameters.
    pub fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to postgres at {}:{}/{} as {}",
            cfg.host, cfg.port, cfg.dbname, cfg.user
        );

        let mut pg = postgres::Config::new();
        pg.host(&cfg.host)
            .port(cfg.port)
            .dbname(&cfg.dbname)
            .user(&cfg.user)
            .application_name(env!("CARGO_PKG_NAME"))
            .ssl_mode(pg_ssl_mode(cfg.sslmode));
        if let Some(password) = &cfg.password {
            pg.password(password);
        }

        let client = pg.connect(tls_connector()?)?;
        Ok(Self { client })
    }

    /// Open a connection from a `postgres://` URL or key/value string.
    pub fn connect_url(url: &str) -> Result<Self> {
        let pg: postgres::Config = url.parse()?;
        let client = pg.connect(tls_connector()?)?;
        Ok(Self { client })
    }

    /// Run the canary query and check its literal result.
    pub fn ping(&mut self) -> Result<String> {
        let row = self.client.query_one(CANARY_SQL, &[])?;
        let value: String = row.try_get(0)?;
        if value != CANARY_RESPONSE {
            return Err(DbError::CanaryMismatch(value));
        }
        info!("Canary query returned {value:?}");
        Ok(value)
    }

    /// Server version string, for status output.
    pub fn server_version(&mut self) -> Result<String> {
        let row = self.client.query_one("SHOW server_version", &[])?;
        Ok(row.try_get(0)?)
    }
}
