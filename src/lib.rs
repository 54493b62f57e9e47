//! # wikivec — Wikipedia embeddings on PostgreSQL + pgvector
//!
//! Walkthrough tool that loads a published dataset of precomputed article
//! embeddings into a pgvector table, indexes it, and answers cosine
//! similarity queries using embeddings from an OpenAI-compatible API.
//!
//! ## Architecture
//!
//! - **[`config`]** — JSON config file plus libpq / OpenAI environment overrides
//! - **[`db`]** — Connection, schema DDL, `COPY` bulk load, similarity search
//! - **[`dataset`]** — Archive download, extraction and CSV validation
//! - **[`embedder`]** — Embedding trait, OpenAI client, offline mock
//! - **[`walkthrough`]** — The step sequence tying everything together

pub mod config;
pub mod dataset;
pub mod db;
pub mod embedder;
pub mod walkthrough;

#[cfg(test)]
pub(crate) mod test_http;
