//! Acquisition and validation of the embedded-articles dataset.
pub mod archive;
pub mod download;
pub mod inspect;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::DatasetConfig;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("HTTP request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bad status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected CSV header: {0}")]
    UnexpectedHeader(String),

    #[error("line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("line {line}: vector has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        line: u64,
        expected: usize,
        actual: usize,
    },

    #[error("{csv} not found in archive {archive}")]
    MissingCsv { csv: String, archive: PathBuf },
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Make sure the dataset CSV exists locally, downloading and extracting the
/// archive when needed. Each step is skipped when its output is present.
pub fn fetch(cfg: &DatasetConfig) -> Result<PathBuf> {
    let csv_path = cfg.csv_path();
    if csv_path.exists() {
        info!("Dataset already present at {}", csv_path.display());
        return Ok(csv_path);
    }

    let archive = cfg.archive_path();
    if archive.exists() {
        info!("Archive already present at {}", archive.display());
    } else {
        download::download_file(&cfg.url, &archive)?;
    }

    let extracted = archive::extract_archive(&archive, Path::new(&cfg.data_dir))?;
    if !extracted.iter().any(|p| p == &csv_path) && !csv_path.exists() {
        return Err(DatasetError::MissingCsv {
            csv: cfg.csv_name.clone(),
            archive,
        });
    }
    Ok(csv_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn dataset_in(dir: &Path) -> DatasetConfig {
        DatasetConfig {
            // Never contacted: every test pre-seeds the archive or CSV
            url: "http://127.0.0.1:9/unused.zip".to_string(),
            data_dir: dir.to_string_lossy().to_string(),
            archive_name: "articles.zip".to_string(),
            csv_name: "articles.csv".to_string(),
        }
    }

    fn seed_archive(path: &Path, member: &str) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(member, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"id\n1\n").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_fetch_uses_existing_csv() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dataset_in(dir.path());
        fs::write(cfg.csv_path(), "id\n").unwrap();
        assert_eq!(fetch(&cfg).unwrap(), cfg.csv_path());
    }

    #[test]
    fn test_fetch_extracts_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dataset_in(dir.path());
        seed_archive(&cfg.archive_path(), "articles.csv");

        let csv = fetch(&cfg).unwrap();
        assert_eq!(fs::read_to_string(csv).unwrap(), "id\n1\n");
    }

    #[test]
    fn test_fetch_ignores_interrupted_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dataset_in(dir.path());
        seed_archive(&cfg.archive_path(), "articles.csv");
        // Leftover from an extraction cut short at a record boundary
        let leftover = download::partial_path(&cfg.csv_path());
        fs::write(&leftover, "id\n").unwrap();

        let csv = fetch(&cfg).unwrap();
        assert_eq!(fs::read_to_string(csv).unwrap(), "id\n1\n");
        assert!(!leftover.exists());
    }

    #[test]
    fn test_fetch_archive_without_csv() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dataset_in(dir.path());
        seed_archive(&cfg.archive_path(), "something_else.csv");

        assert!(matches!(fetch(&cfg), Err(DatasetError::MissingCsv { .. })));
    }
}
