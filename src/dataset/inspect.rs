use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::{DatasetError, Result};
use crate::db::models::Article;

/// Header row of the published embeddings CSV.
pub const CSV_HEADER: [&str; 7] = [
    "id",
    "url",
    "title",
    "text",
    "title_vector",
    "content_vector",
    "vector_id",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub dimensions: usize,
}

/// Parse a vector literal such as `[0.1, -0.2, 3e-4]`.
pub fn parse_vector(raw: &str) -> std::result::Result<Vec<f32>, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

fn header_matches(header: &csv::StringRecord) -> bool {
    header.len() == CSV_HEADER.len()
        && header.iter().zip(CSV_HEADER).all(|(got, want)| {
            let got = got.trim();
            got == want || (want == "text" && got == "content")
        })
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    line: u64,
) -> Result<T> {
    let raw = record.get(idx).unwrap_or_default();
    raw.trim().parse().map_err(|_| DatasetError::InvalidRecord {
        line,
        reason: format!("{} is not a valid value: {raw:?}", CSV_HEADER[idx]),
    })
}

fn parse_vector_field(record: &csv::StringRecord, idx: usize, line: u64) -> Result<Vec<f32>> {
    let raw = record.get(idx).unwrap_or_default();
    parse_vector(raw).map_err(|e| DatasetError::InvalidRecord {
        line,
        reason: format!("{}: {e}", CSV_HEADER[idx]),
    })
}

/// Decode one CSV record into an [`Article`].
pub fn parse_record(record: &csv::StringRecord, line: u64) -> Result<Article> {
    if record.len() != CSV_HEADER.len() {
        return Err(DatasetError::InvalidRecord {
            line,
            reason: format!("expected {} fields, found {}", CSV_HEADER.len(), record.len()),
        });
    }
    Ok(Article {
        id: parse_field(record, 0, line)?,
        url: record[1].to_string(),
        title: record[2].to_string(),
        content: record[3].to_string(),
        title_vector: parse_vector_field(record, 4, line)?,
        content_vector: parse_vector_field(record, 5, line)?,
        vector_id: parse_field(record, 6, line)?,
    })
}

/// Validate the dataset CSV before it is copied into the database.
///
/// Checks the header, that every record decodes, and that both vectors of
/// every record have the same width. When `expected_dims` is given that
/// width must match it. `limit` caps the number of records examined.
pub fn inspect_csv(
    path: &Path,
    expected_dims: Option<usize>,
    limit: Option<usize>,
) -> Result<DatasetSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if !header_matches(&header) {
        return Err(DatasetError::UnexpectedHeader(
            header.iter().collect::<Vec<_>>().join(","),
        ));
    }

    let mut dims = expected_dims;
    let mut rows = 0usize;
    for result in reader.records() {
        if limit.is_some_and(|l| rows >= l) {
            break;
        }
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let article = parse_record(&record, line)?;

        for len in [article.title_vector.len(), article.content_vector.len()] {
            match dims {
                Some(d) if d != len => {
                    return Err(DatasetError::DimensionMismatch {
                        line,
                        expected: d,
                        actual: len,
                    });
                }
                Some(_) => {}
                None => dims = Some(len),
            }
        }
        rows += 1;
    }

    let dimensions = dims.unwrap_or(0);
    info!(
        "Dataset {} looks good: {rows} rows, {dimensions} dimensions",
        path.display()
    );
    Ok(DatasetSummary { rows, dimensions })
}
