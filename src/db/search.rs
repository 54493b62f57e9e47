use std::fmt;

use pgvector::Vector;
use serde::Serialize;
use tracing::debug;

use super::models::VectorColumn;
use super::{Db, DbError, Result, TableName};

/// One ranked row of a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub id: i32,
    pub url: Option<String>,
    pub title: Option<String>,
    /// `1 - cosine distance`.
    pub similarity: f64,
}

impl fmt::Display for SearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} (Score: {:.3})",
            self.rank,
            self.title.as_deref().unwrap_or("<untitled>"),
            self.similarity
        )
    }
}

/// Similarity query ranking `column` by cosine distance to `$1`, limited by `$2`.
#[must_use]
pub fn search_sql(table: &TableName, column: VectorColumn) -> String {
    let col = column.column_name();
    format!(
        "SELECT id, url, title, 1 - ({col} <=> $1) AS similarity
         FROM {}
         ORDER BY {col} <=> $1
         LIMIT $2",
        table.qualified()
    )
}

fn check_dimensions(column: VectorColumn, expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(DbError::DimensionMismatch {
            column: column.column_name().to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

impl Db {
    /// Return the `top_k` rows nearest to `query_vector` by cosine distance.
    pub fn search(
        &mut self,
        table: &TableName,
        column: VectorColumn,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let dims = self.column_dimensions(table, column)?;
        check_dimensions(column, dims, query_vector.len())?;

        let embedding = Vector::from(query_vector.to_vec());
        let limit = i64::try_from(top_k).unwrap_or(i64::MAX);
        debug!("Searching {table}.{column} (top_k={top_k})");

        let rows = self
            .client
            .query(search_sql(table, column).as_str(), &[&embedding, &limit])?;

        let mut hits = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            hits.push(SearchHit {
                rank: i + 1,
                id: row.try_get(0)?,
                url: row.try_get(1)?,
                title: row.try_get(2)?,
                similarity: row.try_get(3)?,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_sql_uses_cosine_operator() {
        let table = TableName::parse("articles").unwrap();
        let sql = search_sql(&table, VectorColumn::Title);
        assert!(sql.contains("1 - (title_vector <=> $1) AS similarity"));
        assert!(sql.contains("FROM public.articles"));
        assert!(sql.contains("ORDER BY title_vector <=> $1"));
        assert!(sql.trim_end().ends_with("LIMIT $2"));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(VectorColumn::Content, Some(3), 3).is_ok());
        assert!(check_dimensions(VectorColumn::Content, None, 3).is_ok());
        let err = check_dimensions(VectorColumn::Content, Some(1536), 3).unwrap_err();
        assert!(matches!(
            err,
            DbError::DimensionMismatch {
                expected: 1536,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_hit_display() {
        let hit = SearchHit {
            rank: 1,
            id: 42,
            url: Some("https://simple.wikipedia.org/wiki/Olympic_Games".to_string()),
            title: Some("Olympic Games".to_string()),
            similarity: 0.876_54,
        };
        assert_eq!(hit.to_string(), "1. Olympic Games (Score: 0.877)");

        let untitled = SearchHit {
            title: None,
            ..hit
        };
        assert_eq!(untitled.to_string(), "1. <untitled> (Score: 0.877)");
    }
}
