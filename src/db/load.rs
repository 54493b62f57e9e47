use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::models::ARTICLE_COLUMNS;
use super::{Db, DbError, Result, TableName};

/// `COPY ... FROM STDIN` statement for a headered CSV in column order.
#[must_use]
pub fn copy_csv_sql(table: &TableName) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true)",
        table.qualified(),
        ARTICLE_COLUMNS.join(", ")
    )
}

impl Db {
    pub fn count_rows(&mut self, table: &TableName) -> Result<i64> {
        let row = self
            .client
            .query_one(format!("SELECT count(*) FROM {}", table.qualified()).as_str(), &[])?;
        Ok(row.try_get(0)?)
    }

    pub fn truncate(&mut self, table: &TableName) -> Result<()> {
        self.client
            .batch_execute(&format!("TRUNCATE {}", table.qualified()))?;
        info!("Truncated {table}");
        Ok(())
    }

    /// Fail unless `table` is empty, keeping loads insert-once.
    pub fn ensure_empty(&mut self, table: &TableName) -> Result<()> {
        let rows = self.count_rows(table)?;
        if rows > 0 {
            return Err(DbError::TableNotEmpty {
                table: table.qualified(),
                rows,
            });
        }
        Ok(())
    }

    /// Stream a CSV file into `table` with `COPY FROM STDIN`.
    ///
    /// Returns the number of rows the server reports as copied.
    pub fn copy_csv<P: AsRef<Path>>(&mut self, table: &TableName, csv_path: P) -> Result<u64> {
        let csv_path = csv_path.as_ref();
        let file = File::open(csv_path)?;
        let total = file.metadata()?.len();
        info!("Copying {} into {table}", csv_path.display());

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb.set_message("COPY");

        let mut reader = pb.wrap_read(BufReader::new(file));
        let sql = copy_csv_sql(table);
        let mut writer = self.client.copy_in(sql.as_str())?;
        io::copy(&mut reader, &mut writer)?;
        let rows = writer.finish()?;
        pb.finish_and_clear();

        info!("Copied {rows} rows into {table}");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_csv_sql() {
        let table = TableName::parse("public.articles").unwrap();
        assert_eq!(
            copy_csv_sql(&table),
            "COPY public.articles (id, url, title, content, title_vector, content_vector, vector_id) \
             FROM STDIN WITH (FORMAT csv, HEADER true)"
        );
    }
}
