use std::fmt;
use std::str::FromStr;

/// Columns of the articles table, in CSV/COPY order.
pub const ARTICLE_COLUMNS: [&str; 7] = [
    "id",
    "url",
    "title",
    "content",
    "title_vector",
    "content_vector",
    "vector_id",
];

/// One row of the articles dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i32,
    pub url: String,
    pub title: String,
    pub content: String,
    pub title_vector: Vec<f32>,
    pub content_vector: Vec<f32>,
    pub vector_id: i32,
}

/// Which embedding column a similarity query ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum VectorColumn {
    Title,
    #[default]
    Content,
}

impl VectorColumn {
    pub const ALL: [VectorColumn; 2] = [VectorColumn::Title, VectorColumn::Content];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::Title => "title_vector",
            Self::Content => "content_vector",
        }
    }
}

impl fmt::Display for VectorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for VectorColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" | "title_vector" => Ok(Self::Title),
            "content" | "content_vector" => Ok(Self::Content),
            other => Err(format!("unknown vector column: {other}")),
        }
    }
}
