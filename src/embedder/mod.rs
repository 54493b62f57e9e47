/// Embedder trait and shared types for text embedding.
pub mod mock;
pub mod openai;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embeddings API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid embeddings response: {0}")]
    InvalidResponse(String),

    #[error("embedder misconfigured: {0}")]
    Config(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow use behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut batch = self.embed_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("empty batch result".to_string()))
    }

    /// Embed multiple text strings into vectors, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
