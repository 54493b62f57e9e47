//! Embeddings client for OpenAI-compatible `/embeddings` endpoints.

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Embedder, EmbedderError};
use crate::config::OpenAiConfig;

/// Blocking embeddings client.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    /// Retries after the first attempt.
    max_retries: usize,
}

impl OpenAiEmbedder {
    /// Build a client from config. `dimensions` is the width every returned
    /// vector must have.
    pub fn new(cfg: &OpenAiConfig, dimensions: usize) -> Result<Self, EmbedderError> {
        let api_key = cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EmbedderError::Config("missing OpenAI API key".to_string()))?;
        if cfg.model.trim().is_empty() {
            return Err(EmbedderError::Config("missing model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| EmbedderError::Config("API key is not a valid header".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: embeddings_endpoint(&cfg.base_url),
            model: cfg.model.clone(),
            dimensions,
            max_retries: cfg.max_retries,
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    fn send(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = resp.json()?;
                        return into_vectors(parsed, inputs.len(), self.dimensions);
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if Self::should_retry(status) && attempt < self.max_retries {
                        attempt += 1;
                        warn!("Embeddings API returned {status}, retry {attempt}");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbedderError::Api {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if Self::is_retryable_error(&err) && attempt < self.max_retries {
                        attempt += 1;
                        warn!("Embeddings request failed ({err}), retry {attempt}");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} text(s) with {}", texts.len(), self.model);
        self.send(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    format!("{}/embeddings", base_url.trim_end_matches('/'))
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

/// Order entries by `index` and check count and width.
fn into_vectors(
    mut parsed: EmbeddingResponse,
    expected_len: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    parsed.data.sort_by_key(|entry| entry.index);
    if parsed.data.len() != expected_len {
        return Err(EmbedderError::InvalidResponse(format!(
            "got {} embeddings for {} inputs",
            parsed.data.len(),
            expected_len
        )));
    }
    if let Some(bad) = parsed.data.iter().find(|e| e.embedding.len() != dimensions) {
        return Err(EmbedderError::InvalidResponse(format!(
            "embedding {} has {} dimensions, expected {dimensions}",
            bad.index,
            bad.embedding.len()
        )));
    }
    Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
