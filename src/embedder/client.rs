// client.rs - the HTTP embedder
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{EmbeddingModelInfo, EmbeddingProvider};
use crate::embedder::types::*;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Expected {expected} embeddings, received {received}")]
    CountMismatch { expected: usize, received: usize },

    #[error("Embedding width changed from {expected} to {received}")]
    WidthMismatch { expected: usize, received: usize },
}

pub struct EmbeddingClient {
    http: Client,
    endpoint: String,
    info: EmbeddingModelInfo,
}

impl EmbeddingClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(300))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            endpoint: endpoint.into(),
            info: EmbeddingModelInfo::default(),
        }
    }

    pub fn with_model(mut self, info: EmbeddingModelInfo) -> Self {
        self.info = info;
        self
    }

    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), endpoint = %self.endpoint, "requesting embeddings");
        let response = self
            .http
            .post(format!("{}/embed", self.endpoint))
            .json(&EmbeddingRequest { texts })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmbedError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let res: EmbeddingResponse = response.json()?;
        check_shape(texts.len(), &res.embeddings)?;
        Ok(res.embeddings)
    }
}

impl EmbeddingProvider for EmbeddingClient {
    fn model_info(&self) -> &EmbeddingModelInfo {
        &self.info
    }

    fn encode(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.embed(batch)
    }
}

/// One row per input, all rows the same width.
pub(crate) fn check_shape(expected: usize, rows: &[Vec<f32>]) -> Result<(), EmbedError> {
    if rows.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            received: rows.len(),
        });
    }
    if let Some(first) = rows.first() {
        if let Some(bad) = rows.iter().find(|r| r.len() != first.len()) {
            return Err(EmbedError::WidthMismatch {
                expected: first.len(),
                received: bad.len(),
            });
        }
    }
    Ok(())
}
