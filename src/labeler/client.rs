use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;

use super::types::{SummarizeRequest, SummarizeResponse};
use super::ClusterLabeler;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Labeler returned an empty label")]
    EmptyLabel,
}

const SYSTEM_PROMPT: &str = "You only output the requested label, nothing else.";

const INSTRUCTIONS: &str = "The lines below are sample service requests drawn from one \
topic cluster. Write one sentence naming the shared subject: the concrete entity or \
action and the circumstances that set this cluster apart. Avoid generic words such as \
\"question\" or \"inquiry\". Output the sentence only.";

/// Client for a `/summarize` endpoint that names clusters from samples.
pub struct LabelerClient {
    http: Client,
    endpoint: String,
}

impl LabelerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(180)) // 3 min for LLM generation
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Summarize with optional instructions and system prompt override
    pub fn summarize_with_system(
        &self,
        text: String,
        instructions: Option<String>,
        system_prompt: Option<String>,
    ) -> Result<String, LabelError> {
        let req = SummarizeRequest {
            text,
            instructions,
            system_prompt,
        };

        let response = self
            .http
            .post(format!("{}/summarize", self.endpoint))
            .json(&req)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LabelError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let res: SummarizeResponse = response.json()?;
        Ok(res.summary)
    }
}

impl ClusterLabeler for LabelerClient {
    fn label(&self, samples: &[String]) -> Result<String, LabelError> {
        let label = self.summarize_with_system(
            sample_context(samples),
            Some(INSTRUCTIONS.to_string()),
            Some(SYSTEM_PROMPT.to_string()),
        )?;
        let label = label.trim();
        if label.is_empty() {
            return Err(LabelError::EmptyLabel);
        }
        Ok(label.to_string())
    }
}

/// One `- sample` line per text.
pub(crate) fn sample_context(samples: &[String]) -> String {
    samples
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}
