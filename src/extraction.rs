//! External text-extraction client.
//!
//! Sends a line item's free-text description to an OpenAI-compatible chat
//! endpoint and receives structured sub-fields: an expiration notice, special
//! instructions, and the description with those substrings removed. Failures
//! are typed ([`ExtractionError`]) and never block the import — the caller
//! logs a warning and persists the row unenriched.
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::ExtractionConfig;

/// Why an extraction attempt produced no usable result.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction credential missing: {0} not set")]
    MissingCredential(&'static str),

    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("extraction service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("extraction response was not valid JSON: {0}")]
    MalformedPayload(String),

    #[error("extraction response had an unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Structured sub-fields pulled out of a description.
///
/// `description` is the input text with the extracted substrings removed.
/// Absent fields deserialize as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub expiration_notice: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub description: String,
}

/// Stateless request/response seam to the text-understanding service.
///
/// A trait so the enricher can be exercised in tests with a stub that counts
/// invocations.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, description: &str) -> Result<ExtractedFields, ExtractionError>;
}

/// Extraction client backed by an OpenAI-compatible chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiExtractor {
    model: String,
    api_base: String,
    max_retries: u32,
    timeout_secs: u64,
}

const SYSTEM_PROMPT: &str = "You extract structured sub-fields from auction item \
descriptions. Given a description, pull out any expiration notice (for example \
\"Expires 12/31/2026\") and any special instructions or restrictions, and return \
the description with those substrings removed. Respond with only a JSON object of \
the form {\"expiration_notice\": \"...\", \"notes\": \"...\", \"description\": \"...\"}. \
Use empty strings for fields that are absent.";

impl OpenAiExtractor {
    /// Create an extractor from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no model is configured or `OPENAI_API_KEY` is not
    /// in the environment. Callers degrade gracefully: a construction failure
    /// disables enrichment for the run, it does not abort the import.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let model = config.model.clone().ok_or_else(|| {
            ExtractionError::UnexpectedShape("extraction.model not configured".to_string())
        })?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(ExtractionError::MissingCredential("OPENAI_API_KEY"));
        }

        Ok(Self {
            model,
            api_base: config.api_base.clone(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ExtractionClient for OpenAiExtractor {
    async fn extract(&self, description: &str) -> Result<ExtractedFields, ExtractionError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ExtractionError::MissingCredential("OPENAI_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": description },
            ],
        });

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let mut last_err: Option<ExtractionError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ExtractionError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ExtractionError::UnexpectedShape("extraction failed after retries".to_string())
        }))
    }
}

/// Pull the assistant message out of a chat completions response and decode
/// the extraction fields from it.
fn parse_chat_response(json: &serde_json::Value) -> Result<ExtractedFields, ExtractionError> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            ExtractionError::UnexpectedShape("missing choices[0].message.content".to_string())
        })?;

    let value = json_in_prose(content)?;
    serde_json::from_value(value)
        .map_err(|e| ExtractionError::UnexpectedShape(e.to_string()))
}

/// Recover a JSON object from model output that may wrap it in surrounding
/// prose or code-fence markers.
///
/// Tries, in order: the trimmed text as-is, the body of the first code fence,
/// and the outermost `{...}` span. The documented fallback is failure — a
/// payload with no parseable object is a [`ExtractionError::MalformedPayload`].
pub fn json_in_prose(text: &str) -> Result<serde_json::Value, ExtractionError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Code fence: take the body between the first pair of ``` markers,
    // dropping an optional language tag on the opening line.
    if let Some(open) = trimmed.find("```") {
        let after = &trimmed[open + 3..];
        if let Some(close) = after.find("```") {
            let mut body = &after[..close];
            if let Some(newline) = body.find('\n') {
                let tag = &body[..newline];
                if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                    body = &body[newline + 1..];
                }
            }
            if let Ok(value) = serde_json::from_str(body.trim()) {
                return Ok(value);
            }
        }
    }

    // Outermost object span.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(ExtractionError::MalformedPayload(
        trimmed.chars().take(120).collect(),
    ))
}
