//! Text-generation service used as the characters' decision engine
//!
//! Talks to a KoboldAI-compatible `/api/v1/generate` endpoint. Generation is
//! infallible from the caller's point of view: timeouts, transport errors,
//! non-success statuses and unparseable bodies all come back as an empty
//! string, and callers fall back on their own.

use crate::config::{GenerationConfig, GenerationParams};
use crate::error::{ChronicleError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub stop_sequences: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, params: &GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stop_sequences: params.stop_sequences.clone(),
        }
    }
}

/// Generation backend trait
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generated text, trimmed; empty on any failure
    async fn generate(&self, request: &GenerationRequest) -> String;
}

/// Kobold API request format
#[derive(Debug, Serialize)]
struct KoboldRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    max_length: usize,
    stop_sequence: &'a [String],
}

/// Kobold API response format
#[derive(Debug, Deserialize)]
struct KoboldResponse {
    results: Vec<KoboldResult>,
}

#[derive(Debug, Deserialize)]
struct KoboldResult {
    text: String,
}

/// HTTP client for a KoboldAI-compatible server
pub struct KoboldService {
    url: String,
    client: reqwest::Client,
}

impl KoboldService {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChronicleError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }

    async fn call_api(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            "Calling generation API (temperature: {}, max_tokens: {})",
            request.temperature, request.max_tokens
        );

        let body = KoboldRequest {
            prompt: &request.prompt,
            temperature: request.temperature,
            max_length: request.max_tokens,
            stop_sequence: &request.stop_sequences,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(ChronicleError::Other(format!(
                "Generation request failed with status {}",
                response.status()
            )));
        }

        let api_response: KoboldResponse = response.json().await?;

        api_response
            .results
            .into_iter()
            .next()
            .map(|r| r.text.trim().to_string())
            .ok_or_else(|| ChronicleError::Other("Empty results from generation API".to_string()))
    }
}

#[async_trait]
impl GenerationService for KoboldService {
    async fn generate(&self, request: &GenerationRequest) -> String {
        match self.call_api(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Generation failed, continuing with empty output: {}", e);
                String::new()
            }
        }
    }
}
