//! Local inference server backend
//!
//! Talks to a text-generation server speaking the Hugging Face inference
//! JSON shape: `{"inputs", "parameters"}` in, `[{"generated_text"}]` out.

use super::types::{Candidate, GenerationOptions, ModelSpec};
use super::{GenerationError, GeneratorFactory, TextGenerator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Builds `HttpGenerator`s after checking the server is up
pub struct HttpGeneratorFactory {
    base_url: String,
    request_timeout: Duration,
}

impl HttpGeneratorFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl GeneratorFactory for HttpGeneratorFactory {
    async fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| GenerationError::initialization(format!("Failed to create HTTP client: {e}")))?;

        let health_url = format!("{}/health", self.base_url);
        let response = client
            .get(&health_url)
            .send()
            .await
            .map_err(|e| GenerationError::initialization(format!("Inference server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(GenerationError::initialization(format!(
                "Inference server not ready: HTTP {}",
                response.status()
            )));
        }

        tracing::info!(base_url = %self.base_url, model = %spec.model_id, "Inference server ready");

        Ok(Arc::new(HttpGenerator {
            client,
            endpoint: format!("{}/models/{}", self.base_url, spec.model_id),
            model_id: spec.model_id.clone(),
            quantized: spec.quantized,
        }))
    }
}

/// Generator backed by a running inference server
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    model_id: String,
    quantized: bool,
}

impl HttpGenerator {
    fn build_request<'a>(&self, prompt: &'a str, options: &GenerationOptions) -> InferenceRequest<'a> {
        InferenceRequest {
            inputs: prompt,
            parameters: *options,
            options: InferenceOptions {
                quantized: self.quantized,
                wait_for_model: true,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<Candidate>, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.build_request(prompt, options))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::timeout(format!("Request timeout: {e}"))
                } else {
                    GenerationError::generation(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::generation(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        parse_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
    match status.as_u16() {
        // Model still loading on the server side
        503 => GenerationError::initialization(format!("Model unavailable: {body}")),
        400 | 422 => GenerationError::invalid_response(format!("Invalid request: {body}")),
        _ => GenerationError::generation(format!("HTTP {status}: {body}")),
    }
}

fn parse_response(body: &str) -> Result<Vec<Candidate>, GenerationError> {
    let parsed: InferenceResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::invalid_response(format!("Failed to parse response: {e} - body: {body}")))?;

    Ok(match parsed {
        InferenceResponse::Many(candidates) => candidates,
        InferenceResponse::One(candidate) => vec![candidate],
    })
}

// Inference server wire types

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: GenerationOptions,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    quantized: bool,
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Many(Vec<Candidate>),
    One(Candidate),
}
