//! Text generation capability
//!
//! The generator is an opaque external capability: give it a prompt and
//! sampling options, get completions back. `GenerationClient` owns a
//! factory for it and constructs the handle lazily, at most once.

mod error;
mod http;
mod types;

#[allow(unused_imports)] // Kind is matched on in tests
pub use error::{GenerationError, GenerationErrorKind};
pub use http::HttpGeneratorFactory;
pub use types::{Candidate, GenerationOptions, ModelSpec, DEFAULT_MODEL_ID};

use crate::prompt::ASSISTANT_CUE;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Reply used when the capability returns no usable text
pub const EMPTY_OUTPUT_FALLBACK: &str = "I'm here and ready to assist!";

/// Common interface for text generators
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt, returning one or more candidates
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<Candidate>, GenerationError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Asynchronous constructor for a generator
#[async_trait]
pub trait GeneratorFactory: Send + Sync {
    async fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>, GenerationError>;
}

/// Logging wrapper for generators
pub struct LoggingGenerator {
    inner: Arc<dyn TextGenerator>,
    model_id: String,
}

impl LoggingGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl TextGenerator for LoggingGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<Candidate>, GenerationError> {
        let start = Instant::now();
        let result = self.inner.generate(prompt, options).await;
        let duration = start.elapsed();

        match &result {
            Ok(candidates) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    prompt_chars = prompt.len(),
                    candidates = candidates.len(),
                    "Generation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Generation failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Memoized handle to the generation capability.
///
/// `ensure_ready` runs the factory at most once per successful load;
/// concurrent callers wait on the same in-flight construction. A failed
/// load is not cached, so the next call tries again.
pub struct GenerationClient {
    factory: Arc<dyn GeneratorFactory>,
    spec: ModelSpec,
    options: GenerationOptions,
    timeout: Option<Duration>,
    handle: OnceCell<Arc<dyn TextGenerator>>,
}

impl GenerationClient {
    pub fn new(factory: Arc<dyn GeneratorFactory>, spec: ModelSpec) -> Self {
        Self {
            factory,
            spec,
            options: GenerationOptions::default(),
            timeout: None,
            handle: OnceCell::new(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn is_ready(&self) -> bool {
        self.handle.initialized()
    }

    /// Get the generator, constructing it on first use
    pub async fn ensure_ready(&self) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        self.handle
            .get_or_try_init(|| async {
                tracing::info!(
                    model = %self.spec.model_id,
                    quantized = self.spec.quantized,
                    "Loading text generator"
                );
                let start = Instant::now();
                let generator = self.factory.load(&self.spec).await.map_err(|e| {
                    tracing::error!(model = %self.spec.model_id, error = %e, "Failed to load generator");
                    GenerationError::initialization(e.message)
                })?;
                tracing::info!(
                    model = %self.spec.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    "Text generator loaded"
                );
                Ok(Arc::new(LoggingGenerator::new(generator)) as Arc<dyn TextGenerator>)
            })
            .await
            .cloned()
    }

    /// Generate a reply for `prompt`, returning cleaned text
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let generator = self.ensure_ready().await?;
        let call = generator.generate(prompt, &self.options);

        let candidates = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                GenerationError::timeout(format!("No reply within {}s", limit.as_secs()))
            })??,
            None => call.await?,
        };

        Ok(clean_output(
            candidates.first().map(|c| c.generated_text.as_str()),
        ))
    }
}

static ECHOED_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:{}\s*)+", regex::escape(ASSISTANT_CUE)))
        .expect("cue pattern is a valid regex")
});

/// Trim the raw completion and drop any leading `Assistant:` echoes
pub fn clean_output(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return EMPTY_OUTPUT_FALLBACK.to_string();
    };
    let cleaned = ECHOED_CUE.replace(raw.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        EMPTY_OUTPUT_FALLBACK.to_string()
    } else {
        cleaned.to_string()
    }
}
