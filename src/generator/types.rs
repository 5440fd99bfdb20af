//! Common types for text generation

use serde::{Deserialize, Serialize};

/// Sampling knobs passed to the capability on every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: 160,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// One completion returned by the capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub generated_text: String,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// Identifies which model the factory should construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model_id: String,
    pub quantized: bool,
}

impl ModelSpec {
    pub fn new(model_id: impl Into<String>, quantized: bool) -> Self {
        Self {
            model_id: model_id.into(),
            quantized,
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID, true)
    }
}

/// Small instruction-tuned model light enough for local inference
pub const DEFAULT_MODEL_ID: &str = "Xenova/LaMini-Flan-T5-77M";
