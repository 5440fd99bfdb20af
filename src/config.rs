//! Server configuration from environment variables

use crate::generator::{GenerationOptions, ModelSpec, DEFAULT_MODEL_ID};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_GENERATOR_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// Malformed configuration value
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Configuration for the chat server
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Base URL of the inference server
    pub generator_url: String,
    pub model: ModelSpec,
    pub options: GenerationOptions,
    /// `None` disables the per-turn timeout
    pub generation_timeout: Option<Duration>,
    /// `None` sends the whole history in every prompt
    pub max_history_messages: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            generator_url: DEFAULT_GENERATOR_URL.to_string(),
            model: ModelSpec::default(),
            options: GenerationOptions::default(),
            generation_timeout: Some(Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)),
            max_history_messages: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let defaults_options = defaults.options;

        let timeout_secs: u64 = parse_var(
            &lookup,
            "MYFREE_GENERATION_TIMEOUT_SECS",
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?;

        let max_history_messages = match lookup("MYFREE_MAX_HISTORY_MESSAGES") {
            Some(raw) => Some(parse_value("MYFREE_MAX_HISTORY_MESSAGES", &raw)?),
            None => None,
        };

        let options = GenerationOptions {
            max_new_tokens: parse_var(
                &lookup,
                "MYFREE_MAX_NEW_TOKENS",
                defaults_options.max_new_tokens,
            )?,
            temperature: parse_var(&lookup, "MYFREE_TEMPERATURE", defaults_options.temperature)?,
            top_p: parse_var(&lookup, "MYFREE_TOP_P", defaults_options.top_p)?,
        };
        if !(0.0..=1.0).contains(&options.top_p) {
            return Err(ConfigError {
                var: "MYFREE_TOP_P",
                value: options.top_p.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if !options.temperature.is_finite() || options.temperature < 0.0 {
            return Err(ConfigError {
                var: "MYFREE_TEMPERATURE",
                value: options.temperature.to_string(),
                reason: "must be a finite, non-negative number".to_string(),
            });
        }

        Ok(Self {
            port: parse_var(&lookup, "MYFREE_PORT", defaults.port)?,
            generator_url: lookup("MYFREE_GENERATOR_URL").unwrap_or(defaults.generator_url),
            model: ModelSpec::new(
                lookup("MYFREE_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
                parse_var(&lookup, "MYFREE_QUANTIZED", defaults.model.quantized)?,
            ),
            options,
            generation_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_history_messages: max_history_messages.filter(|n| *n > 0),
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
