//! Generation error types

use thiserror::Error;

/// Text generation error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn initialization(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Initialization, message)
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Generation, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Cancelled, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::InvalidResponse, message)
    }

    pub fn is_initialization(&self) -> bool {
        self.kind == GenerationErrorKind::Initialization
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The capability could not be constructed (model load, probe failure)
    Initialization,
    /// The capability failed while completing a prompt
    Generation,
    /// No result within the configured limit
    Timeout,
    /// Aborted by the user
    Cancelled,
    /// The capability answered with something we could not parse
    InvalidResponse,
}

impl GenerationErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Generation => "generation",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidResponse => "invalid_response",
        }
    }
}
