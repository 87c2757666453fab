//! Error types for the configuration boundary and the transcript source.
//!
//! Steady-state alignment never fails; no-match is a normal outcome handled by
//! the state machine. Only configuration input and transcript plumbing can
//! produce errors, and both are recovered from without tearing down a session.

use thiserror::Error;

/// Rejected configuration input. The previous configuration stays in effect.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid speaker mode `{0}` (expected `anchor` or `external`)")]
    InvalidSpeakerMode(String),
    #[error("invalid tag pattern `{pattern}`: {reason}")]
    InvalidTagPattern { pattern: String, reason: String },
    #[error("custom tag prefix must not be empty")]
    EmptyTagPrefix,
    #[error("invalid {kind} marker pattern `{pattern}`: {reason}")]
    InvalidMarkerPattern {
        kind: &'static str,
        pattern: String,
        reason: String,
    },
    #[error("`{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Failure reported by the transcript source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("transcript stream aborted")]
    Aborted,
    #[error("network error: {0}")]
    Network(String),
    #[error("microphone access denied")]
    NotAllowed,
    #[error("transcript source unavailable: {0}")]
    Unavailable(String),
    #[error("transcript source error `{0}`")]
    Other(String),
}

impl TranscriptError {
    /// Whether an automatic restart is expected to recover the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TranscriptError::NoSpeech | TranscriptError::Aborted | TranscriptError::Network(_)
        )
    }

    /// Errors that are part of normal stream churn and not worth logging.
    pub fn is_expected(&self) -> bool {
        matches!(self, TranscriptError::NoSpeech | TranscriptError::Aborted)
    }
}
