//! Error types for the edgequake-studyguide library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`StudyGuideError`]: **Fatal**: the run cannot proceed at all (empty
//!   topic, invalid configuration, report cannot be written). Returned as
//!   `Err(StudyGuideError)` from the top-level functions.
//!
//! * [`GenerationError`]: **Non-fatal**: a single phase failed (missing API
//!   key, rate limit, provider error). Stored inside
//!   [`crate::output::Generation`] together with an inline error payload so
//!   the report still renders every section.

use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-studyguide library.
///
/// Phase-level failures use [`GenerationError`] and are stored in
/// [`crate::output::Generation`] rather than propagated here.
#[derive(Debug, Error)]
pub enum StudyGuideError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The topic was empty or whitespace-only.
    #[error("Topic cannot be empty.")]
    EmptyTopic,

    /// An HTML report given to the repair tool could not be read.
    #[error("Failed to read report '{path}': {source}")]
    ReportReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider could not be built (missing API key etc.).
    ///
    /// Only logged: generation then degrades to
    /// [`GenerationError::MissingCredentials`] payloads.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output HTML file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single generation phase.
///
/// Every variant maps to an inline payload (see [`GenerationError::payload`])
/// that replaces the phase content, so downstream rendering never sees an
/// empty section.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// No provider could be built (usually a missing API key).
    #[error("API key is missing or invalid")]
    MissingCredentials,

    /// HTTP 429 / RESOURCE_EXHAUSTED. Retried after a pause.
    #[error("Rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// Any other provider failure. Not retried.
    #[error("Generation failed: {detail}")]
    Api { detail: String },

    /// Every attempt hit the rate limit.
    #[error("Rate limited on all {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The provider answered but produced no text.
    #[error("No text content generated")]
    EmptyResponse,
}

impl GenerationError {
    /// Whether the retry loop should try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }

    /// The content embedded in the report in place of the generated text.
    pub fn payload(&self) -> String {
        match self {
            GenerationError::MissingCredentials => {
                "Error: API Key is missing or invalid.".to_string()
            }
            GenerationError::RetriesExhausted { .. } => {
                "<p class='error'>Error: max retries exceeded.</p>".to_string()
            }
            GenerationError::EmptyResponse => "Error: No text content generated.".to_string(),
            GenerationError::RateLimited { detail } | GenerationError::Api { detail } => format!(
                "<p class='error'>Error generating content: {}</p>",
                encode_text(detail)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_topic_display() {
        assert_eq!(StudyGuideError::EmptyTopic.to_string(), "Topic cannot be empty.");
    }

    #[test]
    fn output_write_failed_display() {
        let e = StudyGuideError::OutputWriteFailed {
            path: PathBuf::from("output/rust_study_guide.html"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = e.to_string();
        assert!(msg.contains("rust_study_guide.html"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn only_rate_limit_is_retryable() {
        assert!(GenerationError::RateLimited {
            detail: "429".into()
        }
        .is_retryable());
        assert!(!GenerationError::Api {
            detail: "400".into()
        }
        .is_retryable());
        assert!(!GenerationError::MissingCredentials.is_retryable());
        assert!(!GenerationError::RetriesExhausted { attempts: 4 }.is_retryable());
    }

    #[test]
    fn fixed_payloads() {
        assert_eq!(
            GenerationError::MissingCredentials.payload(),
            "Error: API Key is missing or invalid."
        );
        assert_eq!(
            GenerationError::RetriesExhausted { attempts: 4 }.payload(),
            "<p class='error'>Error: max retries exceeded.</p>"
        );
        assert_eq!(
            GenerationError::EmptyResponse.payload(),
            "Error: No text content generated."
        );
    }

    #[test]
    fn api_payload_escapes_detail() {
        let e = GenerationError::Api {
            detail: "bad <request>".into(),
        };
        assert_eq!(
            e.payload(),
            "<p class='error'>Error generating content: bad &lt;request&gt;</p>"
        );
    }
}
