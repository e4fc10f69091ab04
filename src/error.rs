//! Error types
//!
//! `RecognitionError` is the failure half of a recognition outcome. Its
//! `Display` text is the exact message rejected across the bridge.
//! `EngineError` is what a recognizer reports through its failure callback.

use std::time::Duration;
use thiserror::Error;

/// Why a single `recognize` request failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecognitionError {
    /// The image payload was missing or empty
    #[error("Image data is required")]
    InvalidInput,

    /// Malformed base64, or bytes that are not a known image container
    #[error("Failed to decode image")]
    DecodeError,

    /// The recognizer invoked its failure callback
    #[error("Recognition failed: {0}")]
    EngineFailure(String),

    /// Building the result from recognized blocks blew up
    #[error("Error processing text: {0}")]
    AggregationError(String),

    /// The recognizer dropped both callbacks without invoking either
    #[error("Recognition interrupted")]
    InterruptedWait,

    /// No callback fired within the configured timeout
    #[error("Recognition timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Anything else
    #[error("Recognition error: {0}")]
    UnexpectedError(String),
}

impl RecognitionError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            RecognitionError::InvalidInput => "INVALID_INPUT",
            RecognitionError::DecodeError => "DECODE_ERROR",
            RecognitionError::EngineFailure(_) => "ENGINE_FAILURE",
            RecognitionError::AggregationError(_) => "AGGREGATION_ERROR",
            RecognitionError::InterruptedWait => "INTERRUPTED",
            RecognitionError::Timeout(_) => "TIMEOUT",
            RecognitionError::UnexpectedError(_) => "UNEXPECTED_ERROR",
        }
    }
}

/// Failure reported by a text recognizer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The recognizer has been closed and accepts no more work
    #[error("recognizer is closed")]
    Closed,

    /// The engine could not be initialised for the requested language
    #[error("failed to initialize tesseract for {language}: {reason}")]
    Initialize { language: String, reason: String },

    /// The engine accepted the image but recognition failed
    #[error("recognition failed: {0}")]
    Recognize(String),

    /// The image could not be handed to the recognizer
    #[error("failed to prepare image: {0}")]
    Input(String),

    /// The recognizer produced output that could not be understood
    #[error("malformed recognizer output: {0}")]
    Output(String),

    /// Recognition panicked; the worker survives and serves later jobs
    #[error("recognizer panicked: {0}")]
    Panicked(String),
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_messages() {
        assert_eq!(RecognitionError::InvalidInput.to_string(), "Image data is required");
        assert_eq!(RecognitionError::DecodeError.to_string(), "Failed to decode image");
        assert_eq!(
            RecognitionError::EngineFailure("model missing".into()).to_string(),
            "Recognition failed: model missing"
        );
        assert_eq!(
            RecognitionError::AggregationError("bad block".into()).to_string(),
            "Error processing text: bad block"
        );
        assert_eq!(RecognitionError::InterruptedWait.to_string(), "Recognition interrupted");
        assert_eq!(
            RecognitionError::Timeout(Duration::from_millis(1500)).to_string(),
            "Recognition timed out after 1500ms"
        );
        assert_eq!(
            RecognitionError::UnexpectedError("boom".into()).to_string(),
            "Recognition error: boom"
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            RecognitionError::InvalidInput,
            RecognitionError::DecodeError,
            RecognitionError::EngineFailure(String::new()),
            RecognitionError::AggregationError(String::new()),
            RecognitionError::InterruptedWait,
            RecognitionError::Timeout(Duration::ZERO),
            RecognitionError::UnexpectedError(String::new()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_engine_error_display() {
        let error = EngineError::Initialize {
            language: "deu".into(),
            reason: "Error opening data file".into(),
        };
        assert_eq!(
            error.to_string(),
            "failed to initialize tesseract for deu: Error opening data file"
        );
        assert_eq!(
            EngineError::Panicked("index out of bounds".into()).to_string(),
            "recognizer panicked: index out of bounds"
        );
        assert_eq!(EngineError::Closed.to_string(), "recognizer is closed");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static message");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 42");
    }
}
