//! Text Recognition Bridge
//!
//! Exposes on-device text recognition to a hybrid web/native shell. The web
//! layer sends a base64 image over the bridge; the `TextRecognition` plugin
//! decodes it, hands it to a callback-based recognizer, blocks until the
//! recognizer reports back, and answers with the recognized text and a
//! heuristic confidence.

pub mod app;
pub mod config;
pub mod error;
pub mod plugin;
pub mod shared;
pub mod vision;

pub use app::{Bridge, BridgeBuilder};
pub use config::AppConfig;
pub use error::{EngineError, RecognitionError};
pub use plugin::{Plugin, PluginCall, PluginResponse, RecognitionRequest, TextRecognitionPlugin};
pub use shared::{BridgeCall, BridgeResponse};
pub use vision::{RecognitionResult, TextRecognizer};
