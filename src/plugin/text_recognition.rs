//! Text recognition plugin
//!
//! Bridges the callback-based recognizer into the single blocking
//! call/response the web layer expects: decode the payload, submit it, park
//! the calling thread on a one-shot channel until a callback fires, and
//! aggregate the recognized blocks into text + confidence.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Plugin, PluginCall, PluginResponse};
use crate::config::{AppConfig, BridgeSettings};
use crate::error::{panic_message, RecognitionError};
use crate::vision::{
    aggregate, decode_payload, FailureCallback, RecognitionResult, SuccessCallback,
    TesseractRecognizer, TextRecognizer,
};

/// Success or failure of one `recognize` call
pub type RecognitionOutcome = std::result::Result<RecognitionResult, RecognitionError>;

/// Creates the recognizer when the plugin loads
pub type RecognizerFactory = Box<dyn Fn() -> Result<Arc<dyn TextRecognizer>> + Send + Sync>;

/// Arguments of a `recognize` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    /// Base64 image, optionally behind a data-URL prefix
    pub image: Option<String>,
    /// Format hint; logged, does not change decoding
    pub image_format: String,
}

impl RecognitionRequest {
    pub fn from_call(call: &PluginCall, default_format: &str) -> Self {
        Self {
            image: call.get_string("image").map(str::to_string),
            image_format: call.get_string_or("imageFormat", default_format).to_string(),
        }
    }
}

/// Opens once: the first outcome delivered wins, later ones are dropped
struct CompletionGate {
    sender: Mutex<Option<Sender<RecognitionOutcome>>>,
}

impl CompletionGate {
    fn new() -> (Arc<Self>, Receiver<RecognitionOutcome>) {
        let (sender, receiver) = bounded(1);
        let gate = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        });
        (gate, receiver)
    }

    fn open(&self, outcome: RecognitionOutcome) {
        match self.sender.lock().take() {
            // Fails only if the waiter already gave up
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    debug!("Recognition completed after the caller stopped waiting");
                }
            }
            None => debug!("Ignoring repeated recognition callback"),
        }
    }
}

/// Run aggregation, turning a panic into `AggregationError`
fn guarded_aggregate(build: impl FnOnce() -> RecognitionResult) -> RecognitionOutcome {
    panic::catch_unwind(AssertUnwindSafe(build))
        .map_err(|payload| RecognitionError::AggregationError(panic_message(&*payload)))
}

/// The `TextRecognition` plugin
pub struct TextRecognitionPlugin {
    settings: BridgeSettings,
    factory: RecognizerFactory,
    recognizer: RwLock<Option<Arc<dyn TextRecognizer>>>,
}

impl TextRecognitionPlugin {
    pub const NAME: &'static str = "TextRecognition";

    /// Create an unloaded plugin; `factory` runs on `load`
    pub fn new(settings: BridgeSettings, factory: RecognizerFactory) -> Self {
        Self {
            settings,
            factory,
            recognizer: RwLock::new(None),
        }
    }

    /// Plugin backed by the tesseract recognizer
    pub fn with_tesseract(config: &AppConfig) -> Self {
        let recognizer_settings = config.recognizer.clone();
        Self::new(
            config.bridge.clone(),
            Box::new(move || {
                let recognizer = TesseractRecognizer::new(recognizer_settings.clone())?;
                Ok(Arc::new(recognizer) as Arc<dyn TextRecognizer>)
            }),
        )
    }

    /// Whether a recognizer is currently held
    pub fn is_loaded(&self) -> bool {
        self.recognizer.read().is_some()
    }

    /// Recognize the text in one image. Never panics; every failure comes
    /// back as a `RecognitionError`.
    pub fn recognize(&self, request: &RecognitionRequest) -> RecognitionOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| self.try_recognize(request))).unwrap_or_else(
            |payload| Err(RecognitionError::UnexpectedError(panic_message(&*payload))),
        )
    }

    fn try_recognize(&self, request: &RecognitionRequest) -> RecognitionOutcome {
        debug!(
            "Processing image - format: {}, data length: {}",
            request.image_format,
            request.image.as_deref().map_or(0, str::len)
        );

        let payload = request
            .image
            .as_deref()
            .filter(|image| !image.is_empty())
            .ok_or(RecognitionError::InvalidInput)?;

        let image = decode_payload(payload)?;

        let recognizer = self.recognizer.read().clone().ok_or_else(|| {
            RecognitionError::UnexpectedError("text recognizer is not loaded".to_string())
        })?;

        let (gate, receiver) = CompletionGate::new();

        let success_gate = Arc::clone(&gate);
        let on_success: SuccessCallback = Box::new(move |recognized| {
            success_gate.open(guarded_aggregate(|| aggregate(&recognized)));
        });
        let on_failure: FailureCallback = Box::new(move |error| {
            gate.open(Err(RecognitionError::EngineFailure(error.to_string())));
        });

        recognizer.process(image, on_success, on_failure);

        self.wait_for(receiver)
    }

    fn wait_for(&self, receiver: Receiver<RecognitionOutcome>) -> RecognitionOutcome {
        match self.settings.recognition_timeout() {
            Some(timeout) => match receiver.recv_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => Err(RecognitionError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => Err(RecognitionError::InterruptedWait),
            },
            None => receiver
                .recv()
                .unwrap_or(Err(RecognitionError::InterruptedWait)),
        }
    }
}

impl Plugin for TextRecognitionPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        &["recognize"]
    }

    fn load(&self) -> Result<()> {
        let mut slot = self.recognizer.write();
        if slot.is_some() {
            warn!("TextRecognition plugin loaded twice; keeping the existing recognizer");
            return Ok(());
        }

        let recognizer = (self.factory)().context("Failed to create text recognizer")?;
        info!("TextRecognition plugin loaded (engine: {})", recognizer.name());
        *slot = Some(recognizer);
        Ok(())
    }

    fn invoke(&self, method: &str, call: &PluginCall) -> PluginResponse {
        match method {
            "recognize" => {
                let request =
                    RecognitionRequest::from_call(call, &self.settings.default_image_format);
                match self.recognize(&request) {
                    Ok(result) => {
                        info!(
                            "Recognition successful - text length: {}, confidence: {}",
                            result.text.len(),
                            result.confidence
                        );
                        PluginResponse::resolve(json!({
                            "text": result.text,
                            "confidence": result.confidence,
                        }))
                    }
                    Err(e) => {
                        warn!("Recognition rejected ({}): {}", e.code(), e);
                        PluginResponse::reject_with_code(e.to_string(), e.code())
                    }
                }
            }
            other => PluginResponse::reject(format!("Method {other} not implemented")),
        }
    }

    fn handle_on_destroy(&self) {
        if let Some(recognizer) = self.recognizer.write().take() {
            recognizer.close();
            info!("TextRecognition plugin released its recognizer");
        }
    }
}
