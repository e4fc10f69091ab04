//! Test doubles shared by the vision, plugin and bridge tests

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    FailureCallback, InputImage, RecognizedText, SuccessCallback, TextBlock, TextElement,
    TextLine, TextRecognizer,
};
use crate::error::EngineError;

/// One block per entry, each with a single one-element line
pub(crate) fn blocks(texts: &[&str]) -> RecognizedText {
    let blocks = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let element = TextElement {
                text: text.to_string(),
                bounds: (0, i as u32 * 20, 10 * text.len() as u32, 16),
            };
            TextBlock::from_lines(vec![TextLine::from_elements(vec![element])])
        })
        .collect();
    RecognizedText { blocks }
}

/// Base64 of a white PNG of the given size
pub(crate) fn png_base64(width: u32, height: u32) -> String {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(bytes)
}

/// How a scripted recognizer answers one submission
pub(crate) enum Reply {
    Success(RecognizedText),
    Failure(EngineError),
    /// Invoke the success callback, then the failure callback
    Both(RecognizedText, EngineError),
    /// Drop both callbacks without invoking either
    Drop,
    /// Keep both callbacks and never invoke them
    Hold,
    /// Panic inside `process` on the caller's thread
    Panic,
}

type Script = dyn Fn(&InputImage) -> Reply + Send + Sync;

/// Recognizer that answers from a script on a background thread
pub(crate) struct ScriptedRecognizer {
    script: Box<Script>,
    delay: Box<dyn Fn(&InputImage) -> Duration + Send + Sync>,
    held: Mutex<Vec<(SuccessCallback, FailureCallback)>>,
    processed: AtomicUsize,
    closed: AtomicUsize,
}

impl ScriptedRecognizer {
    pub(crate) fn new(script: impl Fn(&InputImage) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Box::new(|_| Duration::ZERO),
            held: Mutex::new(Vec::new()),
            processed: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Always succeed with one block per text
    pub(crate) fn reading(texts: &'static [&'static str]) -> Self {
        Self::new(move |_| Reply::Success(blocks(texts)))
    }

    /// Delay each reply by a per-image amount
    pub(crate) fn with_delay(
        mut self,
        delay: impl Fn(&InputImage) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wrap for use where a `dyn TextRecognizer` is expected
    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn process(&self, image: InputImage, on_success: SuccessCallback, on_failure: FailureCallback) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        let delay = (self.delay)(&image);

        match (self.script)(&image) {
            Reply::Panic => panic!("scripted recognizer panicked"),
            Reply::Hold => self.held.lock().push((on_success, on_failure)),
            reply => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    match reply {
                        Reply::Success(text) => on_success(text),
                        Reply::Failure(error) => on_failure(error),
                        Reply::Both(text, error) => {
                            on_success(text);
                            on_failure(error);
                        }
                        Reply::Drop => drop((on_success, on_failure)),
                        Reply::Hold | Reply::Panic => unreachable!(),
                    }
                });
            }
        }
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
