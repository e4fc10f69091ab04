//! Vision/OCR Layer
//!
//! Defines the recognizer seam the bridge submits images to, the hierarchy
//! of text a recognizer reports back, and the aggregation of that hierarchy
//! into a bridge result.
//!
//! Recognizers are callback based: `process` hands the image over and
//! returns, inference runs on threads owned by the recognizer, and exactly
//! one of the two completion callbacks fires afterwards.

pub mod aggregate;
pub mod input;
pub mod tesseract;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use aggregate::{aggregate, ELEMENT_CONFIDENCE};
pub use input::{decode_payload, InputImage};
pub use self::tesseract::TesseractRecognizer;

/// Bounding box (x, y, width, height) in source image pixels
pub type Bounds = (u32, u32, u32, u32);

/// Smallest box covering every box in `boxes`. Edges past `u32::MAX` clamp
/// to it.
fn union_bounds(boxes: impl IntoIterator<Item = Bounds>) -> Bounds {
    let mut iter = boxes.into_iter();
    let Some((x, y, w, h)) = iter.next() else {
        return (0, 0, 0, 0);
    };

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (
        x,
        y,
        x.saturating_add(w),
        y.saturating_add(h),
    );
    for (x, y, w, h) in iter {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x.saturating_add(w));
        max_y = max_y.max(y.saturating_add(h));
    }

    (min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Finest-grained recognized unit, typically a word
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub bounds: Bounds,
}

/// One line of elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    /// Element texts joined by single spaces
    pub text: String,
    pub elements: Vec<TextElement>,
    pub bounds: Bounds,
}

impl TextLine {
    /// Build a line whose text and bounds derive from its elements
    pub fn from_elements(elements: Vec<TextElement>) -> Self {
        let text = elements
            .iter()
            .map(|e| e.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let bounds = union_bounds(elements.iter().map(|e| e.bounds));
        Self {
            text,
            elements,
            bounds,
        }
    }
}

/// A detected text region made of one or more lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    /// Line texts joined by newlines
    pub text: String,
    pub lines: Vec<TextLine>,
    pub bounds: Bounds,
}

impl TextBlock {
    /// Build a block whose text and bounds derive from its lines
    pub fn from_lines(lines: Vec<TextLine>) -> Self {
        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let bounds = union_bounds(
            lines
                .iter()
                .filter(|l| !l.elements.is_empty())
                .map(|l| l.bounds),
        );
        Self { text, lines, bounds }
    }
}

/// Everything a recognizer found in one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedText {
    pub blocks: Vec<TextBlock>,
}

/// What the bridge returns for a successful recognition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Block texts joined by newlines, trimmed
    pub text: String,
    /// Heuristic score in 0-100, see [`ELEMENT_CONFIDENCE`]
    pub confidence: f64,
}

/// Invoked with the recognized text when inference succeeds
pub type SuccessCallback = Box<dyn FnOnce(RecognizedText) + Send>;

/// Invoked with the failure detail when inference fails
pub type FailureCallback = Box<dyn FnOnce(EngineError) + Send>;

/// On-device text recognition engine
pub trait TextRecognizer: Send + Sync {
    /// Engine identifier for logs
    fn name(&self) -> &str;

    /// Submit an image. Returns immediately; exactly one of the callbacks
    /// is invoked later, possibly from another thread.
    fn process(
        &self,
        image: InputImage,
        on_success: SuccessCallback,
        on_failure: FailureCallback,
    );

    /// Release the engine. Work submitted afterwards fails with
    /// [`EngineError::Closed`].
    fn close(&self);
}
