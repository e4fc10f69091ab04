//! Result aggregation
//!
//! Flattens a recognized block hierarchy into the text + confidence pair the
//! bridge returns.

use super::{RecognitionResult, RecognizedText};

/// Score credited to every element with non-empty text.
///
/// Recognizers behind this bridge expose no per-element confidence, so the
/// reported confidence is a presence heuristic: 90.0 whenever anything was
/// read, 0.0 otherwise. Callers depend on these exact values.
pub const ELEMENT_CONFIDENCE: f64 = 90.0;

/// Join block texts with newlines and score the elements
pub fn aggregate(recognized: &RecognizedText) -> RecognitionResult {
    let mut full_text = String::new();
    let mut total_confidence = 0.0;
    let mut element_count = 0usize;

    for block in &recognized.blocks {
        full_text.push_str(&block.text);
        full_text.push('\n');

        for line in &block.lines {
            for element in &line.elements {
                if !element.text.is_empty() {
                    total_confidence += ELEMENT_CONFIDENCE;
                    element_count += 1;
                }
            }
        }
    }

    let confidence = if element_count > 0 {
        total_confidence / element_count as f64
    } else {
        0.0
    };

    RecognitionResult {
        text: full_text.trim().to_string(),
        confidence,
    }
}
