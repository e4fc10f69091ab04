//! Image payload decoding
//!
//! Turns the string a web-layer caller sends (raw base64, or a data URL)
//! into the recognizer's input representation.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use image::DynamicImage;
use tracing::debug;

use crate::error::RecognitionError;

/// Standard alphabet; padding optional and stray trailing bits tolerated,
/// matching what mobile web views commonly emit.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decoded raster image as handed to a recognizer
#[derive(Debug, Clone)]
pub struct InputImage {
    image: DynamicImage,
    rotation_degrees: u32,
}

impl InputImage {
    /// Wrap a decoded image. `rotation_degrees` is clockwise rotation needed
    /// to display it upright.
    pub fn from_image(image: DynamicImage, rotation_degrees: u32) -> Self {
        Self {
            image,
            rotation_degrees,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }
}

/// Drop everything up to and including the first comma, if there is one
pub fn strip_data_url_prefix(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, encoded)) => encoded,
        None => payload,
    }
}

/// Decode base64 text, ignoring embedded ASCII whitespace
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, RecognitionError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    PAYLOAD_ENGINE.decode(compact.as_bytes()).map_err(|e| {
        debug!("Base64 decode failed: {}", e);
        RecognitionError::DecodeError
    })
}

/// Decode a bridge image payload into an upright `InputImage`
pub fn decode_payload(payload: &str) -> Result<InputImage, RecognitionError> {
    let bytes = decode_base64(strip_data_url_prefix(payload))?;

    let image = image::load_from_memory(&bytes).map_err(|e| {
        debug!("Image decode failed ({} bytes): {}", bytes.len(), e);
        RecognitionError::DecodeError
    })?;

    debug!("Decoded {}x{} image", image.width(), image.height());
    Ok(InputImage::from_image(image, 0))
}
