//! Image decoder for the memory tier
//!
//! Payloads are sniffed and their headers parsed, not rasterized. The encoded
//! bytes are what the proxy serves, so they are what memory holds and what a
//! cached image costs.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;
use tiered_cache::{DecodeError, Decoder};

/// An encoded image whose format and dimensions have been verified
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    type Content = Arc<DecodedImage>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Content, DecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError(e.to_string()))?;

        let format = reader
            .format()
            .ok_or_else(|| DecodeError("unrecognized image format".to_string()))?;

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| DecodeError(e.to_string()))?;

        Ok(Arc::new(DecodedImage {
            bytes: bytes.to_vec(),
            format,
            width,
            height,
        }))
    }

    fn cost(&self, content: &Self::Content) -> u64 {
        content.bytes.len() as u64
    }
}
