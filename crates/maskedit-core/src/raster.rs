//! PNG encoding and data URI handling.
//!
//! Images travel between the editor and the external service as
//! `data:<mime>;base64,<payload>` URIs. Masks are always PNG.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageEncoder, RgbaImage};

/// Errors from encoding rasters or parsing data URIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),

    /// The text is not a `data:<mime>;base64,<payload>` URI.
    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),

    /// The base64 payload did not decode.
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

impl From<image::ImageError> for RasterError {
    fn from(err: image::ImageError) -> Self {
        Self::PngEncode(err.to_string())
    }
}

impl From<base64::DecodeError> for RasterError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`RasterError::PngEncode`] if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RasterError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(png_bytes)
}

/// An inline image: MIME type plus encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    bytes: Vec<u8>,
}

impl DataUri {
    /// Wrap encoded bytes.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build from a MIME type and a base64 payload (as found in inline
    /// data returned by the service).
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Base64`] if the payload does not decode.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self, RasterError> {
        let bytes = STANDARD.decode(payload.trim())?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Parse `data:<mime>;base64,<payload>`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::MalformedDataUri`] when the prefix, MIME
    /// type, or `;base64` marker is missing, and [`RasterError::Base64`]
    /// when the payload does not decode.
    pub fn parse(text: &str) -> Result<Self, RasterError> {
        let malformed = || RasterError::MalformedDataUri(truncate(text));

        let rest = text.strip_prefix("data:").ok_or_else(malformed)?;
        let (header, payload) = rest.split_once(',').ok_or_else(malformed)?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(malformed)?;
        if mime_type.is_empty() {
            return Err(malformed());
        }
        Self::from_base64(mime_type, payload)
    }

    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The bytes as standard base64, without the `data:` header.
    #[must_use]
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64_payload())
    }
}

impl FromStr for DataUri {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Keep error messages short when the offending text is a huge payload.
fn truncate(text: &str) -> String {
    const MAX: usize = 48;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn png_output_has_signature() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn displays_as_data_uri() {
        let uri = DataUri::new("image/png", b"abc".to_vec());
        assert_eq!(uri.to_string(), "data:image/png;base64,YWJj");
        assert_eq!(uri.base64_payload(), "YWJj");
    }

    #[test]
    fn parses_data_uri() {
        let uri: DataUri = "data:image/jpeg;base64,YWJj".parse().unwrap();
        assert_eq!(uri.mime_type(), "image/jpeg");
        assert_eq!(uri.bytes(), b"abc");
    }

    #[test]
    fn rejects_missing_prefix_or_marker() {
        for text in [
            "image/png;base64,YWJj",
            "data:image/png,YWJj",
            "data:;base64,YWJj",
            "data:image/png;base64",
        ] {
            assert!(
                matches!(DataUri::parse(text), Err(RasterError::MalformedDataUri(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn rejects_bad_payload() {
        assert!(matches!(
            DataUri::parse("data:image/png;base64,@@@"),
            Err(RasterError::Base64(_))
        ));
    }

    #[test]
    fn long_inputs_are_truncated_in_errors() {
        let text = "x".repeat(500);
        let Err(RasterError::MalformedDataUri(msg)) = DataUri::parse(&text) else {
            unreachable!("expected a malformed data URI error");
        };
        assert!(msg.len() < 60);
        assert!(msg.ends_with("..."));
    }
}
