//! Image decoding for uploads.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! [`SourceImage`] a session edits: the encoded bytes are kept so they
//! can be sent to the edit service unchanged, and the decoded RGBA
//! pixels feed the masking canvas.

use image::{ImageFormat, RgbaImage};

use crate::raster::DataUri;
use crate::types::Dimensions;

/// MIME types accepted for uploads.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/bmp"];

/// Errors that can occur while decoding an uploaded image.
///
/// Stores the decoder message rather than `image::ImageError` so the
/// error stays `Clone` and can be kept as the session's last error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    /// The declared or detected type is not one the editor accepts.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}

/// Decode raw image bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`DecodeError::EmptyInput`] if `bytes` is empty.
/// Returns [`DecodeError::ImageDecode`] if the format is unrecognized
/// or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Detect the MIME type of encoded image bytes from their signature.
///
/// # Errors
///
/// Returns [`DecodeError::EmptyInput`] for empty input and
/// [`DecodeError::ImageDecode`] when the signature is unknown.
pub fn sniff_mime_type(bytes: &[u8]) -> Result<&'static str, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyInput);
    }
    let format = image::guess_format(bytes)?;
    Ok(format.to_mime_type())
}

/// File extension conventionally used for a MIME type, if it names an
/// image format the `image` crate knows.
#[must_use]
pub fn extension_for_mime_type(mime_type: &str) -> Option<&'static str> {
    ImageFormat::from_mime_type(mime_type)
        .and_then(|format| format.extensions_str().first().copied())
}

/// The original image of an editing session.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    mime_type: String,
    pixels: RgbaImage,
}

impl SourceImage {
    /// Decode an upload.
    ///
    /// `mime_type` is the type reported by the upload (a browser file
    /// type or a guess from the file name). When absent or empty the
    /// type is sniffed from the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedType`] when the type is not in
    /// [`SUPPORTED_MIME_TYPES`], and the errors of [`decode_rgba`] when
    /// the bytes do not decode.
    pub fn decode(bytes: Vec<u8>, mime_type: Option<&str>) -> Result<Self, DecodeError> {
        let mime_type = match mime_type.map(str::trim) {
            Some(declared) if !declared.is_empty() => declared.to_ascii_lowercase(),
            _ => sniff_mime_type(&bytes)?.to_owned(),
        };
        if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(DecodeError::UnsupportedType(mime_type));
        }

        let pixels = decode_rgba(&bytes)?;
        Ok(Self {
            bytes,
            mime_type,
            pixels,
        })
    }

    /// The encoded upload bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decoded RGBA pixels.
    #[must_use]
    pub const fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Pixel dimensions of the decoded image.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixels.width(), self.pixels.height())
    }

    /// The upload as a self-contained data URI.
    #[must_use]
    pub fn to_data_uri(&self) -> DataUri {
        DataUri::new(self.mime_type.clone(), self.bytes.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        crate::raster::encode_png(img).unwrap()
    }

    #[test]
    fn empty_input_returns_error() {
        assert_eq!(decode_rgba(&[]), Err(DecodeError::EmptyInput));
        assert!(matches!(
            SourceImage::decode(Vec::new(), None),
            Err(DecodeError::EmptyInput)
        ));
    }

    #[test]
    fn corrupt_bytes_return_image_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(DecodeError::ImageDecode(_))));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let decoded = decode_rgba(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(3, 4).0, [128, 64, 32, 255]);
    }

    #[test]
    fn sniffs_png_when_type_is_missing() {
        let png = encode_png(&RgbaImage::new(2, 2));
        let source = SourceImage::decode(png.clone(), None).unwrap();
        assert_eq!(source.mime_type(), "image/png");
        assert_eq!(source.bytes(), png.as_slice());

        let source = SourceImage::decode(png, Some("  ")).unwrap();
        assert_eq!(source.mime_type(), "image/png");
    }

    #[test]
    fn declared_type_is_normalized() {
        let png = encode_png(&RgbaImage::new(2, 3));
        let source = SourceImage::decode(png, Some("IMAGE/PNG")).unwrap();
        assert_eq!(source.mime_type(), "image/png");
        assert_eq!(source.dimensions(), Dimensions::new(2, 3));
    }

    #[test]
    fn unsupported_declared_type_is_rejected() {
        let png = encode_png(&RgbaImage::new(2, 2));
        let result = SourceImage::decode(png, Some("image/gif"));
        assert_eq!(
            result.map(|_| ()),
            Err(DecodeError::UnsupportedType("image/gif".to_owned()))
        );
    }

    #[test]
    fn data_uri_carries_original_bytes() {
        let png = encode_png(&RgbaImage::new(1, 1));
        let source = SourceImage::decode(png.clone(), None).unwrap();
        let uri = source.to_data_uri();
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(uri.bytes(), png.as_slice());
    }

    #[test]
    fn extensions_follow_mime_type() {
        assert_eq!(extension_for_mime_type("image/png"), Some("png"));
        assert_eq!(extension_for_mime_type("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime_type("text/plain"), None);
    }
}
