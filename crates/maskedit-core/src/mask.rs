//! Binary edit masks.
//!
//! A mask marks which pixels an edit may change. Selected pixels are
//! opaque white, unselected pixels are opaque black, and nothing else
//! ever appears. Masks are exchanged with the edit service as PNG.

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::decode::{DecodeError, decode_rgba};
use crate::raster::{DataUri, RasterError, encode_png};
use crate::types::Dimensions;

/// MIME type masks are always encoded as.
pub const MASK_MIME_TYPE: &str = "image/png";

/// Errors from building, encoding, or restoring masks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskError {
    /// A pixel was neither opaque white nor opaque black.
    #[error("mask pixel at ({x}, {y}) is neither black nor white")]
    NotBinary {
        /// Column of the offending pixel.
        x: u32,
        /// Row of the offending pixel.
        y: u32,
    },

    /// The canvas has no loaded image yet.
    #[error("the masking canvas is not ready")]
    NotReady,

    /// A drawing surface could not be allocated at this size.
    #[error("cannot create a {width}x{height} drawing surface")]
    InvalidSurface {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// A mask image did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A mask image did not encode, or its data URI was malformed.
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// A binary selection over an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    /// Opaque white: the pixel may be edited.
    pub const SELECTED: Rgba<u8> = Rgba([255, 255, 255, 255]);
    /// Opaque black: the pixel is left alone.
    pub const UNSELECTED: Rgba<u8> = Rgba([0, 0, 0, 255]);

    const ON: Luma<u8> = Luma([255]);
    const OFF: Luma<u8> = Luma([0]);

    /// Build a mask by asking `selected` about every pixel.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut selected: impl FnMut(u32, u32) -> bool) -> Self {
        let pixels = GrayImage::from_fn(dimensions.width, dimensions.height, |x, y| {
            if selected(x, y) { Self::ON } else { Self::OFF }
        });
        Self { pixels }
    }

    /// A mask with nothing selected.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self {
            pixels: GrayImage::from_pixel(dimensions.width, dimensions.height, Self::OFF),
        }
    }

    /// Interpret an RGBA raster as a mask.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotBinary`] at the first pixel that is not
    /// exactly [`Mask::SELECTED`] or [`Mask::UNSELECTED`].
    pub fn from_rgba(image: &RgbaImage) -> Result<Self, MaskError> {
        let mut pixels = GrayImage::new(image.width(), image.height());
        for (x, y, px) in image.enumerate_pixels() {
            let value = match *px {
                p if p == Self::SELECTED => Self::ON,
                p if p == Self::UNSELECTED => Self::OFF,
                _ => return Err(MaskError::NotBinary { x, y }),
            };
            pixels.put_pixel(x, y, value);
        }
        Ok(Self { pixels })
    }

    /// Decode a PNG mask.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Decode`] if the bytes are not an image and
    /// [`MaskError::NotBinary`] if the image is not black and white.
    pub fn from_png(bytes: &[u8]) -> Result<Self, MaskError> {
        Self::from_rgba(&decode_rgba(bytes)?)
    }

    /// Decode a mask from a data URI.
    ///
    /// # Errors
    ///
    /// See [`DataUri::parse`] and [`Mask::from_png`].
    pub fn from_data_uri(text: &str) -> Result<Self, MaskError> {
        let uri = DataUri::parse(text)?;
        Self::from_png(uri.bytes())
    }

    /// Mask dimensions in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixels.width(), self.pixels.height())
    }

    /// Whether the pixel at `(x, y)` is selected. Out-of-range
    /// coordinates are unselected.
    #[must_use]
    pub fn is_selected(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel_checked(x, y).is_some_and(|p| *p == Self::ON)
    }

    /// The RGBA value of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if self.is_selected(x, y) {
            Self::SELECTED
        } else {
            Self::UNSELECTED
        }
    }

    /// Number of selected pixels.
    #[must_use]
    pub fn selected_pixels(&self) -> u64 {
        self.pixels.pixels().filter(|p| **p == Self::ON).count() as u64
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| *p == Self::OFF)
    }

    /// Expand to opaque black and white RGBA.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.pixels.width(), self.pixels.height(), |x, y| {
            self.pixel(x, y)
        })
    }

    /// Resample to `dimensions` with nearest-neighbour, so the result
    /// stays binary.
    #[must_use]
    pub fn resized(&self, dimensions: Dimensions) -> Self {
        let source = self.dimensions();
        if source == dimensions {
            return self.clone();
        }
        if source.width == 0 || source.height == 0 {
            return Self::empty(dimensions);
        }
        Self::from_fn(dimensions, |x, y| {
            let sx = nearest(x, dimensions.width, source.width);
            let sy = nearest(y, dimensions.height, source.height);
            self.is_selected(sx, sy)
        })
    }

    /// Encode as an RGBA PNG.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Raster`] if encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>, MaskError> {
        Ok(encode_png(&self.to_rgba())?)
    }

    /// Encode as a PNG data URI.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Raster`] if encoding fails.
    pub fn to_data_uri(&self) -> Result<DataUri, MaskError> {
        Ok(DataUri::new(MASK_MIME_TYPE, self.to_png()?))
    }
}

/// Source index whose pixel centre is nearest to the centre of
/// destination index `dst` when `dst_len` pixels cover `src_len`.
fn nearest(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let scaled = (u64::from(dst) * 2 + 1) * u64::from(src_len) / (u64::from(dst_len) * 2);
    u32::try_from(scaled).map_or(src_len - 1, |s| s.min(src_len - 1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn left_half(d: Dimensions) -> Mask {
        Mask::from_fn(d, |x, _| x < d.width / 2)
    }

    #[test]
    fn empty_mask_selects_nothing() {
        let mask = Mask::empty(Dimensions::new(4, 3));
        assert!(mask.is_empty());
        assert_eq!(mask.selected_pixels(), 0);
        assert_eq!(mask.pixel(0, 0), Mask::UNSELECTED);
    }

    #[test]
    fn out_of_range_is_unselected() {
        let mask = Mask::from_fn(Dimensions::new(2, 2), |_, _| true);
        assert!(mask.is_selected(1, 1));
        assert!(!mask.is_selected(2, 0));
    }

    #[test]
    fn rgba_output_is_strictly_binary() {
        let mask = left_half(Dimensions::new(6, 2));
        let rgba = mask.to_rgba();
        assert!(
            rgba.pixels()
                .all(|p| *p == Mask::SELECTED || *p == Mask::UNSELECTED)
        );
        assert_eq!(*rgba.get_pixel(0, 0), Mask::SELECTED);
        assert_eq!(*rgba.get_pixel(5, 1), Mask::UNSELECTED);
    }

    #[test]
    fn from_rgba_rejects_grey_pixels() {
        let mut img = RgbaImage::from_pixel(3, 3, Mask::UNSELECTED);
        img.put_pixel(2, 1, Rgba([128, 128, 128, 255]));
        assert_eq!(
            Mask::from_rgba(&img),
            Err(MaskError::NotBinary { x: 2, y: 1 })
        );
    }

    #[test]
    fn from_rgba_rejects_transparent_black() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        assert!(Mask::from_rgba(&img).is_err());
    }

    #[test]
    fn png_preserves_selection() {
        let mask = left_half(Dimensions::new(8, 5));
        let restored = Mask::from_png(&mask.to_png().unwrap()).unwrap();
        assert_eq!(restored, mask);
    }

    #[test]
    fn data_uri_is_png() {
        let mask = left_half(Dimensions::new(2, 2));
        let uri = mask.to_data_uri().unwrap();
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(Mask::from_data_uri(&uri.to_string()).unwrap(), mask);
    }

    #[test]
    fn resize_stays_binary_and_keeps_regions() {
        let mask = left_half(Dimensions::new(10, 10));
        let big = mask.resized(Dimensions::new(40, 20));
        assert_eq!(big.dimensions(), Dimensions::new(40, 20));
        assert!(big.is_selected(0, 0));
        assert!(!big.is_selected(39, 19));
        assert_eq!(big.selected_pixels(), 20 * 20);
    }

    #[test]
    fn downscale_picks_nearest_source_pixel() {
        let mask = Mask::from_fn(Dimensions::new(4, 1), |x, _| x == 3);
        let small = mask.resized(Dimensions::new(2, 1));
        assert!(!small.is_selected(0, 0));
        assert!(small.is_selected(1, 0));
    }
}
