//! Shared types for the maskedit editing core.

use serde::{Deserialize, Serialize};

use crate::decode::DecodeError;
use crate::history::HistoryError;
use crate::mask::MaskError;
use crate::raster::RasterError;
use crate::service::ServiceError;

/// Re-export `RgbaImage` so downstream crates can hand decoded rasters
/// to the core without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point, either in client (on-screen) or surface-local coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position in pixels from the left edge.
    pub x: f64,
    /// Vertical position in pixels from the top edge.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate this point into the coordinate space whose origin is
    /// `origin` (e.g. client coordinates to surface-local ones).
    #[must_use]
    pub fn relative_to(self, origin: Self) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }
}

/// Image or surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A circular brush with round caps and round joins.
///
/// The size is the stroke width in surface pixels and is always
/// positive. Front ends offer [`Brush::MIN_SIZE`]..=[`Brush::MAX_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Brush {
    size_px: u32,
}

impl Brush {
    /// Smallest brush offered by the editing controls.
    pub const MIN_SIZE: u32 = 5;
    /// Largest brush offered by the editing controls.
    pub const MAX_SIZE: u32 = 100;
    /// Brush size a fresh session starts with.
    pub const DEFAULT_SIZE: u32 = 30;

    /// Create a brush of exactly `size_px` pixels.
    ///
    /// Returns `None` for a zero size.
    #[must_use]
    pub const fn new(size_px: u32) -> Option<Self> {
        if size_px == 0 {
            None
        } else {
            Some(Self { size_px })
        }
    }

    /// Create a brush clamped into the range offered by the controls.
    #[must_use]
    pub const fn clamped(size_px: u32) -> Self {
        let size_px = if size_px < Self::MIN_SIZE {
            Self::MIN_SIZE
        } else if size_px > Self::MAX_SIZE {
            Self::MAX_SIZE
        } else {
            size_px
        };
        Self { size_px }
    }

    /// Stroke width in pixels.
    #[must_use]
    pub const fn size_px(self) -> u32 {
        self.size_px
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            size_px: Self::DEFAULT_SIZE,
        }
    }
}

impl TryFrom<u32> for Brush {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "brush size must be positive".to_owned())
    }
}

impl From<Brush> for u32 {
    fn from(brush: Brush) -> Self {
        brush.size_px
    }
}

/// Configuration for an editing session.
///
/// Every field has a default; a partial JSON document only overrides
/// the fields it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Initial brush size, clamped into the brush range on use.
    pub brush_size: u32,

    /// Phrases whose presence in a service error marks it as a
    /// safety-filter rejection (case-sensitive substring match).
    pub safety_phrases: Vec<String>,

    /// File name (without extension) offered for downloads.
    pub download_stem: String,
}

impl EditorConfig {
    /// Default initial brush size.
    pub const DEFAULT_BRUSH_SIZE: u32 = Brush::DEFAULT_SIZE;

    /// Default safety-filter phrases.
    pub const DEFAULT_SAFETY_PHRASES: &'static [&'static str] =
        &["IMAGE_SAFETY", "safety filters"];

    /// Default download file stem.
    pub const DEFAULT_DOWNLOAD_STEM: &'static str = "edited-image";
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            brush_size: Self::DEFAULT_BRUSH_SIZE,
            safety_phrases: Self::DEFAULT_SAFETY_PHRASES
                .iter()
                .map(|&p| p.to_owned())
                .collect(),
            download_stem: Self::DEFAULT_DOWNLOAD_STEM.to_owned(),
        }
    }
}

/// A request was refused before reaching the external service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No image has been uploaded.
    #[error("please upload an image before generating")]
    MissingImage,

    /// The prompt is empty or whitespace only.
    #[error("please enter a prompt describing the edit")]
    BlankPrompt,
}

/// Errors surfaced by an editing session.
///
/// Every error is terminal for the current action only; the session
/// stays usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    /// Input was rejected before dispatch.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The external service failed. The message is shown verbatim.
    #[error("{0}")]
    Service(ServiceError),

    /// The external service failed because its safety filter blocked
    /// the request. Recoverable through prompt enhancement and retry.
    #[error("{0}")]
    SafetyFiltered(ServiceError),

    /// The uploaded image could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The masking canvas rejected the operation.
    #[error(transparent)]
    Mask(#[from] MaskError),

    /// The edit timeline rejected the operation.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Encoding or decoding an image payload failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// A generation request is outstanding; the action is disabled
    /// until it completes.
    #[error("an edit request is already in progress")]
    Busy,

    /// A generation outcome arrived with no request outstanding.
    #[error("no edit request is in progress")]
    NoRequestInFlight,

    /// Masking mode is off, so there is no canvas to paint on.
    #[error("masking is not enabled")]
    MaskingInactive,

    /// There is no edited image at the current point in history.
    #[error("there is no edited image to download")]
    NothingToDownload,
}

impl EditorError {
    /// Whether this error offers the enhance-and-retry recovery path.
    #[must_use]
    pub const fn is_safety_filtered(&self) -> bool {
        matches!(self, Self::SafetyFiltered(_))
    }
}
