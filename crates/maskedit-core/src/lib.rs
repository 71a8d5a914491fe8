//! maskedit-core: prompt-driven image editing with painted masks.
//!
//! This crate is sans-IO: it operates on in-memory byte slices and
//! rasters and never touches the network or the filesystem. External
//! services are reached through the [`ImageEditService`] and
//! [`PromptEnhancer`] traits.
//!
//! The main pieces:
//!
//! - [`PixelDiffMasker`] shows an image on a paintable surface and turns
//!   whatever was painted into a binary [`Mask`] by diffing the surface
//!   against an untouched rendering.
//! - [`StrokeInput`] turns pointer events into brush strokes.
//! - [`EditHistory`] is the linear undo/redo timeline.
//! - [`EditSession`] ties them together with the working prompt and the
//!   busy flag, and exposes one method per user action.

pub mod decode;
pub mod history;
pub mod mask;
pub mod masker;
pub mod prompts;
pub mod raster;
pub mod safety;
pub mod service;
pub mod session;
pub mod stroke;
pub mod surface;
pub mod types;

pub use decode::{DecodeError, SourceImage, decode_rgba};
pub use history::{EditHistory, EditSnapshot, HistoryError};
pub use mask::{Mask, MaskError};
pub use masker::{MaskerState, PixelDiffMasker};
pub use prompts::{EXAMPLE_PROMPTS, SURPRISE_PROMPTS, surprise_prompt};
pub use raster::{DataUri, RasterError, encode_png};
pub use safety::{PhraseClassifier, SafetyClassifier};
pub use service::{
    EditRequest, EditResult, EnhancedPrompts, ImageEditService, PromptEnhancer, ServiceError,
};
pub use session::{Download, EditSession, MaskingCanvas, SessionView};
pub use stroke::StrokeInput;
pub use types::{
    Brush, Dimensions, EditorConfig, EditorError, Point, RgbaImage, ValidationError,
};
