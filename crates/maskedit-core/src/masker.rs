//! Pixel-diff masking.
//!
//! The masker keeps two renderings of the source image at surface size:
//! the visible surface the user paints on, and an untouched reference.
//! A mask is derived by comparing the two pixel by pixel, so it does not
//! matter how many strokes overlapped or what shape the brush had. Any
//! pixel whose RGB changed is selected.
//!
//! The finished mask is always mapped back to the source image's own
//! dimensions, independent of how large the surface happened to be on
//! screen.

use image::RgbaImage;
use tiny_skia::Pixmap;

use crate::mask::{Mask, MaskError};
use crate::surface::{DrawingSurface, fitted_dimensions, pixmap_from_rgba};
use crate::types::{Brush, Dimensions, Point};

/// Externally visible lifecycle of a [`PixelDiffMasker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskerState {
    /// No image has been loaded.
    Unloaded,
    /// An image is being decoded; painting is disabled.
    Decoding,
    /// An image is displayed and can be painted on.
    Ready,
}

#[derive(Debug, Clone)]
struct Canvas {
    original: Pixmap,
    image_dimensions: Dimensions,
    surface: DrawingSurface,
    reference: DrawingSurface,
}

impl Canvas {
    fn build(
        original: Pixmap,
        image_dimensions: Dimensions,
        container_width: u32,
    ) -> Result<Self, MaskError> {
        let size = fitted_dimensions(image_dimensions, container_width);
        let mut reference = DrawingSurface::new(size)?;
        reference.draw_image(&original);
        Ok(Self {
            original,
            image_dimensions,
            surface: reference.clone(),
            reference,
        })
    }

    fn diff(&self) -> Mask {
        Mask::from_fn(self.surface.dimensions(), |x, y| {
            self.surface.differs_at(&self.reference, x, y)
        })
    }
}

#[derive(Debug, Clone, Default)]
enum Stage {
    #[default]
    Unloaded,
    Decoding,
    Ready(Box<Canvas>),
}

/// Turns paint over a displayed image into a binary [`Mask`].
#[derive(Debug, Clone, Default)]
pub struct PixelDiffMasker {
    stage: Stage,
}

impl PixelDiffMasker {
    /// A masker with nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MaskerState {
        match self.stage {
            Stage::Unloaded => MaskerState::Unloaded,
            Stage::Decoding => MaskerState::Decoding,
            Stage::Ready(_) => MaskerState::Ready,
        }
    }

    /// Whether painting is possible.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready(_))
    }

    /// Mark that a new image is being decoded. Any loaded canvas is
    /// dropped and painting stays disabled until [`Self::load`].
    pub fn begin_decode(&mut self) {
        log::debug!("masker: decoding");
        self.stage = Stage::Decoding;
    }

    /// Abandon a decode that failed. Painting stays disabled.
    pub fn fail_decode(&mut self) {
        log::debug!("masker: decode failed");
        self.stage = Stage::Unloaded;
    }

    /// Display `image` as the background and diff reference, scaled to
    /// a container `container_width` pixels wide.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidSurface`] if the image is empty or
    /// the surface cannot be allocated. The masker is then unloaded.
    pub fn load(&mut self, image: &RgbaImage, container_width: u32) -> Result<(), MaskError> {
        let built = pixmap_from_rgba(image).and_then(|original| {
            let dims = Dimensions::new(image.width(), image.height());
            Canvas::build(original, dims, container_width)
        });
        match built {
            Ok(canvas) => {
                log::debug!(
                    "masker: loaded {}x{} image on {:?} surface",
                    image.width(),
                    image.height(),
                    canvas.surface.dimensions()
                );
                self.stage = Stage::Ready(Box::new(canvas));
                Ok(())
            }
            Err(err) => {
                self.stage = Stage::Unloaded;
                Err(err)
            }
        }
    }

    /// Redraw the unpainted image, then show `mask` (if any) as paint.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] unless an image is loaded.
    pub fn restore(&mut self, mask: Option<&Mask>) -> Result<(), MaskError> {
        let canvas = self.canvas_mut()?;
        canvas.surface = canvas.reference.clone();
        let Some(mask) = mask else {
            return Ok(());
        };

        let scaled = mask.resized(canvas.surface.dimensions());
        let Dimensions { width, height } = scaled.dimensions();
        for y in 0..height {
            for x in 0..width {
                if scaled.is_selected(x, y) {
                    canvas.surface.tint(x, y, &canvas.reference);
                }
            }
        }
        log::debug!(
            "masker: restored mask with {} selected pixels",
            mask.selected_pixels()
        );
        Ok(())
    }

    /// Paint a continuous stroke through `points` (surface coordinates).
    ///
    /// Only the visible surface changes; call [`Self::finalize`] to get
    /// the resulting mask.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] unless an image is loaded.
    pub fn paint_stroke(&mut self, points: &[Point], brush: Brush) -> Result<(), MaskError> {
        self.canvas_mut()?.surface.stroke_polyline(points, brush);
        Ok(())
    }

    /// Derive the mask from everything painted so far.
    ///
    /// Every pixel of the result is exactly [`Mask::SELECTED`] or
    /// [`Mask::UNSELECTED`], and the mask has the source image's
    /// dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] unless an image is loaded.
    pub fn finalize(&self) -> Result<Mask, MaskError> {
        let canvas = self.canvas()?;
        let mask = canvas.diff().resized(canvas.image_dimensions);
        log::debug!(
            "masker: finalized mask with {} selected pixels",
            mask.selected_pixels()
        );
        Ok(mask)
    }

    /// Remove all paint. Returns the absent mask.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] unless an image is loaded.
    pub fn clear(&mut self) -> Result<Option<Mask>, MaskError> {
        let canvas = self.canvas_mut()?;
        canvas.surface = canvas.reference.clone();
        log::debug!("masker: cleared");
        Ok(None)
    }

    /// Rebuild the surface for a container `container_width` pixels
    /// wide, carrying the current paint over.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] unless an image is loaded, or
    /// [`MaskError::InvalidSurface`] if the new surface cannot be built.
    /// On error the previous surface is kept.
    pub fn resize(&mut self, container_width: u32) -> Result<(), MaskError> {
        let current = self.finalize()?;
        let canvas = self.canvas()?;
        if canvas.surface.dimensions()
            == fitted_dimensions(canvas.image_dimensions, container_width)
        {
            return Ok(());
        }

        let rebuilt = Canvas::build(
            canvas.original.clone(),
            canvas.image_dimensions,
            container_width,
        )?;
        self.stage = Stage::Ready(Box::new(rebuilt));
        let prior = (!current.is_empty()).then_some(&current);
        self.restore(prior)
    }

    /// Size of the surface, if an image is loaded.
    #[must_use]
    pub fn surface_dimensions(&self) -> Option<Dimensions> {
        self.canvas().ok().map(|c| c.surface.dimensions())
    }

    /// Size of the loaded source image.
    #[must_use]
    pub fn image_dimensions(&self) -> Option<Dimensions> {
        self.canvas().ok().map(|c| c.image_dimensions)
    }

    /// What the user currently sees, as straight-alpha RGBA.
    #[must_use]
    pub fn surface_rgba(&self) -> Option<RgbaImage> {
        self.canvas().ok().map(|c| c.surface.to_rgba())
    }

    fn canvas(&self) -> Result<&Canvas, MaskError> {
        match &self.stage {
            Stage::Ready(canvas) => Ok(canvas),
            Stage::Unloaded | Stage::Decoding => Err(MaskError::NotReady),
        }
    }

    fn canvas_mut(&mut self) -> Result<&mut Canvas, MaskError> {
        match &mut self.stage {
            Stage::Ready(canvas) => Ok(canvas),
            Stage::Unloaded | Stage::Decoding => Err(MaskError::NotReady),
        }
    }
}
