//! Pointer input to brush strokes.
//!
//! Pointer positions arrive in client coordinates. The controller
//! subtracts the surface's on-screen origin, paints each new segment as
//! soon as it arrives, and finalizes the mask when the stroke ends.

use crate::mask::{Mask, MaskError};
use crate::masker::PixelDiffMasker;
use crate::types::{Brush, Point};

/// Tracks the stroke in progress on one drawing surface.
#[derive(Debug, Clone, Default)]
pub struct StrokeInput {
    origin: Point,
    active: Option<Vec<Point>>,
}

impl StrokeInput {
    /// A controller for a surface whose top-left corner is at `origin`
    /// in client coordinates.
    #[must_use]
    pub const fn new(origin: Point) -> Self {
        Self {
            origin,
            active: None,
        }
    }

    /// On-screen origin of the surface.
    #[must_use]
    pub const fn origin(&self) -> Point {
        self.origin
    }

    /// Move the surface's on-screen origin (e.g. after layout changes).
    pub const fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Points of the stroke in progress, in surface coordinates.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.active.as_deref().unwrap_or_default()
    }

    /// Start a stroke at `client`. A stroke already in progress is
    /// discarded without finalizing.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] if the masker has no image.
    pub fn begin(&mut self, client: Point, masker: &PixelDiffMasker) -> Result<(), MaskError> {
        if !masker.is_ready() {
            return Err(MaskError::NotReady);
        }
        self.active = Some(vec![client.relative_to(self.origin)]);
        Ok(())
    }

    /// Add `client` to the stroke and paint the new segment.
    ///
    /// Does nothing when no stroke is active or the pointer has not
    /// moved.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] if the masker has no image.
    pub fn extend(
        &mut self,
        client: Point,
        masker: &mut PixelDiffMasker,
        brush: Brush,
    ) -> Result<(), MaskError> {
        let Some(points) = self.active.as_mut() else {
            return Ok(());
        };
        let next = client.relative_to(self.origin);
        let Some(&last) = points.last() else {
            points.push(next);
            return Ok(());
        };
        if last == next {
            return Ok(());
        }
        masker.paint_stroke(&[last, next], brush)?;
        points.push(next);
        Ok(())
    }

    /// Close the stroke and finalize the mask.
    ///
    /// Returns `Ok(None)` when no stroke was active, so stray pointer-up
    /// and pointer-leave events are harmless. A tap (no movement) still
    /// finalizes.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::NotReady`] if the masker lost its image
    /// while the stroke was open.
    pub fn end(&mut self, masker: &PixelDiffMasker) -> Result<Option<Mask>, MaskError> {
        let Some(points) = self.active.take() else {
            return Ok(None);
        };
        log::debug!("stroke ended after {} points", points.len());
        masker.finalize().map(Some)
    }

    /// Pointer-leave / touch-cancel. Same as [`Self::end`].
    ///
    /// # Errors
    ///
    /// See [`Self::end`].
    pub fn cancel(&mut self, masker: &PixelDiffMasker) -> Result<Option<Mask>, MaskError> {
        self.end(masker)
    }
}
