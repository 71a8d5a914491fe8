//! The raster the user paints on.
//!
//! A [`DrawingSurface`] is a `tiny-skia` pixmap sized to the on-screen
//! container. It shows the source image scaled to fill it, and strokes
//! are drawn over that in a translucent red highlight.

use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FilterQuality, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    PremultipliedColorU8, Stroke, Transform,
};

use crate::mask::MaskError;
use crate::types::{Brush, Dimensions, Point};

/// Highlight colour for painted strokes: red at 50% opacity.
pub const HIGHLIGHT: [u8; 4] = [255, 0, 0, 128];

/// Size of the surface for an image shown in a container `container_width`
/// pixels wide, preserving the image's aspect ratio.
///
/// Height is `floor(container_width * image.height / image.width)`. Both
/// sides are at least one pixel.
#[must_use]
pub fn fitted_dimensions(image: Dimensions, container_width: u32) -> Dimensions {
    let width = container_width.max(1);
    if image.width == 0 {
        return Dimensions::new(width, 1);
    }
    let height = u64::from(width) * u64::from(image.height) / u64::from(image.width);
    let height = u32::try_from(height).unwrap_or(u32::MAX).max(1);
    Dimensions::new(width, height)
}

/// Convert a straight-alpha RGBA raster into a premultiplied pixmap.
///
/// # Errors
///
/// Returns [`MaskError::InvalidSurface`] for a zero-sized image.
pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, MaskError> {
    let invalid = || MaskError::InvalidSurface {
        width: image.width(),
        height: image.height(),
    };
    let size = IntSize::from_wh(image.width(), image.height()).ok_or_else(invalid)?;

    let mut data = Vec::with_capacity(image.as_raw().len());
    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        let pre = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[pre.red(), pre.green(), pre.blue(), pre.alpha()]);
    }
    Pixmap::from_vec(data, size).ok_or_else(invalid)
}

/// A paintable raster.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingSurface {
    pixmap: Pixmap,
}

impl DrawingSurface {
    /// Allocate a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidSurface`] if either side is zero or
    /// the size is too large to allocate.
    pub fn new(dimensions: Dimensions) -> Result<Self, MaskError> {
        let pixmap = Pixmap::new(dimensions.width, dimensions.height).ok_or(
            MaskError::InvalidSurface {
                width: dimensions.width,
                height: dimensions.height,
            },
        )?;
        Ok(Self { pixmap })
    }

    /// Surface size in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixmap.width(), self.pixmap.height())
    }

    /// Replace the contents with `image` scaled to fill the surface.
    ///
    /// Rendering is deterministic, so two surfaces of the same size
    /// drawn from the same image hold identical pixels.
    #[allow(clippy::cast_precision_loss)]
    pub fn draw_image(&mut self, image: &Pixmap) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        let sx = self.pixmap.width() as f32 / image.width() as f32;
        let sy = self.pixmap.height() as f32 / image.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            Transform::from_scale(sx, sy),
            None,
        );
    }

    /// Stroke a continuous line through `points` in the highlight colour.
    ///
    /// Fewer than two points draws nothing.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn stroke_polyline(&mut self, points: &[Point], brush: Brush) {
        let [first, rest @ ..] = points else {
            return;
        };
        if rest.is_empty() {
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(first.x as f32, first.y as f32);
        for p in rest {
            pb.line_to(p.x as f32, p.y as f32);
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let stroke = Stroke {
            width: brush.size_px() as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };

        let [r, g, b, a] = HIGHLIGHT;
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;

        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Composite the highlight colour over the pixel at `(x, y)` and make
    /// sure the result no longer matches `reference` at that pixel.
    ///
    /// Painting translucent red over a pixel that is already pure red
    /// leaves it unchanged, so such pixels get their green channel moved
    /// by the smallest step that changes the visible colour.
    pub fn tint(&mut self, x: u32, y: u32, reference: &Self) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        let target = reference.rgb_at(x, y);
        let pixels = self.pixmap.pixels_mut();
        let tinted = over(HIGHLIGHT, pixels[idx]);
        pixels[idx] = tinted;
        if rgb(tinted) != target {
            return;
        }

        let (r, g, b, a) = (tinted.red(), tinted.green(), tinted.blue(), tinted.alpha());
        for delta in [1_i16, -1, 2, -2, 3, -3] {
            let Ok(g) = u8::try_from(i16::from(g) + delta) else {
                continue;
            };
            if let Some(candidate) = PremultipliedColorU8::from_rgba(r, g, b, a)
                && rgb(candidate) != target
            {
                pixels[idx] = candidate;
                return;
            }
        }
    }

    /// Straight (demultiplied) RGB at `(x, y)`; out of range reads black.
    #[must_use]
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixmap.pixel(x, y).map_or([0, 0, 0], rgb)
    }

    /// Whether the visible colour at `(x, y)` differs from `other`.
    #[must_use]
    pub fn differs_at(&self, other: &Self, x: u32, y: u32) -> bool {
        self.rgb_at(x, y) != other.rgb_at(x, y)
    }

    /// Copy the surface out as straight-alpha RGBA.
    #[must_use]
    pub fn to_rgba(&self) -> RgbaImage {
        let Dimensions { width, height } = self.dimensions();
        RgbaImage::from_fn(width, height, |x, y| {
            self.pixmap.pixel(x, y).map_or(Rgba([0, 0, 0, 0]), |p| {
                let c = p.demultiply();
                Rgba([c.red(), c.green(), c.blue(), c.alpha()])
            })
        })
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.pixmap.width() || y >= self.pixmap.height() {
            return None;
        }
        usize::try_from(u64::from(y) * u64::from(self.pixmap.width()) + u64::from(x)).ok()
    }
}

fn rgb(p: PremultipliedColorU8) -> [u8; 3] {
    let c = p.demultiply();
    [c.red(), c.green(), c.blue()]
}

/// Source-over of a straight-alpha colour onto a premultiplied pixel.
fn over(src: [u8; 4], dst: PremultipliedColorU8) -> PremultipliedColorU8 {
    let sa = u32::from(src[3]);
    let inv = 255 - sa;
    let blend = |s: u8, d: u8| -> u8 {
        let s = (u32::from(s) * sa + 127) / 255;
        let d = (u32::from(d) * inv + 127) / 255;
        u8::try_from((s + d).min(255)).unwrap_or(u8::MAX)
    };
    let a = blend(255, dst.alpha());
    let r = blend(src[0], dst.red()).min(a);
    let g = blend(src[1], dst.green()).min(a);
    let b = blend(src[2], dst.blue()).min(a);
    PremultipliedColorU8::from_rgba(r, g, b, a).unwrap_or(dst)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Pixmap {
        pixmap_from_rgba(&RgbaImage::from_pixel(width, height, Rgba(rgba))).unwrap()
    }

    fn close(actual: [u8; 3], expected: [u8; 3]) -> bool {
        actual
            .iter()
            .zip(expected)
            .all(|(&a, e)| a.abs_diff(e) <= 1)
    }

    fn surface_with(image: &Pixmap, dimensions: Dimensions) -> DrawingSurface {
        let mut surface = DrawingSurface::new(dimensions).unwrap();
        surface.draw_image(image);
        surface
    }

    #[test]
    fn fitted_height_preserves_aspect_ratio() {
        assert_eq!(
            fitted_dimensions(Dimensions::new(400, 300), 200),
            Dimensions::new(200, 150)
        );
        assert_eq!(
            fitted_dimensions(Dimensions::new(3, 2), 100),
            Dimensions::new(100, 66)
        );
    }

    #[test]
    fn fitted_dimensions_are_never_zero() {
        assert_eq!(
            fitted_dimensions(Dimensions::new(1000, 1), 10),
            Dimensions::new(10, 1)
        );
        assert_eq!(
            fitted_dimensions(Dimensions::new(10, 10), 0),
            Dimensions::new(1, 1)
        );
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert_eq!(
            DrawingSurface::new(Dimensions::new(0, 5)),
            Err(MaskError::InvalidSurface {
                width: 0,
                height: 5
            })
        );
    }

    #[test]
    fn scaled_solid_image_fills_surface() {
        let image = solid(4, 4, [10, 200, 30, 255]);
        let surface = surface_with(&image, Dimensions::new(16, 16));
        assert!(close(surface.rgb_at(0, 0), [10, 200, 30]));
        assert!(close(surface.rgb_at(15, 15), [10, 200, 30]));
    }

    #[test]
    fn identical_renderings_do_not_differ() {
        let image = pixmap_from_rgba(&RgbaImage::from_fn(7, 5, |x, y| {
            Rgba([(x * 30) as u8, (y * 40) as u8, 90, 255])
        }))
        .unwrap();
        let a = surface_with(&image, Dimensions::new(23, 16));
        let b = surface_with(&image, Dimensions::new(23, 16));
        assert_eq!(a, b);
    }

    #[test]
    fn stroke_changes_pixels_under_brush_only() {
        let image = solid(50, 50, [0, 0, 255, 255]);
        let reference = surface_with(&image, Dimensions::new(50, 50));
        let mut surface = reference.clone();
        surface.stroke_polyline(
            &[Point::new(5.0, 25.0), Point::new(45.0, 25.0)],
            Brush::new(6).unwrap(),
        );
        assert!(surface.differs_at(&reference, 25, 25));
        assert!(!surface.differs_at(&reference, 25, 5));
    }

    #[test]
    fn single_point_stroke_draws_nothing() {
        let image = solid(10, 10, [0, 0, 255, 255]);
        let reference = surface_with(&image, Dimensions::new(10, 10));
        let mut surface = reference.clone();
        surface.stroke_polyline(&[Point::new(5.0, 5.0)], Brush::default());
        assert_eq!(surface, reference);
    }

    #[test]
    fn tint_is_visible_on_ordinary_pixels() {
        let image = solid(2, 2, [0, 0, 255, 255]);
        let reference = surface_with(&image, Dimensions::new(2, 2));
        let mut surface = reference.clone();
        surface.tint(1, 1, &reference);
        assert!(close(surface.rgb_at(1, 1), [128, 0, 127]));
        assert!(surface.differs_at(&reference, 1, 1));
        assert!(!surface.differs_at(&reference, 0, 0));
    }

    #[test]
    fn tint_is_visible_on_pure_red_pixels() {
        let image = solid(2, 2, [255, 0, 0, 255]);
        let reference = surface_with(&image, Dimensions::new(2, 2));
        let mut surface = reference.clone();
        surface.tint(0, 0, &reference);
        assert!(surface.differs_at(&reference, 0, 0));
    }

    #[test]
    fn tint_is_visible_on_transparent_pixels() {
        let image = solid(2, 2, [0, 0, 0, 0]);
        let reference = surface_with(&image, Dimensions::new(2, 2));
        let mut surface = reference.clone();
        surface.tint(0, 1, &reference);
        assert!(surface.differs_at(&reference, 0, 1));
    }

    #[test]
    fn rgba_export_is_straight_alpha() {
        let image = solid(1, 1, [200, 100, 50, 255]);
        let surface = surface_with(&image, Dimensions::new(1, 1));
        let [r, g, b, a] = surface.to_rgba().get_pixel(0, 0).0;
        assert!(close([r, g, b], [200, 100, 50]));
        assert_eq!(a, 255);
    }
}
