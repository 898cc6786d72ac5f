//! Flattening annotation objects onto page bitmaps
//!
//! A [`Compositor`] paints objects, in z-order, onto a copy of a page
//! bitmap. Object coordinates are unscaled page units; the compositor maps
//! them to pixels with the render scale of the base bitmap.

use crate::geometry::{Color, PagePoint};
use crate::glyphs::{cells, GLYPH_COLUMNS, GLYPH_ROWS};
use crate::object::{AnnotationObject, StampSource, TextStyle};
use inkseal_raster::Bitmap;
use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

/// Horizontal shear applied to italic glyphs
const ITALIC_SHEAR: f32 = 0.2;

/// Glyph cell widening for bold text
const BOLD_WIDEN: f32 = 1.35;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositeError {
    #[error("base bitmap is empty ({width}x{height})")]
    EmptyBase { width: u32, height: u32 },
    #[error("invalid flatten scale {0}")]
    InvalidScale(f32),
    #[error("failed to allocate a {width}x{height} canvas")]
    Allocation { width: u32, height: u32 },
}

/// Rasterization backend used by flatten
pub trait Compositor: Send + Sync {
    /// Paint `objects` (bottom first) onto a copy of `base`.
    fn composite(
        &self,
        base: &Bitmap,
        objects: &[&AnnotationObject],
        scale: f32,
    ) -> Result<Bitmap, CompositeError>;
}

/// Anti-aliased compositor built on tiny-skia
#[derive(Debug, Clone, Copy, Default)]
pub struct SkiaCompositor;

impl Compositor for SkiaCompositor {
    fn composite(
        &self,
        base: &Bitmap,
        objects: &[&AnnotationObject],
        scale: f32,
    ) -> Result<Bitmap, CompositeError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CompositeError::InvalidScale(scale));
        }
        let (width, height) = base.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositeError::EmptyBase { width, height });
        }

        let drawable: Vec<&AnnotationObject> =
            objects.iter().copied().filter(|object| object.is_drawable()).collect();
        if drawable.is_empty() {
            return Ok(base.clone());
        }

        let mut pixmap = to_pixmap(base)?;
        let transform = Transform::from_scale(scale, scale);
        for object in drawable {
            draw_object(&mut pixmap, object, transform);
        }

        from_pixmap(&pixmap)
    }
}

fn draw_object(pixmap: &mut Pixmap, object: &AnnotationObject, transform: Transform) {
    match object {
        AnnotationObject::Ink { points, stroke_color, stroke_width } => {
            draw_ink(pixmap, points, *stroke_color, *stroke_width, transform);
        }
        AnnotationObject::Shape { rect, fill_color, stroke_color, stroke_width, .. } => {
            let Some(sk_rect) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
                return;
            };
            if !fill_color.is_transparent() {
                pixmap.fill_rect(sk_rect, &paint(*fill_color), transform, None);
            }
            if let (Some(color), Some(width)) = (stroke_color, stroke_width) {
                if *width > 0.0 && !color.is_transparent() {
                    let path = PathBuilder::from_rect(sk_rect);
                    let stroke = Stroke { width: *width, ..Stroke::default() };
                    pixmap.stroke_path(&path, &paint(*color), &stroke, transform, None);
                }
            }
        }
        AnnotationObject::Text { origin, style, .. } => {
            draw_text(pixmap, *origin, &object.text_lines(), style, transform);
        }
        AnnotationObject::ImageStamp { origin, scale_x, scale_y, source } => {
            draw_stamp(pixmap, *origin, *scale_x, *scale_y, source, transform);
        }
    }
}

fn draw_ink(
    pixmap: &mut Pixmap,
    points: &[PagePoint],
    color: Color,
    width: f32,
    transform: Transform,
) {
    let paint = paint(color);

    if let [only] = points {
        if let Some(dot) = PathBuilder::from_circle(only.x, only.y, width / 2.0) {
            pixmap.fill_path(&dot, &paint, FillRule::Winding, transform, None);
        }
        return;
    }

    let mut builder = PathBuilder::new();
    for (index, point) in points.iter().enumerate() {
        if index == 0 {
            builder.move_to(point.x, point.y);
        } else {
            builder.line_to(point.x, point.y);
        }
    }

    if let Some(path) = builder.finish() {
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, transform, None);
    }
}

fn draw_text(
    pixmap: &mut Pixmap,
    origin: PagePoint,
    lines: &[String],
    style: &TextStyle,
    transform: Transform,
) {
    let metrics = style.metrics();
    let paint = paint(style.color);
    let cell_width = metrics.glyph_width / GLYPH_COLUMNS as f32;
    let cell_height = metrics.glyph_height / GLYPH_ROWS as f32;
    let ink_width = if style.bold { cell_width * BOLD_WIDEN } else { cell_width };

    for (line_index, line) in lines.iter().enumerate() {
        let top = origin.y + line_index as f32 * metrics.line_height + metrics.glyph_top();
        let baseline = top + metrics.glyph_height;

        let mut builder = PathBuilder::new();
        for (char_index, c) in line.chars().enumerate() {
            let left = origin.x + char_index as f32 * metrics.advance;
            for (col, row) in cells(c) {
                let x = left + col as f32 * cell_width;
                let y = top + row as f32 * cell_height;
                if let Some(cell) = Rect::from_xywh(x, y, ink_width, cell_height) {
                    builder.push_rect(cell);
                }
            }
        }

        if style.underline {
            let thickness = (style.font_size * 0.07).max(0.5);
            let rect = Rect::from_xywh(
                origin.x,
                baseline + cell_height * 0.5,
                metrics.measure(line),
                thickness,
            );
            if let Some(rect) = rect {
                builder.push_rect(rect);
            }
        }

        let Some(path) = builder.finish() else {
            continue;
        };

        let line_transform = if style.italic {
            // Lean right above the baseline, keep the baseline in place.
            let shear =
                Transform::from_row(1.0, 0.0, -ITALIC_SHEAR, 1.0, ITALIC_SHEAR * baseline, 0.0);
            transform.pre_concat(shear)
        } else {
            transform
        };
        pixmap.fill_path(&path, &paint, FillRule::Winding, line_transform, None);
    }
}

fn draw_stamp(
    pixmap: &mut Pixmap,
    origin: PagePoint,
    scale_x: f32,
    scale_y: f32,
    source: &StampSource,
    transform: Transform,
) {
    let Ok(image) = to_pixmap(&source.image) else {
        tracing::warn!(asset = ?source.asset_id, "skipping stamp with unusable image");
        return;
    };

    let placement = Transform::from_row(scale_x, 0.0, 0.0, scale_y, origin.x, origin.y);
    let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform.pre_concat(placement), None);
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// Copy a straight-alpha bitmap into a premultiplied pixmap.
fn to_pixmap(bitmap: &Bitmap) -> Result<Pixmap, CompositeError> {
    let (width, height) = bitmap.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or(CompositeError::Allocation { width, height })?;

    for (src, dst) in bitmap.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let alpha = src[3];
        dst[0] = premultiply(src[0], alpha);
        dst[1] = premultiply(src[1], alpha);
        dst[2] = premultiply(src[2], alpha);
        dst[3] = alpha;
    }

    Ok(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> Result<Bitmap, CompositeError> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Bitmap::from_raw(width, height, raw).ok_or(CompositeError::Allocation { width, height })
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    let product = (channel as u16) * (alpha as u16) + 127;
    ((product + (product >> 8)) >> 8) as u8
}
