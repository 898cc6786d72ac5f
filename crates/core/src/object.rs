//! Annotation object model
//!
//! Every object on a page is one [`AnnotationObject`] variant. Geometry is
//! stored in unscaled page coordinates so objects keep their place on the
//! page when the zoom changes.

use crate::geometry::{point_near_segment, Color, PagePoint, PageRect};
use crate::glyphs::{wrap_lines, TextMetrics};
use inkseal_raster::Bitmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for an object on a surface
///
/// Generated using UUID v4, never reused within a session.
pub type ObjectId = uuid::Uuid;

/// Flavor of a rectangular shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Translucent marker fill
    Highlight,
    /// Opaque cover that hides page content in the export
    Redact,
    /// Bordered frame, used by text boxes
    Box,
}

/// Character formatting for text objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub color: Color,
    /// Carried for callers that render with real fonts; the built-in
    /// compositor draws every family with the same glyphs.
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            font_family: "Arial".to_owned(),
            font_size: 14.0,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

impl TextStyle {
    pub fn metrics(&self) -> TextMetrics {
        TextMetrics::for_size(self.font_size)
    }
}

/// Image placed by a stamp, shared with the signature asset it came from
#[derive(Clone)]
pub struct StampSource {
    pub asset_id: Option<uuid::Uuid>,
    pub image: Arc<Bitmap>,
}

impl StampSource {
    pub fn new(image: Arc<Bitmap>) -> Self {
        Self { asset_id: None, image }
    }

    pub fn from_asset(asset_id: uuid::Uuid, image: Arc<Bitmap>) -> Self {
        Self { asset_id: Some(asset_id), image }
    }
}

impl PartialEq for StampSource {
    fn eq(&self, other: &Self) -> bool {
        self.asset_id == other.asset_id
            && (Arc::ptr_eq(&self.image, &other.image) || *self.image == *other.image)
    }
}

impl fmt::Debug for StampSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampSource")
            .field("asset_id", &self.asset_id)
            .field("image", &self.image.dimensions())
            .finish()
    }
}

/// One vector object on an annotation surface
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationObject {
    /// Freehand stroke through `points`
    Ink {
        points: Vec<PagePoint>,
        stroke_color: Color,
        stroke_width: f32,
    },

    /// Filled rectangle with an optional border
    Shape {
        kind: ShapeKind,
        rect: PageRect,
        fill_color: Color,
        stroke_color: Option<Color>,
        stroke_width: Option<f32>,
    },

    /// Text anchored at its top-left corner, wrapped to `width`
    Text {
        origin: PagePoint,
        content: String,
        style: TextStyle,
        width: f32,
    },

    /// Image anchored at its top-left corner
    ImageStamp {
        origin: PagePoint,
        scale_x: f32,
        scale_y: f32,
        source: StampSource,
    },
}

impl AnnotationObject {
    pub fn ink(points: Vec<PagePoint>, stroke_color: Color, stroke_width: f32) -> Self {
        Self::Ink { points, stroke_color, stroke_width }
    }

    /// Borderless shape filled with `fill_color`.
    pub fn shape(kind: ShapeKind, rect: PageRect, fill_color: Color) -> Self {
        Self::Shape { kind, rect, fill_color, stroke_color: None, stroke_width: None }
    }

    pub fn bordered_box(rect: PageRect, fill_color: Color, stroke_color: Color, stroke_width: f32) -> Self {
        Self::Shape {
            kind: ShapeKind::Box,
            rect,
            fill_color,
            stroke_color: Some(stroke_color),
            stroke_width: Some(stroke_width),
        }
    }

    pub fn text(origin: PagePoint, content: impl Into<String>, style: TextStyle, width: f32) -> Self {
        Self::Text { origin, content: content.into(), style, width }
    }

    pub fn stamp(origin: PagePoint, scale: f32, source: StampSource) -> Self {
        Self::ImageStamp { origin, scale_x: scale, scale_y: scale, source }
    }

    /// Short variant name, used in logs and CLI output
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnnotationObject::Ink { .. } => "ink",
            AnnotationObject::Shape { kind: ShapeKind::Highlight, .. } => "highlight",
            AnnotationObject::Shape { kind: ShapeKind::Redact, .. } => "redact",
            AnnotationObject::Shape { kind: ShapeKind::Box, .. } => "box",
            AnnotationObject::Text { .. } => "text",
            AnnotationObject::ImageStamp { .. } => "image_stamp",
        }
    }

    /// Whether flattening this object changes any pixel.
    ///
    /// Malformed objects (no points, no area, blank text, empty images) stay
    /// on the surface but are skipped by the compositor.
    pub fn is_drawable(&self) -> bool {
        match self {
            AnnotationObject::Ink { points, stroke_color, stroke_width } => {
                !points.is_empty() && *stroke_width > 0.0 && !stroke_color.is_transparent()
            }
            AnnotationObject::Shape { rect, .. } => !rect.is_empty(),
            AnnotationObject::Text { content, style, .. } => {
                !content.trim().is_empty() && style.font_size > 0.0
            }
            AnnotationObject::ImageStamp { scale_x, scale_y, source, .. } => {
                let (width, height) = source.image.dimensions();
                width > 0 && height > 0 && *scale_x > 0.0 && *scale_y > 0.0
            }
        }
    }

    /// Laid out lines of a text object, empty for other variants.
    pub fn text_lines(&self) -> Vec<String> {
        match self {
            AnnotationObject::Text { content, style, width, .. } => {
                wrap_lines(content, *width, &style.metrics())
            }
            _ => Vec::new(),
        }
    }

    /// Area covered by the object, `None` when there is nothing to cover.
    pub fn bounds(&self) -> Option<PageRect> {
        match self {
            AnnotationObject::Ink { points, stroke_width, .. } => {
                let half = stroke_width.max(0.0) / 2.0;
                PageRect::bounding(points).map(|rect| {
                    PageRect::new(rect.x - half, rect.y - half, rect.width + half * 2.0, rect.height + half * 2.0)
                })
            }
            AnnotationObject::Shape { rect, .. } => Some(*rect),
            AnnotationObject::Text { origin, style, width, .. } => {
                let metrics = style.metrics();
                let lines = self.text_lines();
                let widest = lines.iter().map(|line| metrics.measure(line)).fold(0.0, f32::max);
                let height = lines.len().max(1) as f32 * metrics.line_height;
                Some(PageRect::new(origin.x, origin.y, width.max(widest), height))
            }
            AnnotationObject::ImageStamp { origin, scale_x, scale_y, source } => {
                let (width, height) = source.image.dimensions();
                Some(PageRect::new(
                    origin.x,
                    origin.y,
                    width as f32 * scale_x,
                    height as f32 * scale_y,
                ))
            }
        }
    }

    /// Check if a page point is on this object (within tolerance)
    ///
    /// Ink is hit along its stroke; every other variant anywhere inside its
    /// bounds.
    pub fn hit_test(&self, point: &PagePoint, tolerance: f32) -> bool {
        match self {
            AnnotationObject::Ink { points, stroke_width, .. } => {
                let reach = tolerance + stroke_width.max(0.0) / 2.0;
                match points.as_slice() {
                    [] => false,
                    [only] => point.distance_to(only) <= reach,
                    _ => points
                        .windows(2)
                        .any(|pair| point_near_segment(point, &pair[0], &pair[1], reach)),
                }
            }
            _ => self.bounds().is_some_and(|bounds| bounds.contains(point, tolerance)),
        }
    }

    /// Move the object by `(dx, dy)` page units.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            AnnotationObject::Ink { points, .. } => {
                for point in points.iter_mut() {
                    *point = point.offset(dx, dy);
                }
            }
            AnnotationObject::Shape { rect, .. } => *rect = rect.translated(dx, dy),
            AnnotationObject::Text { origin, .. } | AnnotationObject::ImageStamp { origin, .. } => {
                *origin = origin.offset(dx, dy);
            }
        }
    }

    /// Anchor point: first ink point, rect corner or origin
    pub fn anchor(&self) -> Option<PagePoint> {
        match self {
            AnnotationObject::Ink { points, .. } => points.first().copied(),
            AnnotationObject::Shape { rect, .. } => Some(PagePoint::new(rect.x, rect.y)),
            AnnotationObject::Text { origin, .. } | AnnotationObject::ImageStamp { origin, .. } => {
                Some(*origin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp_image(width: u32, height: u32) -> Arc<Bitmap> {
        Arc::new(Bitmap::from_pixel(width, height, image::Rgba([0, 0, 0, 255])))
    }

    #[test]
    fn ink_hit_test_follows_stroke() {
        let ink = AnnotationObject::ink(
            vec![PagePoint::new(10.0, 10.0), PagePoint::new(20.0, 20.0), PagePoint::new(30.0, 10.0)],
            Color::BLACK,
            2.0,
        );

        assert!(ink.hit_test(&PagePoint::new(15.0, 15.0), 2.0));
        assert!(ink.hit_test(&PagePoint::new(25.0, 16.0), 2.0));
        assert!(!ink.hit_test(&PagePoint::new(20.0, 10.0), 2.0));
    }

    #[test]
    fn single_point_ink_hits_near_point() {
        let dot = AnnotationObject::ink(vec![PagePoint::new(5.0, 5.0)], Color::BLACK, 4.0);
        assert!(dot.hit_test(&PagePoint::new(7.0, 5.0), 1.0));
        assert!(!dot.hit_test(&PagePoint::new(10.0, 5.0), 1.0));
        assert!(dot.is_drawable());
    }

    #[test]
    fn ink_bounds_include_half_stroke() {
        let ink = AnnotationObject::ink(
            vec![PagePoint::new(10.0, 10.0), PagePoint::new(30.0, 20.0)],
            Color::BLACK,
            4.0,
        );
        assert_eq!(ink.bounds(), Some(PageRect::new(8.0, 8.0, 24.0, 14.0)));
        assert!(AnnotationObject::ink(Vec::new(), Color::BLACK, 2.0).bounds().is_none());
    }

    #[test]
    fn shape_hit_test_covers_area() {
        let shape = AnnotationObject::shape(
            ShapeKind::Redact,
            PageRect::new(50.0, 50.0, 100.0, 30.0),
            Color::BLACK,
        );
        assert!(shape.hit_test(&PagePoint::new(100.0, 60.0), 0.0));
        assert!(shape.hit_test(&PagePoint::new(152.0, 60.0), 3.0));
        assert!(!shape.hit_test(&PagePoint::new(160.0, 60.0), 3.0));
    }

    #[test]
    fn text_bounds_grow_with_wrapped_lines() {
        let style = TextStyle { font_size: 10.0, ..TextStyle::default() };
        let short = AnnotationObject::text(PagePoint::new(0.0, 0.0), "hello", style.clone(), 60.0);
        let long = AnnotationObject::text(
            PagePoint::new(0.0, 0.0),
            "hello there general kenobi",
            style,
            60.0,
        );

        let short_bounds = short.bounds().expect("text has bounds");
        let long_bounds = long.bounds().expect("text has bounds");
        assert_eq!(short_bounds.width, 60.0);
        assert!(long_bounds.height > short_bounds.height);
    }

    #[test]
    fn translate_moves_every_variant() {
        let mut objects = vec![
            AnnotationObject::ink(vec![PagePoint::new(1.0, 1.0)], Color::BLACK, 1.0),
            AnnotationObject::shape(ShapeKind::Highlight, PageRect::new(0.0, 0.0, 10.0, 10.0), Color::HIGHLIGHT),
            AnnotationObject::text(PagePoint::new(2.0, 2.0), "x", TextStyle::default(), 50.0),
            AnnotationObject::stamp(PagePoint::new(3.0, 3.0), 1.0, StampSource::new(stamp_image(4, 4))),
        ];

        for object in objects.iter_mut() {
            let before = object.anchor().expect("anchor");
            object.translate(5.0, -1.0);
            let after = object.anchor().expect("anchor");
            assert_eq!(after, before.offset(5.0, -1.0));
        }
    }

    #[test]
    fn degenerate_objects_are_not_drawable() {
        assert!(!AnnotationObject::shape(ShapeKind::Box, PageRect::new(0.0, 0.0, 0.0, 5.0), Color::BLACK)
            .is_drawable());
        assert!(!AnnotationObject::text(PagePoint::default(), "   ", TextStyle::default(), 100.0)
            .is_drawable());
        assert!(!AnnotationObject::ink(vec![PagePoint::default()], Color::BLACK, 0.0).is_drawable());
        assert!(!AnnotationObject::stamp(PagePoint::default(), 0.0, StampSource::new(stamp_image(2, 2)))
            .is_drawable());
    }

    #[test]
    fn stamp_bounds_follow_image_scale() {
        let stamp = AnnotationObject::stamp(
            PagePoint::new(10.0, 20.0),
            0.5,
            StampSource::new(stamp_image(400, 100)),
        );
        assert_eq!(stamp.bounds(), Some(PageRect::new(10.0, 20.0, 200.0, 50.0)));
        assert_eq!(stamp.kind_name(), "image_stamp");
    }
}
