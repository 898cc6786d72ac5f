//! Page-space geometry and colors
//!
//! All annotation coordinates live in unscaled page space: points, origin at
//! the top-left corner of the page, y growing downward. View (pointer)
//! coordinates are page coordinates multiplied by the current zoom scale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Point in unscaled page space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert a pointer position in view pixels to page space.
    pub fn from_view(x: f32, y: f32, scale: f32) -> Self {
        Self { x: x / scale, y: y / scale }
    }

    /// Pixel position of this point at `scale`.
    pub fn to_view(self, scale: f32) -> (f32, f32) {
        (self.x * scale, self.y * scale)
    }

    pub fn distance_to(&self, other: &PagePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Axis-aligned rectangle in unscaled page space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two corners in any order.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn bottom_right(&self) -> PagePoint {
        PagePoint::new(self.right(), self.bottom())
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, point: &PagePoint, tolerance: f32) -> bool {
        point.x >= self.x - tolerance
            && point.x <= self.right() + tolerance
            && point.y >= self.y - tolerance
            && point.y <= self.bottom() + tolerance
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }

    /// Smallest rectangle containing every point, `None` for no points.
    pub fn bounding(points: &[PagePoint]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in points.iter().skip(1) {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Distance check between a point and a line segment
pub(crate) fn point_near_segment(
    point: &PagePoint,
    start: &PagePoint,
    end: &PagePoint,
    tolerance: f32,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-6 {
        return point.distance_to(start) <= tolerance;
    }

    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    let closest = PagePoint::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// RGBA color, written as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };
    /// Yellow at 30% opacity, the highlighter fill
    pub const HIGHLIGHT: Color = Color { r: 255, g: 255, b: 0, a: 77 };
    pub const SLATE: Color = Color { r: 100, g: 116, b: 139, a: 255 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb or #rrggbbaa")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseColorError(value.to_owned());
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return Err(invalid());
        }

        let channel = |index: usize| {
            u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).map_err(|_| invalid())
        };
        let alpha = if hex.len() == 8 { channel(3)? } else { 255 };
        Ok(Self { r: channel(0)?, g: channel(1)?, b: channel(2)?, a: alpha })
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_conversion_divides_by_scale() {
        let point = PagePoint::from_view(30.0, 15.0, 1.5);
        assert_eq!(point, PagePoint::new(20.0, 10.0));
        assert_eq!(point.to_view(2.0), (40.0, 20.0));
    }

    #[test]
    fn rect_from_corners_is_normalized() {
        let rect = PageRect::from_corners(PagePoint::new(50.0, 40.0), PagePoint::new(10.0, 60.0));
        assert_eq!(rect, PageRect::new(10.0, 40.0, 40.0, 20.0));
        assert!(!rect.is_empty());
        assert!(PageRect::new(0.0, 0.0, 0.0, 10.0).is_empty());
    }

    #[test]
    fn bounding_rect_of_points() {
        let rect = PageRect::bounding(&[
            PagePoint::new(3.0, 9.0),
            PagePoint::new(-1.0, 4.0),
            PagePoint::new(7.0, 5.0),
        ])
        .expect("non-empty input");
        assert_eq!(rect, PageRect::new(-1.0, 4.0, 8.0, 5.0));
        assert!(PageRect::bounding(&[]).is_none());
    }

    #[test]
    fn segment_distance() {
        let start = PagePoint::new(0.0, 0.0);
        let end = PagePoint::new(10.0, 0.0);
        assert!(point_near_segment(&PagePoint::new(5.0, 1.0), &start, &end, 2.0));
        assert!(!point_near_segment(&PagePoint::new(5.0, 3.0), &start, &end, 2.0));
        assert!(!point_near_segment(&PagePoint::new(14.0, 0.0), &start, &end, 2.0));
    }

    #[test]
    fn color_hex_parsing() {
        assert_eq!("#ff8000".parse::<Color>(), Ok(Color::rgb(255, 128, 0)));
        assert_eq!("#ffff004d".parse::<Color>(), Ok(Color::HIGHLIGHT));
        assert!("ff8000".parse::<Color>().is_err());
        assert!("#ff80".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert_eq!(Color::HIGHLIGHT.to_hex(), "#ffff004d");
    }

    #[test]
    fn color_serde_uses_hex_strings() {
        let json = serde_json::to_string(&Color::rgb(0x1e, 0x29, 0x3b)).expect("serialize");
        assert_eq!(json, "\"#1e293b\"");
        let color: Color = serde_json::from_str("\"#DC2626\"").expect("deserialize");
        assert_eq!(color, Color::rgb(0xdc, 0x26, 0x26));
    }
}
