//! Built-in 3x5 bitmap glyphs and text layout metrics
//!
//! Text annotations are composited with simple rectangles rather than a
//! font rasterizer, which keeps flattening deterministic and free of font
//! files. Every metric scales linearly with the font size.

/// Glyph cell columns
pub const GLYPH_COLUMNS: u8 = 3;

/// Glyph cell rows
pub const GLYPH_ROWS: usize = 5;

/// Layout metrics for one font size, in page units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub advance: f32,
    pub glyph_width: f32,
    pub glyph_height: f32,
    pub line_height: f32,
}

impl TextMetrics {
    pub fn for_size(font_size: f32) -> Self {
        let font_size = font_size.max(0.0);
        Self {
            advance: font_size * 0.6,
            glyph_width: font_size * 0.45,
            glyph_height: font_size * 0.75,
            line_height: font_size * 1.2,
        }
    }

    /// Baseline offset of the glyph box within a line.
    pub fn glyph_top(&self) -> f32 {
        (self.line_height - self.glyph_height) / 2.0
    }

    pub fn measure(&self, line: &str) -> f32 {
        line.chars().count() as f32 * self.advance
    }
}

/// Break `content` into lines no wider than `max_width`.
///
/// Explicit newlines always break. Words longer than the width stay on a
/// line of their own. A non-positive width disables wrapping.
pub fn wrap_lines(content: &str, max_width: f32, metrics: &TextMetrics) -> Vec<String> {
    let chars_per_line = if max_width > 0.0 && metrics.advance > 0.0 {
        (max_width / metrics.advance).floor() as usize
    } else {
        usize::MAX
    };

    let mut lines = Vec::new();
    for paragraph in content.split('\n') {
        if chars_per_line == 0 {
            lines.push(paragraph.to_owned());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let current_len = current.chars().count();
            let word_len = word.chars().count();
            if current.is_empty() {
                current = word.to_owned();
            } else if current_len + 1 + word_len <= chars_per_line {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_owned();
            }
        }
        lines.push(current);
    }

    lines
}

/// Row bitmaps for a character; unknown characters are blank.
pub fn pattern(c: char) -> [u8; GLYPH_ROWS] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        '@' => [0b111, 0b101, 0b111, 0b100, 0b111],
        '&' => [0b010, 0b101, 0b010, 0b101, 0b011],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        'a' | 'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'g' | 'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'o' | 'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'p' | 'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'q' | 'Q' => [0b010, 0b101, 0b101, 0b111, 0b011],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        _ => [0b000; GLYPH_ROWS],
    }
}

/// True when `c` has at least one filled cell.
pub fn is_drawable(c: char) -> bool {
    pattern(c).iter().any(|row| *row != 0)
}

/// Filled cells of a glyph as `(column, row)` pairs.
pub fn cells(c: char) -> impl Iterator<Item = (u8, u8)> {
    let rows = pattern(c);
    (0..GLYPH_ROWS as u8).flat_map(move |row| {
        (0..GLYPH_COLUMNS).filter_map(move |col| {
            let bit = (rows[row as usize] >> (GLYPH_COLUMNS - 1 - col)) & 1;
            (bit == 1).then_some((col, row))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_scale_with_font_size() {
        let small = TextMetrics::for_size(10.0);
        let large = TextMetrics::for_size(20.0);
        assert!((large.advance - small.advance * 2.0).abs() < 1e-4);
        assert!((small.line_height - 12.0).abs() < 1e-4);
        assert!(small.glyph_top() > 0.0);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let metrics = TextMetrics::for_size(10.0);
        // 6 units per char, 60 units => 10 chars per line
        let lines = wrap_lines("Add text here please", 60.0, &metrics);
        assert_eq!(lines, vec!["Add text", "here", "please"]);
    }

    #[test]
    fn newlines_break_and_empty_content_has_one_line() {
        let metrics = TextMetrics::for_size(10.0);
        assert_eq!(wrap_lines("a\nb", 0.0, &metrics), vec!["a", "b"]);
        assert_eq!(wrap_lines("", 100.0, &metrics), vec![String::new()]);
    }

    #[test]
    fn glyph_cells_follow_pattern() {
        let one: Vec<_> = cells('1').collect();
        assert!(one.contains(&(1, 0)));
        assert!(one.contains(&(0, 1)));
        assert_eq!(one.len(), 8);
        assert_eq!(cells(' ').count(), 0);
    }
}
