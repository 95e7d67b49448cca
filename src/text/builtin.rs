//! Built-in 5x7 bitmap font, the last link of the font fallback chain.
//!
//! Lowercase letters render with the uppercase glyphs. Characters outside
//! printable ASCII render as a hollow box.

use image::{GrayImage, Luma};

use crate::geometry::TextSize;
use crate::text::raster::GlyphMask;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const ADVANCE: u32 = 6;
const CELL_H: u32 = 8;

const MISSING: [u8; 7] = [
    0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111,
];

// Rows top to bottom, bit 4 is the leftmost column. Covers ' ' ..= '`'.
const ASCII: [[u8; 7]; 65] = [
    [0, 0, 0, 0, 0, 0, 0],                                     // ' '
    [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0, 0b00100], // !
    [0b01010, 0b01010, 0b01010, 0, 0, 0, 0],                   // "
    [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010], // #
    [0b00100, 0b01111, 0b10100, 0b01110, 0b00101, 0b11110, 0b00100], // $
    [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011], // %
    [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101], // &
    [0b00100, 0b00100, 0b01000, 0, 0, 0, 0],                   // '
    [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010], // (
    [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000], // )
    [0, 0b00100, 0b10101, 0b01110, 0b10101, 0b00100, 0],       // *
    [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0],       // +
    [0, 0, 0, 0, 0b01100, 0b00100, 0b01000],                   // ,
    [0, 0, 0, 0b11111, 0, 0, 0],                               // -
    [0, 0, 0, 0, 0, 0b01100, 0b01100],                         // .
    [0, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0],       // /
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111], // 2
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110], // 3
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110], // 5
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000], // 7
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100], // 9
    [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],             // :
    [0, 0b01100, 0b01100, 0, 0b01100, 0b00100, 0b01000],       // ;
    [0b00010, 0b00100, 0b01000, 0b10000, 0b01000, 0b00100, 0b00010], // <
    [0, 0, 0b11111, 0, 0b11111, 0, 0],                         // =
    [0b01000, 0b00100, 0b00010, 0b00001, 0b00010, 0b00100, 0b01000], // >
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100], // ?
    [0b01110, 0b10001, 0b00001, 0b01101, 0b10101, 0b10101, 0b01110], // @
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // A
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110], // B
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110], // C
    [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100], // D
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111], // E
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000], // F
    [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111], // G
    [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // H
    [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // I
    [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100], // J
    [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001], // K
    [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111], // L
    [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001], // M
    [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001], // N
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // O
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000], // P
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101], // Q
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001], // R
    [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110], // S
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100], // T
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // U
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100], // V
    [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010], // W
    [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001], // X
    [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100], // Y
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111], // Z
    [0b01110, 0b01000, 0b01000, 0b01000, 0b01000, 0b01000, 0b01110], // [
    [0, 0b10000, 0b01000, 0b00100, 0b00010, 0b00001, 0],       // \
    [0b01110, 0b00010, 0b00010, 0b00010, 0b00010, 0b00010, 0b01110], // ]
    [0b00100, 0b01010, 0b10001, 0, 0, 0, 0],                   // ^
    [0, 0, 0, 0, 0, 0, 0b11111],                               // _
    [0b01000, 0b00100, 0b00010, 0, 0, 0, 0],                   // `
];

fn glyph(ch: char) -> [u8; 7] {
    let ch = ch.to_ascii_uppercase();
    match ch {
        ' '..='`' => ASCII[(ch as u8 - b' ') as usize],
        '{' => [0b00010, 0b00100, 0b00100, 0b01000, 0b00100, 0b00100, 0b00010],
        '|' => [0b00100; 7],
        '}' => [0b01000, 0b00100, 0b00100, 0b00010, 0b00100, 0b00100, 0b01000],
        '~' => [0, 0, 0b01000, 0b10101, 0b00010, 0, 0],
        _ => MISSING,
    }
}

/// Integer magnification for a requested em size.
pub fn scale_for(pixel_size: u32) -> u32 {
    (pixel_size / CELL_H).max(1)
}

/// Cell box of the run at `pixel_size`, before trimming.
pub fn extent(text: &str, pixel_size: u32) -> TextSize {
    let scale = scale_for(pixel_size);
    let count = text.chars().filter(|ch| !ch.is_control()).count() as u32;
    if count == 0 {
        return TextSize::default();
    }
    TextSize {
        width: (count.saturating_mul(ADVANCE) - (ADVANCE - GLYPH_W)).saturating_mul(scale),
        height: GLYPH_H * scale,
    }
}

pub fn rasterize(text: &str, pixel_size: u32) -> GlyphMask {
    let scale = scale_for(pixel_size);
    let glyphs: Vec<[u8; 7]> = text
        .chars()
        .filter(|ch| !ch.is_control())
        .map(glyph)
        .collect();
    if glyphs.is_empty() {
        return GlyphMask::empty();
    }
    let width = (glyphs.len() as u32 * ADVANCE - (ADVANCE - GLYPH_W)) * scale;
    let height = GLYPH_H * scale;
    let mut coverage = GrayImage::new(width, height);
    for (idx, rows) in glyphs.iter().enumerate() {
        let cell_x = idx as u32 * ADVANCE * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                let x0 = cell_x + col * scale;
                let y0 = row as u32 * scale;
                for y in y0..y0 + scale {
                    for x in x0..x0 + scale {
                        coverage.put_pixel(x, y, Luma([255]));
                    }
                }
            }
        }
    }
    GlyphMask::new(0, 0, coverage).trimmed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capital_h_is_a_full_cell() {
        let mask = rasterize("H", 8);
        assert_eq!(mask.size(), TextSize { width: 5, height: 7 });
        assert_eq!((mask.left(), mask.top()), (0, 0));
    }

    #[test]
    fn scale_follows_requested_size() {
        assert_eq!(scale_for(4), 1);
        assert_eq!(scale_for(100), 12);
        let mask = rasterize("H", 100);
        assert_eq!(mask.size(), TextSize { width: 60, height: 84 });
    }

    #[test]
    fn lowercase_uses_uppercase_glyphs() {
        assert_eq!(rasterize("abc", 16), rasterize("ABC", 16));
    }

    #[test]
    fn extent_bounds_the_ink() {
        let ink = rasterize("Hi.", 40).size();
        let cells = extent("Hi.", 40);
        assert!(cells.width >= ink.width && cells.height >= ink.height);
        assert_eq!(extent("\n", 40), TextSize::default());
    }

    #[test]
    fn period_is_trimmed_to_ink() {
        let mask = rasterize(".", 8);
        assert_eq!(mask.size(), TextSize { width: 2, height: 2 });
        assert_eq!((mask.left(), mask.top()), (1, 5));
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert!(rasterize("   ", 40).is_empty());
        assert!(rasterize("", 40).is_empty());
    }
}
