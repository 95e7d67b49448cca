use ab_glyph::{Font as _, FontArc, OutlinedGlyph, PxScale, Rect, ScaleFont, point};
use image::{GrayImage, Luma};
use tracing::warn;

use crate::geometry::TextSize;
use crate::text::builtin;
use crate::text::font::Font;

/// Anti-aliased coverage of a glyph run.
///
/// `left`/`top` locate the coverage relative to the draw origin, which is the
/// left edge of the run on its ascender line. Metrics and drawing both come
/// from the same mask.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    left: i32,
    top: i32,
    coverage: GrayImage,
}

impl GlyphMask {
    pub fn new(left: i32, top: i32, coverage: GrayImage) -> Self {
        Self {
            left,
            top,
            coverage,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, GrayImage::new(0, 0))
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn width(&self) -> u32 {
        self.coverage.width()
    }

    pub fn height(&self) -> u32 {
        self.coverage.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn size(&self) -> TextSize {
        TextSize {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn coverage(&self) -> &GrayImage {
        &self.coverage
    }

    /// Covered pixels as `(x, y, coverage)` relative to the draw origin.
    pub fn covered(&self) -> impl Iterator<Item = (i32, i32, u8)> + '_ {
        self.coverage
            .enumerate_pixels()
            .filter(|(_, _, px)| px[0] > 0)
            .map(|(x, y, px)| (self.left + x as i32, self.top + y as i32, px[0]))
    }

    /// Crops away fully transparent rows and columns.
    pub fn trimmed(self) -> Self {
        let (w, h) = self.coverage.dimensions();
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        for (x, y, px) in self.coverage.enumerate_pixels() {
            if px[0] > 0 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if min_x == u32::MAX {
            return Self::empty();
        }
        if min_x == 0 && min_y == 0 && max_x + 1 == w && max_y + 1 == h {
            return self;
        }
        let cropped =
            image::imageops::crop_imm(&self.coverage, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
                .to_image();
        Self::new(self.left + min_x as i32, self.top + min_y as i32, cropped)
    }
}

/// Largest glyph run, in mask pixels, that is rasterized.
pub const MAX_MASK_PIXELS: u64 = 1 << 24;

/// Glyph runs whose extent exceeds [`MAX_MASK_PIXELS`] rasterize to an empty
/// mask; check [`within_budget`] first to report them instead.
pub fn rasterize(text: &str, font: &Font) -> GlyphMask {
    match font {
        Font::Outline { face, scale } => {
            let outlines = layout_outline(text, face, *scale);
            match union_bounds(&outlines) {
                Some(bounds) if fits(bounds_size(bounds)) => draw_outlines(&outlines, bounds),
                _ => GlyphMask::empty(),
            }
        }
        Font::Builtin { pixel_size } => {
            if fits(builtin::extent(text, *pixel_size)) {
                builtin::rasterize(text, *pixel_size)
            } else {
                GlyphMask::empty()
            }
        }
    }
}

fn fits(size: TextSize) -> bool {
    let ok = within_budget(size);
    if !ok {
        warn!(
            width = size.width,
            height = size.height,
            "glyph run too large to rasterize; skipping"
        );
    }
    ok
}

/// Tight ink bounding box of `text`.
pub fn measure(text: &str, font: &Font) -> TextSize {
    rasterize(text, font).size()
}

/// Bounding box of the laid-out run without drawing it. Never smaller than
/// the ink box.
pub fn extent(text: &str, font: &Font) -> TextSize {
    match font {
        Font::Outline { face, scale } => {
            let outlines = layout_outline(text, face, *scale);
            union_bounds(&outlines).map(bounds_size).unwrap_or_default()
        }
        Font::Builtin { pixel_size } => builtin::extent(text, *pixel_size),
    }
}

pub fn within_budget(size: TextSize) -> bool {
    size.width as u64 * size.height as u64 <= MAX_MASK_PIXELS
}

fn layout_outline(text: &str, face: &FontArc, scale: PxScale) -> Vec<OutlinedGlyph> {
    let scaled = face.as_scaled(scale);
    let ascent = scaled.ascent();
    let mut caret = 0.0f32;
    let mut previous = None;
    let mut outlines = Vec::new();
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, ascent));
        caret += scaled.h_advance(id);
        previous = Some(id);
        if let Some(outlined) = face.outline_glyph(glyph) {
            outlines.push(outlined);
        }
    }
    outlines
}

fn union_bounds(outlines: &[OutlinedGlyph]) -> Option<Rect> {
    let (first, rest) = outlines.split_first()?;
    let mut bounds = first.px_bounds();
    for outlined in rest {
        let b = outlined.px_bounds();
        bounds.min.x = bounds.min.x.min(b.min.x);
        bounds.min.y = bounds.min.y.min(b.min.y);
        bounds.max.x = bounds.max.x.max(b.max.x);
        bounds.max.y = bounds.max.y.max(b.max.y);
    }
    Some(bounds)
}

fn bounds_size(bounds: Rect) -> TextSize {
    TextSize {
        width: (bounds.max.x.ceil() - bounds.min.x.floor()).max(0.0) as u32,
        height: (bounds.max.y.ceil() - bounds.min.y.floor()).max(0.0) as u32,
    }
}

fn draw_outlines(outlines: &[OutlinedGlyph], bounds: Rect) -> GlyphMask {
    let left = bounds.min.x.floor() as i32;
    let top = bounds.min.y.floor() as i32;
    let width = (bounds.max.x.ceil() as i32 - left).max(0) as u32;
    let height = (bounds.max.y.ceil() as i32 - top).max(0) as u32;
    let mut coverage = GrayImage::new(width, height);

    for outlined in outlines {
        let b = outlined.px_bounds();
        let ox = b.min.x.floor() as i32 - left;
        let oy = b.min.y.floor() as i32 - top;
        outlined.draw(|x, y, c| {
            let px = ox + x as i32;
            let py = oy + y as i32;
            if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                return;
            }
            let value = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
            let slot = coverage.get_pixel_mut(px as u32, py as u32);
            if value > slot[0] {
                *slot = Luma([value]);
            }
        });
    }

    GlyphMask::new(left, top, coverage).trimmed()
}
