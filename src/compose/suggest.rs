use image::RgbaImage;
use serde::Serialize;

use crate::geometry::{Point, TextSize};
use crate::processing::color::luma;

const EDGE_MARGIN: i64 = 10;
const GRID: u32 = 3;
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Suggestion {
    pub position: Point,
    pub score: f32,
}

/// Ranks the nine grid cells of `background` by how quiet they are behind a
/// box of `text_size`, best first.
///
/// Images carrying any transparency score by `255 - mean alpha`; opaque
/// images by `255 - mean brightness`.
pub fn suggest_positions(background: &RgbaImage, text_size: TextSize) -> Vec<Suggestion> {
    let (width, height) = background.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let by_alpha = background.pixels().any(|px| px[3] < 255);

    let mut candidates = Vec::with_capacity((GRID * GRID) as usize);
    for j in 0..GRID {
        for i in 0..GRID {
            let cx = ((2 * i + 1) as u64 * width as u64 / (2 * GRID) as u64) as i64;
            let cy = ((2 * j + 1) as u64 * height as u64 / (2 * GRID) as u64) as i64;
            let (x0, x1) = clamp_span(cx, text_size.width, width);
            let (y0, y1) = clamp_span(cy, text_size.height, height);
            let score = region_score(background, (x0, y0, x1, y1), by_alpha);
            let position = Point::new(((x0 + x1) / 2) as i32, ((y0 + y1) / 2) as i32);
            candidates.push(Suggestion { position, score });
        }
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(MAX_SUGGESTIONS);
    candidates
}

/// Half-open span of `extent` centered at `center`, kept `EDGE_MARGIN` inside
/// `[0, limit)`. Degenerates to the image's own range when it cannot fit.
fn clamp_span(center: i64, extent: u32, limit: u32) -> (i64, i64) {
    let limit = limit as i64;
    let extent = extent.max(1) as i64;
    let lo = EDGE_MARGIN.min(limit / 2);
    let hi = (limit - EDGE_MARGIN).max(lo + 1);
    let start = (center - extent / 2).clamp(lo, hi - 1);
    let end = (start + extent).min(hi);
    (start, end)
}

fn region_score(image: &RgbaImage, (x0, y0, x1, y1): (i64, i64, i64, i64), by_alpha: bool) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = image.get_pixel(x as u32, y as u32);
            sum += if by_alpha {
                px[3] as f64
            } else {
                luma(px) as f64
            };
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (255.0 - sum / count as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn returns_at_most_three_ranked() {
        let img = RgbaImage::from_pixel(300, 300, Rgba([128, 128, 128, 255]));
        let suggestions = suggest_positions(&img, TextSize { width: 50, height: 20 });
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn dark_cell_wins_on_opaque_images() {
        let mut img = RgbaImage::from_pixel(300, 300, Rgba([255, 255, 255, 255]));
        for y in 200..300 {
            for x in 0..100 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let best = suggest_positions(&img, TextSize { width: 40, height: 20 })[0];
        assert_eq!(best.position, Point::new(50, 250));
        assert_eq!(best.score, 255.0);
    }

    #[test]
    fn transparent_cell_wins_when_alpha_present() {
        let mut img = RgbaImage::from_pixel(300, 300, Rgba([0, 0, 0, 255]));
        for y in 0..100 {
            for x in 200..300 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 0]));
            }
        }
        let best = suggest_positions(&img, TextSize { width: 40, height: 20 })[0];
        assert_eq!(best.position, Point::new(250, 50));
    }

    #[test]
    fn oversized_text_stays_inside_margin() {
        let img = RgbaImage::from_pixel(100, 60, Rgba([10, 10, 10, 255]));
        for suggestion in suggest_positions(&img, TextSize { width: 500, height: 500 }) {
            assert!((10..90).contains(&suggestion.position.x));
            assert!((10..50).contains(&suggestion.position.y));
        }
    }

    #[test]
    fn empty_image_has_no_suggestions() {
        assert!(suggest_positions(&RgbaImage::new(0, 0), TextSize::default()).is_empty());
    }
}
