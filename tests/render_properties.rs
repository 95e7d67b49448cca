use std::collections::HashSet;

use image::{Rgba, RgbaImage};
use procaptions::compose::effects::{EffectSpec, GlowEffect, OutlineEffect};
use procaptions::compose::layers::compose;
use procaptions::compose::position::PositionResolver;
use procaptions::compose::render::{glow_rings, outline_offsets, render};
use procaptions::compose::template::fit;
use procaptions::geometry::{Point, TextSize};
use procaptions::processing::blend::BlendMode;
use procaptions::text::builtin;

#[test]
fn position_resolution_is_repeatable() {
    let resolver = PositionResolver::default();
    let size = TextSize { width: 200, height: 50 };
    let first = resolver.resolve(Point::new(100, 100), size);
    assert_eq!(first, Point::new(0, 57));
    assert_eq!(resolver.resolve(Point::new(100, 100), size), first);
}

#[test]
fn plain_text_only_touches_glyph_coverage() {
    let mask = builtin::rasterize("AB", 16);
    let origin = Point::new(7, 5);
    let color = Rgba([12, 34, 56, 255]);
    let mut canvas = RgbaImage::new(60, 30);
    render(&mut canvas, &mask, origin, color, None).unwrap();

    let covered: HashSet<(i32, i32)> = mask
        .covered()
        .map(|(x, y, _)| (origin.x + x, origin.y + y))
        .collect();
    for (x, y, px) in canvas.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        assert!(covered.contains(&(x as i32, y as i32)));
        assert_eq!(*px, color);
    }
}

#[test]
fn outline_covers_full_square_and_text_stays_on_top() {
    let offsets: HashSet<(i32, i32)> = outline_offsets(2).into_iter().collect();
    assert_eq!(offsets.len(), 24);
    assert!(!offsets.contains(&(0, 0)));
    assert!(offsets.iter().all(|(x, y)| x.abs() <= 2 && y.abs() <= 2));

    let mask = builtin::rasterize("H", 8);
    let origin = Point::new(4, 4);
    let text = Rgba([255, 255, 255, 255]);
    let effect = EffectSpec::Outline(OutlineEffect::new(2, Rgba([0, 0, 0, 255]), 1.0));
    let mut canvas = RgbaImage::new(16, 16);
    render(&mut canvas, &mask, origin, text, Some(&effect)).unwrap();
    for (x, y, _) in mask.covered() {
        let px = canvas.get_pixel((origin.x + x) as u32, (origin.y + y) as u32);
        assert_eq!(*px, text);
    }
}

#[test]
fn glow_fades_outwards() {
    let rings = glow_rings(&GlowEffect::new(10, Rgba([255, 255, 0, 255]), 0.7));
    assert_eq!(rings.len(), 10);
    assert!(rings.windows(2).all(|pair| pair[0].alpha > pair[1].alpha));
    assert_eq!(rings[0].alpha, (255.0f64 * 0.7 * 0.9) as u8);
}

#[test]
fn template_never_crops() {
    for (w, h) in [(100, 400), (400, 100), (333, 333), (1, 900)] {
        let fg = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
        let canvas = fit(&fg, "instagram_post", Rgba([255, 255, 255, 255]), 10.0).unwrap();
        assert_eq!(canvas.dimensions(), (1080, 1080));

        // 108px padding on each side leaves an 864px box.
        let dark: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, px)| px[0] < 128)
            .map(|(x, y, _)| (x, y))
            .collect();
        let min_x = dark.iter().map(|p| p.0).min().unwrap();
        let max_x = dark.iter().map(|p| p.0).max().unwrap();
        let min_y = dark.iter().map(|p| p.1).min().unwrap();
        let max_y = dark.iter().map(|p| p.1).max().unwrap();
        let (fw, fh) = (max_x - min_x + 1, max_y - min_y + 1);
        assert!(fw <= 864 && fh <= 864, "{fw}x{fh} exceeds the box");
        assert!(fw == 864 || fh == 864, "{fw}x{fh} is not tight");
    }
}

#[test]
fn compose_output_matches_background_size() {
    let bg = RgbaImage::from_pixel(64, 48, Rgba([1, 2, 3, 255]));
    for fg_size in [(10, 10), (64, 48), (200, 30)] {
        let fg = RgbaImage::from_pixel(fg_size.0, fg_size.1, Rgba([9, 9, 9, 0]));
        let out = compose(&bg, &fg, BlendMode::Normal, 1.0).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        assert_eq!(out, bg);
    }
}
