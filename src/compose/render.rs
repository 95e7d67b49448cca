//! Draws glyph masks onto a canvas with an optional effect.
//!
//! Every effect paints into a transparent layer the size of the canvas. The
//! layer is merged only when the effect succeeds, so a failed effect leaves
//! no partial output behind and the text is drawn plain instead.

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::compose::effects::{
    BackgroundGradientDirection, BackgroundGradientEffect, DepthEffect, EffectKind, EffectSpec,
    GlowEffect, OutlineEffect, ShadowEffect, TextGradientDirection, TextGradientEffect,
};
use crate::error::RenderDegradation;
use crate::geometry::Point;
use crate::processing::blend::{blend_over, merge_layer};
use crate::processing::blur::blur_mask;
use crate::processing::color::sample_stops;
use crate::text::raster::GlyphMask;

const GLOW_MAX_STEPS: u32 = 20;
const GLOW_POINTS: u32 = 12;

/// Draws `mask` at `origin` with `effect`.
///
/// On `Err` the effect was discarded and the text was drawn plain in `color`.
pub fn render(
    canvas: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    effect: Option<&EffectSpec>,
) -> Result<(), RenderDegradation> {
    let Some(effect) = effect else {
        draw_mask(canvas, mask, origin, color);
        return Ok(());
    };

    let mut layer = RgbaImage::new(canvas.width(), canvas.height());
    let painted = match effect {
        EffectSpec::Shadow(shadow) => paint_shadow(&mut layer, mask, origin, color, shadow),
        EffectSpec::Outline(outline) => paint_outline(&mut layer, mask, origin, color, outline),
        EffectSpec::Glow(glow) => paint_glow(&mut layer, mask, origin, color, glow),
        EffectSpec::Depth3D(depth) => paint_depth(&mut layer, mask, origin, color, depth),
        EffectSpec::TextGradient(gradient) => paint_text_gradient(&mut layer, mask, origin, gradient),
        EffectSpec::BackgroundGradient(bg) => {
            paint_background_gradient(&mut layer, mask, origin, color, bg)
        }
    };

    match painted {
        Ok(()) => {
            debug!(effect = %effect.kind(), "effect applied");
            merge_layer(canvas, &layer);
            Ok(())
        }
        Err(degradation) => {
            warn!("{degradation}");
            draw_mask(canvas, mask, origin, color);
            Err(degradation)
        }
    }
}

/// Source-over of the mask's coverage in `color`, clipped to the target.
pub fn draw_mask(target: &mut RgbaImage, mask: &GlyphMask, origin: Point, color: Rgba<u8>) {
    draw_mask_with(target, mask, origin, |_, _| color);
}

fn draw_mask_with(
    target: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    mut color_at: impl FnMut(u32, u32) -> Rgba<u8>,
) {
    let (width, height) = target.dimensions();
    for (x, y, cov) in mask.covered() {
        let cx = origin.x as i64 + x as i64;
        let cy = origin.y as i64 + y as i64;
        if cx < 0 || cy < 0 || cx >= width as i64 || cy >= height as i64 {
            continue;
        }
        let (cx, cy) = (cx as u32, cy as u32);
        let color = color_at(cx, cy);
        blend_over(target.get_pixel_mut(cx, cy), color, cov as f32 / 255.0);
    }
}

fn ensure_canvas(layer: &RgbaImage, effect: &'static str) -> Result<(), String> {
    if layer.width() == 0 || layer.height() == 0 {
        return Err(format!("cannot render {effect} on an empty canvas"));
    }
    Ok(())
}

fn paint_shadow(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    shadow: &ShadowEffect,
) -> Result<(), RenderDegradation> {
    ensure_canvas(layer, "shadow").map_err(|reason| degraded(EffectKind::Shadow, reason))?;
    let blurred = blur_mask(mask, shadow.blur_radius);
    let (dx, dy) = shadow.offset;
    draw_mask(layer, &blurred, origin.offset(dx, dy), shadow.color);
    draw_mask(layer, mask, origin, color);
    Ok(())
}

/// Every integer offset in `[-width, width]²` except the origin, x-major.
pub fn outline_offsets(width: u32) -> Vec<(i32, i32)> {
    let w = width as i32;
    let mut offsets = Vec::with_capacity(((2 * w + 1) * (2 * w + 1)).saturating_sub(1) as usize);
    for dx in -w..=w {
        for dy in -w..=w {
            if dx != 0 || dy != 0 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn paint_outline(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    outline: &OutlineEffect,
) -> Result<(), RenderDegradation> {
    ensure_canvas(layer, "outline")
        .map_err(|reason| degraded(EffectKind::Outline, reason))?;
    for (dx, dy) in outline_offsets(outline.width) {
        draw_mask(layer, mask, origin.offset(dx, dy), outline.color);
    }
    draw_mask(layer, mask, origin, color);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlowRing {
    pub alpha: u8,
    pub offsets: Vec<(i32, i32)>,
}

/// Rings from the innermost outwards. Ring `i` sits at `radius * i / steps`
/// with alpha `trunc(255 * opacity * (1 - i / steps))`.
pub fn glow_rings(glow: &GlowEffect) -> Vec<GlowRing> {
    let steps = glow.radius.min(GLOW_MAX_STEPS);
    (1..=steps)
        .map(|i| {
            let fraction = i as f64 / steps as f64;
            let ring_radius = fraction * glow.radius as f64;
            let alpha = (255.0 * glow.opacity as f64 * (1.0 - fraction)) as u8;
            let offsets = (0..GLOW_POINTS)
                .map(|p| {
                    let angle = (p as f64 * 30.0).to_radians();
                    (
                        (ring_radius * angle.cos()) as i32,
                        (ring_radius * angle.sin()) as i32,
                    )
                })
                .collect();
            GlowRing { alpha, offsets }
        })
        .collect()
}

fn paint_glow(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    glow: &GlowEffect,
) -> Result<(), RenderDegradation> {
    ensure_canvas(layer, "glow").map_err(|reason| degraded(EffectKind::Glow, reason))?;
    for ring in glow_rings(glow) {
        if ring.alpha == 0 {
            continue;
        }
        let ring_color = Rgba([glow.color[0], glow.color[1], glow.color[2], ring.alpha]);
        for (dx, dy) in ring.offsets {
            draw_mask(layer, mask, origin.offset(dx, dy), ring_color);
        }
    }
    draw_mask(layer, mask, origin, color);
    Ok(())
}

/// Extrusion copies back to front as `(offset, color)`.
pub fn depth_layers(depth: &DepthEffect) -> Vec<((i32, i32), Rgba<u8>)> {
    let angle = (depth.angle_deg as f64).to_radians();
    let dx = angle.cos() * depth.distance as f64;
    let dy = angle.sin() * depth.distance as f64;
    let last = depth.colors.len().saturating_sub(1);
    (1..=depth.layers)
        .rev()
        .filter_map(|i| {
            let idx = ((i as f64 / depth.layers as f64) * last as f64) as usize;
            let color = *depth.colors.get(idx.min(last))?;
            let offset = (-((i as f64 * dx) as i32), -((i as f64 * dy) as i32));
            Some((offset, color))
        })
        .collect()
}

fn paint_depth(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    depth: &DepthEffect,
) -> Result<(), RenderDegradation> {
    let fail = |reason: String| degraded(EffectKind::Depth3D, reason);
    ensure_canvas(layer, "3d depth").map_err(fail)?;
    if depth.colors.is_empty() {
        return Err(fail("no extrusion colors".to_string()));
    }
    for ((dx, dy), layer_color) in depth_layers(depth) {
        draw_mask(layer, mask, origin.offset(dx, dy), layer_color);
    }
    draw_mask(layer, mask, origin, color);
    Ok(())
}

/// Region the gradient parameter spans, in canvas coordinates.
#[derive(Debug, Clone, Copy)]
struct Span {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

impl Span {
    fn linear(&self, x: u32, y: u32, direction: TextGradientDirection) -> f32 {
        let fx = axis_fraction(x as i64 - self.x, self.width);
        let fy = axis_fraction(y as i64 - self.y, self.height);
        match direction {
            TextGradientDirection::Horizontal => fx,
            TextGradientDirection::Vertical => fy,
            TextGradientDirection::Diagonal => (fx + fy) / 2.0,
        }
    }
}

fn axis_fraction(pos: i64, extent: u32) -> f32 {
    if extent <= 1 {
        return 0.0;
    }
    pos as f32 / (extent - 1) as f32
}

fn paint_text_gradient(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    gradient: &TextGradientEffect,
) -> Result<(), RenderDegradation> {
    let fail = |reason: String| degraded(EffectKind::TextGradient, reason);
    ensure_canvas(layer, "text gradient").map_err(fail)?;
    if gradient.colors.len() < 2 {
        return Err(fail(format!("{} gradient colors", gradient.colors.len())));
    }
    let span = if gradient.use_text_as_mask {
        Span {
            x: 0,
            y: 0,
            width: layer.width(),
            height: layer.height(),
        }
    } else {
        Span {
            x: origin.x as i64 + mask.left() as i64,
            y: origin.y as i64 + mask.top() as i64,
            width: mask.width(),
            height: mask.height(),
        }
    };
    draw_mask_with(layer, mask, origin, |x, y| {
        sample_stops(&gradient.colors, span.linear(x, y, gradient.direction))
    });
    Ok(())
}

fn paint_background_gradient(
    layer: &mut RgbaImage,
    mask: &GlyphMask,
    origin: Point,
    color: Rgba<u8>,
    bg: &BackgroundGradientEffect,
) -> Result<(), RenderDegradation> {
    if mask.is_empty() {
        return Ok(());
    }
    let fail = |reason: String| degraded(EffectKind::BackgroundGradient, reason);
    ensure_canvas(layer, "background gradient").map_err(fail)?;
    let pad = bg.padding as i64;
    let left = (origin.x as i64 + mask.left() as i64 - pad).max(0);
    let top = (origin.y as i64 + mask.top() as i64 - pad).max(0);
    let right =
        (origin.x as i64 + mask.left() as i64 + mask.width() as i64 + pad).min(layer.width() as i64);
    let bottom =
        (origin.y as i64 + mask.top() as i64 + mask.height() as i64 + pad).min(layer.height() as i64);
    if right <= left || bottom <= top {
        return Err(fail("text box lies outside the canvas".to_string()));
    }
    let width = (right - left) as u32;
    let height = (bottom - top) as u32;
    let radius = bg.corner_radius.min(width / 2).min(height / 2);
    let span = Span {
        x: left,
        y: top,
        width,
        height,
    };

    for y in 0..height {
        for x in 0..width {
            if !inside_rounded_rect(x, y, width, height, radius) {
                continue;
            }
            let cx = left as u32 + x;
            let cy = top as u32 + y;
            let t = match bg.direction {
                BackgroundGradientDirection::Horizontal => {
                    span.linear(cx, cy, TextGradientDirection::Horizontal)
                }
                BackgroundGradientDirection::Vertical => {
                    span.linear(cx, cy, TextGradientDirection::Vertical)
                }
                BackgroundGradientDirection::Radial => radial_fraction(x, y, width, height),
            };
            let mut fill = sample_stops(&bg.colors, t);
            fill[3] = (fill[3] as f32 * bg.opacity) as u8;
            blend_over(layer.get_pixel_mut(cx, cy), fill, 1.0);
        }
    }
    draw_mask(layer, mask, origin, color);
    Ok(())
}

fn radial_fraction(x: u32, y: u32, width: u32, height: u32) -> f32 {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let dx = x as f32 + 0.5 - cx;
    let dy = y as f32 + 0.5 - cy;
    let max = (cx * cx + cy * cy).sqrt();
    if max <= 0.0 {
        return 0.0;
    }
    (dx * dx + dy * dy).sqrt() / max
}

/// Pixel-center test against a rectangle with circular corners of `radius`.
fn inside_rounded_rect(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
    if radius == 0 {
        return true;
    }
    let r = radius as f32;
    let px = x as f32 + 0.5;
    let py = y as f32 + 0.5;
    let cx = if px < r {
        r
    } else if px > width as f32 - r {
        width as f32 - r
    } else {
        return true;
    };
    let cy = if py < r {
        r
    } else if py > height as f32 - r {
        height as f32 - r
    } else {
        return true;
    };
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

fn degraded(effect: EffectKind, reason: String) -> RenderDegradation {
    RenderDegradation { effect, reason }
}
