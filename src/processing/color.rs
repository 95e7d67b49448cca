use image::Rgba;
use tracing::warn;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Parses `#RGB`, `#RGBA`, `#RRGGBB` and `#RRGGBBAA`. Short forms expand each
/// nibble by 17.
pub fn parse_hex(raw: &str) -> Option<Rgba<u8>> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let nibble = |idx: usize| u8::from_str_radix(&hex[idx..idx + 1], 16).ok().map(|v| v * 17);
    let byte = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Hex first, then CSS color syntax (`red`, `rgb(1, 2, 3)`, ...).
pub fn parse_color(raw: &str) -> Option<Rgba<u8>> {
    parse_hex(raw).or_else(|| {
        csscolorparser::parse(raw.trim())
            .ok()
            .map(|color| Rgba(color.to_rgba8()))
    })
}

/// Invalid colors normalize to opaque white.
pub fn parse_color_or_white(raw: &str) -> Rgba<u8> {
    parse_color(raw).unwrap_or_else(|| {
        warn!(color = raw, "unrecognized color; using white");
        WHITE
    })
}

pub fn parse_color_or(raw: &str, fallback: Rgba<u8>) -> Rgba<u8> {
    parse_color(raw).unwrap_or_else(|| {
        warn!(color = raw, "unrecognized color; using default");
        fallback
    })
}

/// Replaces the alpha channel with `trunc(255 * opacity)`.
pub fn with_opacity(color: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let alpha = (255.0 * opacity.clamp(0.0, 1.0)) as u8;
    Rgba([color[0], color[1], color[2], alpha])
}

pub fn lerp(from: Rgba<u8>, to: Rgba<u8>, t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let a = from[c] as f32;
        let b = to[c] as f32;
        *slot = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Evenly spaced multi-stop interpolation along `t` in `[0, 1]`.
pub fn sample_stops(stops: &[Rgba<u8>], t: f32) -> Rgba<u8> {
    match stops {
        [] => WHITE,
        [only] => *only,
        _ => {
            let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
            let segments = (stops.len() - 1) as f32;
            let position = t * segments;
            let idx = (position.floor() as usize).min(stops.len() - 2);
            lerp(stops[idx], stops[idx + 1], position - idx as f32)
        }
    }
}

/// Brightness with the ITU-R 601 weights used for greyscale conversion.
pub fn luma(pixel: &Rgba<u8>) -> f32 {
    (pixel[0] as f32 * 299.0 + pixel[1] as f32 * 587.0 + pixel[2] as f32 * 114.0) / 1000.0
}
