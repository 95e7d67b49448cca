use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "multiply" => Some(Self::Multiply),
            "screen" => Some(Self::Screen),
            "overlay" => Some(Self::Overlay),
            _ => None,
        }
    }

    fn mix(self, backdrop: f32, source: f32) -> f32 {
        match self {
            Self::Normal => source,
            Self::Multiply => backdrop * source,
            Self::Screen => backdrop + source - backdrop * source,
            Self::Overlay => {
                if backdrop <= 0.5 {
                    2.0 * backdrop * source
                } else {
                    let s = 2.0 * backdrop - 1.0;
                    s + source - s * source
                }
            }
        }
    }
}

/// Source-over of `src` (straight alpha) scaled by `coverage` onto `dst`.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    blend_with(dst, src, coverage, BlendMode::Normal);
}

/// Separable blend followed by source-over:
/// `Cs' = (1 - ab) * Cs + ab * B(Cb, Cs)`, then
/// `co = as * Cs' + ab * Cb * (1 - as)` and `ao = as + ab * (1 - as)`.
pub fn blend_with(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32, mode: BlendMode) {
    let src_a = (src[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let cs = src[c] as f32 / 255.0;
        let cb = dst[c] as f32 / 255.0;
        let mixed = (1.0 - dst_a) * cs + dst_a * mode.mix(cb, cs);
        let co = src_a * mixed + dst_a * cb * (1.0 - src_a);
        out[c] = (co / out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}

/// Merges `layer` over `canvas` pixel by pixel. Both must share dimensions.
pub fn merge_layer(canvas: &mut RgbaImage, layer: &RgbaImage) {
    debug_assert_eq!(canvas.dimensions(), layer.dimensions());
    for (dst, src) in canvas.pixels_mut().zip(layer.pixels()) {
        if src[3] > 0 {
            blend_over(dst, *src, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_transparent_keeps_source_color() {
        let mut dst = Rgba([0, 0, 0, 0]);
        blend_over(&mut dst, Rgba([12, 200, 77, 255]), 0.4);
        assert_eq!(&dst.0[..3], &[12, 200, 77]);
        assert_eq!(dst[3], 102);
    }

    #[test]
    fn opaque_source_replaces() {
        let mut dst = Rgba([9, 9, 9, 255]);
        blend_over(&mut dst, Rgba([200, 100, 50, 255]), 1.0);
        assert_eq!(dst, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn multiply_darkens_opaque_backdrop() {
        let mut dst = Rgba([128, 255, 0, 255]);
        blend_with(&mut dst, Rgba([128, 128, 128, 255]), 1.0, BlendMode::Multiply);
        assert_eq!(dst, Rgba([64, 128, 0, 255]));
    }

    #[test]
    fn screen_lightens_opaque_backdrop() {
        let mut dst = Rgba([0, 255, 128, 255]);
        blend_with(&mut dst, Rgba([128, 0, 128, 255]), 1.0, BlendMode::Screen);
        assert_eq!(dst, Rgba([128, 255, 192, 255]));
    }

    #[test]
    fn mode_names_parse_case_insensitively() {
        assert_eq!(BlendMode::from_name("Overlay"), Some(BlendMode::Overlay));
        assert_eq!(BlendMode::from_name("dissolve"), None);
    }
}
