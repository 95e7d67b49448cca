use std::sync::Arc;

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::compose::effects::EffectSpec;
use crate::compose::position::PositionResolver;
use crate::compose::render::render;
use crate::error::{Error, RenderDegradation, Result};
use crate::geometry::{Point, TextSize};
use crate::processing::blend::{BlendMode, blend_with};
use crate::processing::layout::resize_rgba;
use crate::text::font::FontResolver;
use crate::text::font::Font;
use crate::text::raster::{MAX_MASK_PIXELS, extent, rasterize, within_budget};

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_id: String,
    pub font_size_pt: u32,
    pub color: Rgba<u8>,
    pub effect: Option<EffectSpec>,
}

/// One unit of text to render. Transforms such as uppercasing have already
/// been applied to `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    pub text: String,
    pub anchor: Point,
    pub style: TextStyle,
}

/// Where a layer landed and whether its effect held up.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlacement {
    pub text_size: TextSize,
    pub origin: Point,
    pub degradation: Option<RenderDegradation>,
}

#[derive(Debug, Clone)]
pub struct RenderedLayers {
    pub canvas: RgbaImage,
    pub placements: Vec<LayerPlacement>,
}

/// Paints text layers onto backgrounds.
#[derive(Debug, Clone)]
pub struct LayerCompositor {
    fonts: Arc<FontResolver>,
    positions: PositionResolver,
}

impl LayerCompositor {
    pub fn new(fonts: Arc<FontResolver>, positions: PositionResolver) -> Self {
        Self { fonts, positions }
    }

    pub fn fonts(&self) -> &FontResolver {
        &self.fonts
    }

    pub fn positions(&self) -> PositionResolver {
        self.positions
    }

    /// Fails when `text` set in `font` would exceed the rasterization budget.
    pub fn check_extent(text: &str, font: &Font) -> Result<TextSize> {
        let size = extent(text, font);
        if !within_budget(size) {
            return Err(Error::InvalidParameter {
                field: "text",
                reason: format!(
                    "text renders to {}x{} pixels, over the {MAX_MASK_PIXELS} pixel limit",
                    size.width, size.height
                ),
            });
        }
        Ok(size)
    }

    pub fn check_layers(&self, layers: &[TextLayer]) -> Result<()> {
        for layer in layers {
            let font = self
                .fonts
                .resolve(&layer.style.font_id, layer.style.font_size_pt);
            Self::check_extent(&layer.text, &font)?;
        }
        Ok(())
    }

    /// Draws `layers` in order into a copy of `background`; later layers
    /// occlude earlier ones.
    pub fn render_layers(&self, background: &RgbaImage, layers: &[TextLayer]) -> RenderedLayers {
        let mut canvas = background.clone();
        let placements = layers
            .iter()
            .map(|layer| self.draw_layer(&mut canvas, layer))
            .collect();
        RenderedLayers { canvas, placements }
    }

    pub fn draw_layer(&self, canvas: &mut RgbaImage, layer: &TextLayer) -> LayerPlacement {
        let font = self
            .fonts
            .resolve(&layer.style.font_id, layer.style.font_size_pt);
        let mask = rasterize(&layer.text, &font);
        let text_size = mask.size();
        let origin = self.positions.resolve(layer.anchor, text_size);
        debug!(
            text = %layer.text,
            anchor = ?layer.anchor,
            ?origin,
            width = text_size.width,
            height = text_size.height,
            "placing text layer"
        );
        let degradation = render(
            canvas,
            &mask,
            origin,
            layer.style.color,
            layer.style.effect.as_ref(),
        )
        .err();
        LayerPlacement {
            text_size,
            origin,
            degradation,
        }
    }
}

/// Blends `foreground` over `background`, resampling it to the background's
/// size first when they differ.
pub fn compose(
    background: &RgbaImage,
    foreground: &RgbaImage,
    mode: BlendMode,
    opacity: f32,
) -> Result<RgbaImage> {
    let opacity = if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        warn!(opacity, "non-finite blend opacity; using 1.0");
        1.0
    };
    let (width, height) = background.dimensions();
    let mut out = background.clone();
    if width == 0 || height == 0 {
        return Ok(out);
    }
    let resized;
    let foreground = if foreground.dimensions() != (width, height) {
        debug!(
            from = ?foreground.dimensions(),
            to = ?(width, height),
            "resampling foreground"
        );
        resized = resize_rgba(foreground, width, height).map_err(Error::Resize)?;
        &resized
    } else {
        foreground
    };
    for (dst, src) in out.pixels_mut().zip(foreground.pixels()) {
        blend_with(dst, *src, opacity, mode);
    }
    Ok(out)
}
