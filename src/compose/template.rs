use image::{Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::ImageSize;
use crate::processing::blend::blend_over;
use crate::processing::layout::{center_offset, fit_within, resize_rgba};

pub const MAX_PADDING_PERCENT: f32 = 30.0;

/// Social-media canvas presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSpec {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const TEMPLATES: [TemplateSpec; 7] = [
    TemplateSpec { name: "instagram_post", width: 1080, height: 1080 },
    TemplateSpec { name: "instagram_story", width: 1080, height: 1920 },
    TemplateSpec { name: "facebook_post", width: 1200, height: 630 },
    TemplateSpec { name: "twitter_post", width: 1600, height: 900 },
    TemplateSpec { name: "linkedin_post", width: 1200, height: 627 },
    TemplateSpec { name: "youtube_thumbnail", width: 1280, height: 720 },
    TemplateSpec { name: "tiktok_video", width: 1080, height: 1920 },
];

const FALLBACK_SIZE: ImageSize = ImageSize {
    width: 1080,
    height: 1080,
};

pub fn lookup(name: &str) -> Option<&'static TemplateSpec> {
    let name = name.trim();
    TEMPLATES
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Target size for `name`; unknown names get 1080x1080.
pub fn template_size(name: &str) -> ImageSize {
    match lookup(name) {
        Some(spec) => ImageSize {
            width: spec.width,
            height: spec.height,
        },
        None => {
            warn!(template = name, "unknown template; using 1080x1080");
            FALLBACK_SIZE
        }
    }
}

/// Letterboxes `foreground` into a solid canvas of the template's size.
pub fn fit(
    foreground: &RgbaImage,
    template: &str,
    background: Rgba<u8>,
    padding_percent: f32,
) -> Result<RgbaImage> {
    let ImageSize { width, height } = template_size(template);
    let padding_percent = if padding_percent.is_finite() {
        padding_percent.clamp(0.0, MAX_PADDING_PERCENT)
    } else {
        0.0
    };
    let padding = (width.min(height) as f32 * padding_percent / 100.0) as u32;
    let avail_w = width.saturating_sub(padding * 2).max(1);
    let avail_h = height.saturating_sub(padding * 2).max(1);

    let mut canvas = RgbaImage::from_pixel(width, height, background);
    if foreground.width() == 0 || foreground.height() == 0 {
        return Ok(canvas);
    }
    let (fit_w, fit_h) = fit_within(foreground.width(), foreground.height(), avail_w, avail_h);
    debug!(
        template,
        padding,
        from = ?foreground.dimensions(),
        to = ?(fit_w, fit_h),
        "fitting foreground into template"
    );
    let scaled = resize_rgba(foreground, fit_w, fit_h).map_err(Error::Resize)?;
    let (ox, oy) = center_offset(fit_w, fit_h, width, height);
    for (x, y, px) in scaled.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        blend_over(canvas.get_pixel_mut(ox + x, oy + y), *px, 1.0);
    }
    Ok(canvas)
}
