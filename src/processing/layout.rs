use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// Aspect-preserving size that fits inside `box_w` x `box_h`. The constraining
/// axis is filled exactly; the other axis never exceeds the box.
pub fn fit_within(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let sw = src_w.max(1) as f64;
    let sh = src_h.max(1) as f64;
    let bw = box_w.max(1);
    let bh = box_h.max(1);
    let scale_w = bw as f64 / sw;
    let scale_h = bh as f64 / sh;
    if scale_w <= scale_h {
        let h = (sh * scale_w).round().clamp(1.0, bh as f64) as u32;
        (bw, h)
    } else {
        let w = (sw * scale_h).round().clamp(1.0, bw as f64) as u32;
        (w, bh)
    }
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}

/// Lanczos3 resample with alpha-aware filtering. Lanczos3 keeps the
/// silhouette edges of cut-out foregrounds crisp when they are scaled to
/// their background.
pub fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "resize dimensions must be positive"
    );
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resize failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_fills_constraining_axis() {
        assert_eq!(fit_within(1000, 500, 800, 800), (800, 400));
        assert_eq!(fit_within(500, 1000, 800, 800), (400, 800));
        assert_eq!(fit_within(10, 10, 1280, 720), (720, 720));
    }

    #[test]
    fn fit_handles_extreme_ratios() {
        let (w, h) = fit_within(10_000, 1, 300, 300);
        assert_eq!((w, h), (300, 1));
    }

    #[test]
    fn center_offset_splits_remainder() {
        assert_eq!(center_offset(100, 50, 200, 200), (50, 75));
        assert_eq!(center_offset(300, 50, 200, 200), (0, 75));
    }

    #[test]
    fn resize_returns_exact_dimensions() {
        let img = RgbaImage::from_pixel(7, 3, image::Rgba([10, 20, 30, 255]));
        let out = resize_rgba(&img, 20, 11).unwrap();
        assert_eq!(out.dimensions(), (20, 11));
    }

    #[test]
    fn downscale_keeps_hard_edge() {
        let mut img = RgbaImage::from_pixel(40, 10, image::Rgba([0, 0, 0, 255]));
        for x in 20..40 {
            for y in 0..10 {
                img.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
            }
        }
        let out = resize_rgba(&img, 20, 5).unwrap();
        assert!(out.get_pixel(8, 2)[0] < 64);
        assert!(out.get_pixel(11, 2)[0] > 191);
        assert_eq!(out.get_pixel(10, 2)[3], 255);
    }
}
