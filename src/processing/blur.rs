use image::{GrayImage, imageops};

use crate::text::raster::GlyphMask;

/// Largest sigma accepted for shadow blur.
pub const MAX_SIGMA: f32 = 100.0;

/// Gaussian-blurs the coverage of `mask`, growing it by 3σ on every side so
/// nothing is clipped.
pub fn blur_mask(mask: &GlyphMask, sigma: f32) -> GlyphMask {
    if sigma.is_nan() || sigma <= 0.0 || mask.is_empty() {
        return mask.clone();
    }
    let sigma = sigma.min(MAX_SIGMA);
    let pad = (sigma * 3.0).ceil() as u32;
    let mut padded = GrayImage::new(mask.width() + pad * 2, mask.height() + pad * 2);
    imageops::replace(&mut padded, mask.coverage(), pad as i64, pad as i64);
    let coverage = imageops::blur(&padded, sigma);
    GlyphMask::new(mask.left() - pad as i32, mask.top() - pad as i32, coverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn blur_spreads_and_grows_mask() {
        let mut cov = GrayImage::new(3, 3);
        cov.put_pixel(1, 1, Luma([255]));
        let mask = GlyphMask::new(5, 5, cov);
        let blurred = blur_mask(&mask, 1.0);
        assert_eq!((blurred.left(), blurred.top()), (2, 2));
        assert_eq!((blurred.width(), blurred.height()), (9, 9));
        let center = blurred.coverage().get_pixel(4, 4)[0];
        let side = blurred.coverage().get_pixel(5, 4)[0];
        assert!(center < 255);
        assert!(side > 0 && side < center);
    }

    #[test]
    fn blurred_edges_fade_out() {
        let mask = GlyphMask::new(0, 0, GrayImage::from_pixel(4, 4, Luma([255])));
        let blurred = blur_mask(&mask, 2.0);
        let coverage = blurred.coverage();
        assert_eq!(coverage.get_pixel(0, 0)[0], 0);
        assert!(coverage.get_pixel(blurred.width() / 2, blurred.height() / 2)[0] > 0);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let mut cov = GrayImage::new(2, 2);
        cov.put_pixel(0, 0, Luma([90]));
        let mask = GlyphMask::new(1, 2, cov);
        assert_eq!(blur_mask(&mask, 0.0), mask);
        assert_eq!(blur_mask(&mask, f32::NAN), mask);
    }
}
