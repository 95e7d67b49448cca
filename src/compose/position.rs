use crate::geometry::{Point, TextSize};

/// Fraction of the text height the draw origin is lifted by so that a
/// server-side render lines up with the browser's CSS-centered preview.
pub const DEFAULT_VERTICAL_ADJUSTMENT: f64 = 0.375;

/// Converts a caller anchor into the top-left draw origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionResolver {
    vertical_adjustment: f64,
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_VERTICAL_ADJUSTMENT)
    }
}

impl PositionResolver {
    pub fn new(vertical_adjustment: f64) -> Self {
        let vertical_adjustment = if vertical_adjustment.is_finite() {
            vertical_adjustment.clamp(0.0, 1.0)
        } else {
            DEFAULT_VERTICAL_ADJUSTMENT
        };
        Self {
            vertical_adjustment,
        }
    }

    pub fn vertical_adjustment(&self) -> f64 {
        self.vertical_adjustment
    }

    pub fn resolve(&self, anchor: Point, size: TextSize) -> Point {
        let half_w = (size.width / 2) as i32;
        let half_h = (size.height / 2) as i32;
        let lift = (size.height as f64 * self.vertical_adjustment).floor() as i32;
        Point::new(
            anchor.x.saturating_sub(half_w),
            anchor.y.saturating_sub(half_h).saturating_sub(lift),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_and_lifts() {
        let resolver = PositionResolver::default();
        let origin = resolver.resolve(
            Point::new(100, 100),
            TextSize {
                width: 200,
                height: 50,
            },
        );
        assert_eq!(origin, Point::new(0, 57));
    }

    #[test]
    fn odd_sizes_floor() {
        let resolver = PositionResolver::default();
        let origin = resolver.resolve(
            Point::new(10, 10),
            TextSize {
                width: 7,
                height: 9,
            },
        );
        // 9 / 2 = 4, floor(9 * 0.375) = 3
        assert_eq!(origin, Point::new(7, 3));
    }

    #[test]
    fn adjustment_is_configurable() {
        let resolver = PositionResolver::new(0.10);
        let origin = resolver.resolve(
            Point::new(100, 100),
            TextSize {
                width: 200,
                height: 50,
            },
        );
        assert_eq!(origin, Point::new(0, 70));
    }

    #[test]
    fn nonsense_factor_uses_default() {
        assert_eq!(
            PositionResolver::new(f64::NAN).vertical_adjustment(),
            DEFAULT_VERTICAL_ADJUSTMENT
        );
        assert_eq!(PositionResolver::new(3.0).vertical_adjustment(), 1.0);
    }
}
