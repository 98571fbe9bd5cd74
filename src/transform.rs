//! Coordinate transforms between data and screen space.

use crate::geom::{Margins, Point, ScreenPoint, ScreenRect};
use crate::view::{Range, Viewport};

/// Affine transform from data coordinates into the pixel area of a layer.
///
/// `viewport.x.min` maps to the left margin and `viewport.x.max` to
/// `width - right`. The Y axis is inverted: `viewport.y.max` maps to the top
/// margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    viewport: Viewport,
    size: (f32, f32),
    margins: Margins,
    inner: ScreenRect,
}

impl Transform {
    /// Create a transform for a surface of `size` pixels.
    ///
    /// Returns `None` for degenerate input: a zero, negative or non-finite
    /// span on either axis, or an empty inner pixel area.
    pub fn new(viewport: Viewport, size: (f32, f32), margins: Margins) -> Option<Self> {
        if !viewport.is_valid() {
            return None;
        }
        let inner = margins.inner_rect(size);
        if !inner.is_valid() {
            return None;
        }
        Some(Self {
            viewport,
            size,
            margins,
            inner,
        })
    }

    /// Access the viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    /// Margins around the data area.
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Data area in pixels.
    pub fn inner(&self) -> ScreenRect {
        self.inner
    }

    /// Same surface and margins with a different viewport.
    pub fn with_viewport(&self, viewport: Viewport) -> Option<Self> {
        Self::new(viewport, self.size, self.margins)
    }

    /// Same surface and viewport with different margins.
    pub fn with_margins(&self, margins: Margins) -> Option<Self> {
        Self::new(self.viewport, self.size, margins)
    }

    /// Map a data point into screen space.
    pub fn data_to_pixel(&self, point: Point) -> ScreenPoint {
        let x_norm = (point.x - self.viewport.x.min) / self.viewport.x.span();
        let y_norm = (point.y - self.viewport.y.min) / self.viewport.y.span();
        let sx = self.inner.min.x as f64 + x_norm * self.inner.width() as f64;
        let sy = self.inner.max.y as f64 - y_norm * self.inner.height() as f64;
        ScreenPoint::new(sx as f32, sy as f32)
    }

    /// Map a screen point into data space.
    pub fn pixel_to_data(&self, point: ScreenPoint) -> Point {
        let x_norm = (point.x as f64 - self.inner.min.x as f64) / self.inner.width() as f64;
        let y_norm = (self.inner.max.y as f64 - point.y as f64) / self.inner.height() as f64;
        Point::new(
            self.viewport.x.min + x_norm * self.viewport.x.span(),
            self.viewport.y.min + y_norm * self.viewport.y.span(),
        )
    }

    /// Map a pixel offset relative to the top-left margin corner.
    pub fn offset_to_pixel(&self, offset: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(self.inner.min.x + offset.x, self.inner.min.y + offset.y)
    }

    /// Horizontal data distance covered by one pixel.
    pub fn data_per_pixel_x(&self) -> f64 {
        self.viewport.x.span() / self.inner.width() as f64
    }
}

/// Convenience for building a transform from plain ranges.
pub fn transform_for(
    x: Range,
    y: Range,
    size: (f32, f32),
    margins: Margins,
) -> Option<Transform> {
    Transform::new(Viewport::new(x, y), size, margins)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(x: Range, y: Range) -> Transform {
        transform_for(x, y, (400.0, 300.0), Margins::new(50.0, 10.0, 15.0, 50.0))
            .expect("valid transform")
    }

    #[test]
    fn range_edges_map_to_margins() {
        let t = transform(Range::new(100.0, 200.0), Range::new(-1.0, 1.0));
        let left = t.data_to_pixel(Point::new(100.0, 1.0));
        let right = t.data_to_pixel(Point::new(200.0, -1.0));
        assert!((left.x - 50.0).abs() < 1e-4);
        assert!((left.y - 15.0).abs() < 1e-4);
        assert!((right.x - 390.0).abs() < 1e-4);
        assert!((right.y - 250.0).abs() < 1e-4);
    }

    #[test]
    fn roundtrip_recovers_data_point() {
        let cases = [
            (Range::new(0.0, 10.0), Range::new(0.0, 10.0), Point::new(5.0, 7.5)),
            (Range::new(-3.0, 42.0), Range::new(-1.0, 1.0), Point::new(17.25, -0.3)),
            (Range::new(1000.0, 31000.0), Range::new(-250.0, 250.0), Point::new(12345.0, 120.0)),
        ];
        for (x, y, point) in cases {
            let t = transform(x, y);
            let back = t.pixel_to_data(t.data_to_pixel(point));
            assert!((back.x - point.x).abs() <= x.span() * 1e-5, "{back:?} vs {point:?}");
            assert!((back.y - point.y).abs() <= y.span() * 1e-5, "{back:?} vs {point:?}");
        }
    }

    #[test]
    fn degenerate_ranges_are_rejected() {
        let margins = Margins::default();
        assert!(transform_for(Range::new(1.0, 1.0), Range::new(0.0, 1.0), (10.0, 10.0), margins).is_none());
        assert!(transform_for(Range::new(0.0, 1.0), Range::new(0.0, 1.0), (10.0, 0.0), margins).is_none());
        let squeezed = Margins::new(8.0, 8.0, 0.0, 0.0);
        assert!(transform_for(Range::new(0.0, 1.0), Range::new(0.0, 1.0), (10.0, 10.0), squeezed).is_none());
    }
}
