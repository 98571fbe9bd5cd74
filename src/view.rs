//! Data ranges and viewports.

/// Numeric range with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl Range {
    /// Create a new range, swapping bounds if needed.
    pub fn new(mut min: f64, mut max: f64) -> Self {
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        Self { min, max }
    }

    /// Span of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Midpoint of the range.
    pub fn center(&self) -> f64 {
        (self.min + self.max) * 0.5
    }

    /// Check whether both bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check whether the range has positive span and finite bounds.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.span() > 0.0
    }

    /// Check whether a value lies within the range (bounds included).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Shift both bounds by `delta`.
    pub fn translated(&self, delta: f64) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Range of the same span centered on `center`.
    pub fn recentered(&self, center: f64) -> Self {
        let half = self.span() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Check whether two ranges overlap (touching bounds count).
    pub fn overlaps(&self, other: Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Visible data ranges on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X axis range.
    pub x: Range,
    /// Y axis range.
    pub y: Range,
}

impl Viewport {
    /// Create a viewport from X and Y ranges.
    pub fn new(x: Range, y: Range) -> Self {
        Self { x, y }
    }

    /// Unit square viewport.
    pub fn unit() -> Self {
        Self::new(Range::new(0.0, 1.0), Range::new(0.0, 1.0))
    }

    /// Check whether both axes are valid.
    pub fn is_valid(&self) -> bool {
        self.x.is_valid() && self.y.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_swaps_inverted_bounds() {
        let range = Range::new(5.0, 2.0);
        assert_eq!(range.min, 2.0);
        assert_eq!(range.max, 5.0);
    }

    #[test]
    fn range_recentered_keeps_span() {
        let range = Range::new(0.0, 100.0).recentered(500.0);
        assert_eq!(range, Range::new(450.0, 550.0));
    }

    #[test]
    fn degenerate_range_is_invalid() {
        assert!(!Range::new(3.0, 3.0).is_valid());
        assert!(!Range::new(f64::NAN, 1.0).is_valid());
        assert!(Range::new(0.0, 1.0).is_valid());
    }
}
