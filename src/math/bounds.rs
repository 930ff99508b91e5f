//! Axis-aligned bounding rectangle in Mercator meters

use crate::core::types::DVec2;

/// Axis-aligned rectangle defined by min and max corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    /// Create bounds from min and max corners
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// An inverted rectangle that any `expand` call will replace
    pub fn empty() -> Self {
        Self {
            min: DVec2::splat(f64::INFINITY),
            max: DVec2::splat(f64::NEG_INFINITY),
        }
    }

    /// Smallest bounds covering every point, `None` for an empty input
    pub fn from_points<I: IntoIterator<Item = DVec2>>(points: I) -> Option<Self> {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand(p);
        }
        if bounds.is_empty() { None } else { Some(bounds) }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Get center point
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Check if point is inside the bounds (edges inclusive)
    pub fn contains_point(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y
    }

    /// Check if two bounds intersect
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    /// Expand bounds to include point
    pub fn expand(&mut self, point: DVec2) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow every side by `margin`
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(margin),
            max: self.max + DVec2::splat(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let b = Bounds::from_points([
            DVec2::new(1.0, 5.0),
            DVec2::new(-2.0, 3.0),
            DVec2::new(4.0, -1.0),
        ])
        .unwrap();
        assert_eq!(b.min, DVec2::new(-2.0, -1.0));
        assert_eq!(b.max, DVec2::new(4.0, 5.0));
        assert_eq!(b.center(), DVec2::new(1.0, 2.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(Bounds::from_points(std::iter::empty()).is_none());
        assert!(Bounds::empty().is_empty());
    }

    #[test]
    fn test_intersects() {
        let a = Bounds::new(DVec2::ZERO, DVec2::splat(10.0));
        let b = Bounds::new(DVec2::splat(5.0), DVec2::splat(15.0));
        let c = Bounds::new(DVec2::splat(11.0), DVec2::splat(12.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.inflate(1.0).intersects(&c));
    }
}
