//! 2D drawing surface abstraction
//!
//! The render pipeline only talks to this trait. Coordinates are pixels in
//! the current transform; `translate` accumulates and `save`/`restore`
//! bracket both the transform and the clip.

use kurbo::{BezPath, Circle, PathEl, Point, Rect, Shape};

use crate::core::types::DVec2;
use crate::style::{Color, Dash, LineCap, LineJoin, ResolvedStyle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// Tolerance in pixels for turning circles into cubic segments
const CURVE_TOLERANCE: f64 = 0.1;

/// Sequence of subpaths built up before a single fill or stroke call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    inner: BezPath,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: DVec2) {
        self.inner.move_to(point(p));
    }

    pub fn line_to(&mut self, p: DVec2) {
        self.inner.line_to(point(p));
    }

    pub fn close(&mut self) {
        self.inner.close_path();
    }

    /// A full circle as its own closed subpath
    pub fn circle(&mut self, center: DVec2, radius: f64) {
        self.append(&Circle::new(point(center), radius));
    }

    /// An axis-aligned rectangle as its own closed subpath
    pub fn rect(&mut self, origin: DVec2, size: DVec2) {
        self.append(&Rect::from_origin_size(point(origin), (size.x, size.y)));
    }

    /// Append an open polyline as a new subpath; fewer than two points is a no-op
    pub fn polyline<I: IntoIterator<Item = DVec2>>(&mut self, points: I) {
        self.push_points(points, false);
    }

    /// Append a closed ring as a new subpath
    pub fn ring<I: IntoIterator<Item = DVec2>>(&mut self, points: I) {
        self.push_points(points, true);
    }

    pub fn elements(&self) -> &[PathEl] {
        self.inner.elements()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.elements().is_empty()
    }

    pub fn clear(&mut self) {
        self.inner = BezPath::new();
    }

    /// Number of subpaths started
    pub fn subpath_count(&self) -> usize {
        self.elements()
            .iter()
            .filter(|el| matches!(el, PathEl::MoveTo(_)))
            .count()
    }

    /// Flatten into closed/open polylines, curves within `tolerance` pixels
    ///
    /// A closed subpath does not repeat its first point at the end.
    pub fn flatten(&self, tolerance: f64) -> Vec<Subpath> {
        let mut out: Vec<Subpath> = Vec::new();
        let mut current: Option<Subpath> = None;

        kurbo::flatten(self.elements().iter().copied(), tolerance, |el| match el {
            PathEl::MoveTo(p) => {
                out.extend(current.take());
                current = Some(Subpath { points: vec![vec2(p)], closed: false });
            }
            PathEl::LineTo(p) => match current.as_mut() {
                Some(sub) => sub.points.push(vec2(p)),
                None => current = Some(Subpath { points: vec![vec2(p)], closed: false }),
            },
            PathEl::ClosePath => {
                if let Some(mut sub) = current.take() {
                    let first = sub.points[0];
                    if sub.points.len() > 1 && sub.points.last().is_some_and(|&p| p.distance_squared(first) < 1e-18) {
                        sub.points.pop();
                    }
                    sub.closed = true;
                    out.push(sub);
                }
            }
            // flatten only emits lines
            PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
        });
        out.extend(current.take());
        out
    }

    fn append(&mut self, shape: &impl Shape) {
        self.inner.extend(shape.path_elements(CURVE_TOLERANCE));
    }

    fn push_points<I: IntoIterator<Item = DVec2>>(&mut self, points: I, closed: bool) {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else { return };
        let Some(second) = iter.next() else { return };

        self.move_to(first);
        self.line_to(second);
        for p in iter {
            self.line_to(p);
        }
        if closed {
            self.close();
        }
    }
}

fn point(p: DVec2) -> Point {
    Point::new(p.x, p.y)
}

fn vec2(p: Point) -> DVec2 {
    DVec2::new(p.x, p.y)
}

/// A flattened subpath
#[derive(Clone, Debug, PartialEq)]
pub struct Subpath {
    pub points: Vec<DVec2>,
    pub closed: bool,
}

/// Stroke parameters for one `stroke_path` call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    pub dash: Option<Dash>,
    pub cap: LineCap,
    pub join: LineJoin,
}

impl Stroke {
    pub fn solid(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
            cap: LineCap::Round,
            join: LineJoin::Round,
        }
    }

    pub fn from_style(style: &ResolvedStyle) -> Self {
        Self {
            color: style.color,
            width: style.width,
            dash: style.dash,
            cap: style.cap,
            join: style.join,
        }
    }

    pub fn with_width(self, width: f32) -> Self {
        Self { width, ..self }
    }

    pub fn with_color(self, color: Color) -> Self {
        Self { color, ..self }
    }
}

/// A 2D drawing context
pub trait Canvas {
    /// Surface size in pixels
    fn size(&self) -> (u32, u32);

    /// Push the current transform and clip
    fn save(&mut self);

    /// Pop back to the last saved transform and clip
    fn restore(&mut self);

    fn translate(&mut self, offset: DVec2);

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, color: Color);

    fn fill_path(&mut self, path: &Path, color: Color, rule: FillRule);

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke);

    /// Intersect the current clip with `path`
    fn clip(&mut self, path: &Path, rule: FillRule);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_needs_two_points() {
        let mut path = Path::new();
        path.polyline([DVec2::ZERO]);
        assert!(path.is_empty());

        path.polyline([DVec2::ZERO, DVec2::ONE]);
        assert_eq!(path.elements().len(), 2);
        assert_eq!(path.subpath_count(), 1);
    }

    #[test]
    fn test_ring_closes() {
        let mut path = Path::new();
        path.ring([DVec2::ZERO, DVec2::X, DVec2::ONE]);
        assert_eq!(path.elements().last(), Some(&PathEl::ClosePath));

        let flat = path.flatten(0.25);
        assert_eq!(flat.len(), 1);
        assert!(flat[0].closed);
        assert_eq!(flat[0].points.len(), 3);
    }

    #[test]
    fn test_flatten_mixed_subpaths() {
        let mut path = Path::new();
        path.polyline([DVec2::ZERO, DVec2::X]);
        path.circle(DVec2::ZERO, 2.0);
        path.rect(DVec2::ZERO, DVec2::new(3.0, 4.0));

        let flat = path.flatten(0.01);
        assert_eq!(path.subpath_count(), 3);
        assert_eq!(flat.len(), 3);
        assert!(!flat[0].closed);

        assert!(flat[1].closed);
        assert!(flat[1].points.len() >= 8);
        for p in &flat[1].points {
            assert!((p.length() - 2.0).abs() < 0.02, "{:?}", p);
        }

        assert!(flat[2].closed);
        assert_eq!(flat[2].points.len(), 4);
        assert!(flat[2].points.contains(&DVec2::new(3.0, 4.0)));
    }

    #[test]
    fn test_clear_drops_subpaths() {
        let mut path = Path::new();
        path.circle(DVec2::ONE, 1.0);
        assert!(path.elements().iter().any(|el| matches!(el, PathEl::CurveTo(..))));

        path.clear();
        assert!(path.is_empty());
        assert_eq!(path.subpath_count(), 0);
    }
}
