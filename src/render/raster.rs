//! Software raster canvas over an RGBA image
//!
//! Coverage is binary (pixel centers), blending is source-over. This is the
//! headless backend used for screenshots; it makes no attempt at
//! anti-aliasing.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::core::error::Error;
use crate::core::types::{DVec2, Result};
use crate::style::{Color, LineCap, LineJoin};

use super::canvas::{Canvas, FillRule, Path, Stroke, Subpath};

/// Maximum distance in pixels between a curve and its flattened polyline
const FLATTEN_TOLERANCE: f64 = 0.25;

/// Pixel rectangle `[x0, x1) x [y0, y1)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelRect {
    fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

pub struct RasterCanvas {
    image: RgbaImage,
    offset: DVec2,
    /// Per-pixel clip coverage; `None` means unclipped
    clip: Option<Vec<bool>>,
    stack: Vec<(DVec2, Option<Vec<bool>>)>,
}

impl RasterCanvas {
    /// Fails when either dimension is zero
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Canvas(format!("cannot create a {}x{} surface", width, height)));
        }
        Ok(Self {
            image: RgbaImage::new(width, height),
            offset: DVec2::ZERO,
            clip: None,
            stack: Vec::new(),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let Rgba([r, g, b, a]) = *self.image.get_pixel(x, y);
        Color::rgba(r, g, b, a)
    }

    /// Encode the current contents as PNG
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| Error::Image(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    pub fn save_png(&self, path: &std::path::Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| Error::Image(e.to_string()))
    }

    fn full_rect(&self) -> PixelRect {
        PixelRect { x0: 0, y0: 0, x1: self.image.width(), y1: self.image.height() }
    }

    fn transformed(&self, subpaths: Vec<Subpath>) -> Vec<Vec<DVec2>> {
        subpaths
            .into_iter()
            .map(|sub| sub.points.into_iter().map(|p| p + self.offset).collect())
            .collect()
    }

    /// Paint every pixel for which `covered` holds, honoring the clip
    fn paint_mask(&mut self, rect: PixelRect, mask: &[bool], color: Color) {
        let width = self.image.width();
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                let local = ((y - rect.y0) * rect.width() + (x - rect.x0)) as usize;
                if !mask[local] {
                    continue;
                }
                if let Some(clip) = &self.clip {
                    if !clip[(y * width + x) as usize] {
                        continue;
                    }
                }
                blend(self.image.get_pixel_mut(x, y), color);
            }
        }
    }

    fn fill_polygons(&mut self, polygons: &[Vec<DVec2>], color: Color, rule: FillRule) {
        let Some(rect) = polygon_rect(polygons, self.full_rect()) else { return };
        let mut mask = vec![false; (rect.width() * (rect.y1 - rect.y0)) as usize];
        scan_spans(polygons, rule, rect, |y, x0, x1| {
            let row = ((y - rect.y0) * rect.width()) as usize;
            for x in x0..x1 {
                mask[row + (x - rect.x0) as usize] = true;
            }
        });
        self.paint_mask(rect, &mask, color);
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn save(&mut self) {
        self.stack.push((self.offset, self.clip.clone()));
    }

    fn restore(&mut self) {
        if let Some((offset, clip)) = self.stack.pop() {
            self.offset = offset;
            self.clip = clip;
        }
    }

    fn translate(&mut self, offset: DVec2) {
        self.offset += offset;
    }

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, color: Color) {
        let mut path = Path::new();
        path.rect(origin, size);
        self.fill_path(&path, color, FillRule::NonZero);
    }

    fn fill_path(&mut self, path: &Path, color: Color, rule: FillRule) {
        let polygons = self.transformed(path.flatten(FLATTEN_TOLERANCE));
        self.fill_polygons(&polygons, color, rule);
    }

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke) {
        if stroke.width <= 0.0 {
            return;
        }
        let flat = path.flatten(FLATTEN_TOLERANCE);
        let closed: Vec<bool> = flat.iter().map(|s| s.closed).collect();
        let subpaths = self.transformed(flat);

        // Each piece is filled on its own and OR-ed into one mask so that
        // overlapping pieces of a translucent stroke are blended once
        let mut pieces: Vec<Vec<DVec2>> = Vec::new();
        for (points, closed) in subpaths.iter().zip(closed) {
            let mut line = points.clone();
            if closed && line.len() > 2 {
                line.push(line[0]);
            }
            for run in dash_runs(&line, stroke) {
                stroke_pieces(&run, stroke, closed && stroke.dash.is_none(), &mut pieces);
            }
        }

        let Some(rect) = polygon_rect(&pieces, self.full_rect()) else { return };
        let mut mask = vec![false; (rect.width() * (rect.y1 - rect.y0)) as usize];
        for piece in &pieces {
            scan_spans(std::slice::from_ref(piece), FillRule::NonZero, rect, |y, x0, x1| {
                let row = ((y - rect.y0) * rect.width()) as usize;
                for x in x0..x1 {
                    mask[row + (x - rect.x0) as usize] = true;
                }
            });
        }
        self.paint_mask(rect, &mask, stroke.color);
    }

    fn clip(&mut self, path: &Path, rule: FillRule) {
        let polygons = self.transformed(path.flatten(FLATTEN_TOLERANCE));
        let full = self.full_rect();
        let width = full.width();
        let mut mask = vec![false; (width * full.y1) as usize];
        scan_spans(&polygons, rule, full, |y, x0, x1| {
            let row = (y * width) as usize;
            for x in x0..x1 {
                mask[row + x as usize] = true;
            }
        });

        if let Some(current) = &self.clip {
            for (m, c) in mask.iter_mut().zip(current) {
                *m &= *c;
            }
        }
        self.clip = Some(mask);
    }
}

fn blend(pixel: &mut Rgba<u8>, color: Color) {
    let a = color.a as f32 / 255.0;
    if a <= 0.0 {
        return;
    }
    let Rgba([dr, dg, db, da]) = *pixel;
    let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
    let out_a = (a + da as f32 / 255.0 * (1.0 - a)) * 255.0;
    *pixel = Rgba([mix(color.r, dr), mix(color.g, dg), mix(color.b, db), out_a.round() as u8]);
}

/// Pixel bounds of a set of polygons, clamped to `limit`
fn polygon_rect(polygons: &[Vec<DVec2>], limit: PixelRect) -> Option<PixelRect> {
    let mut min = DVec2::splat(f64::INFINITY);
    let mut max = DVec2::splat(f64::NEG_INFINITY);
    for p in polygons.iter().flatten() {
        min = min.min(*p);
        max = max.max(*p);
    }
    if !min.is_finite() || !max.is_finite() {
        return None;
    }

    let clamp = |v: f64, lo: u32, hi: u32| v.clamp(lo as f64, hi as f64) as u32;
    let rect = PixelRect {
        x0: clamp(min.x.floor(), limit.x0, limit.x1),
        y0: clamp(min.y.floor(), limit.y0, limit.y1),
        x1: clamp(max.x.ceil() + 1.0, limit.x0, limit.x1),
        y1: clamp(max.y.ceil() + 1.0, limit.y0, limit.y1),
    };
    (!rect.is_empty()).then_some(rect)
}

/// Emit `(y, x_start, x_end)` spans of pixels whose centers lie inside
fn scan_spans(polygons: &[Vec<DVec2>], rule: FillRule, rect: PixelRect, mut span: impl FnMut(u32, u32, u32)) {
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for y in rect.y0..rect.y1 {
        let sy = y as f64 + 0.5;
        crossings.clear();

        for polygon in polygons {
            let n = polygon.len();
            if n < 3 {
                continue;
            }
            for i in 0..n {
                let p = polygon[i];
                let q = polygon[(i + 1) % n];
                let upward = p.y <= sy && q.y > sy;
                let downward = q.y <= sy && p.y > sy;
                if upward || downward {
                    let x = p.x + (sy - p.y) * (q.x - p.x) / (q.y - p.y);
                    crossings.push((x, if upward { 1 } else { -1 }));
                }
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut start = 0.0;
        for &(x, dir) in &crossings {
            let was_inside = inside(winding, rule);
            winding += dir;
            let is_inside = inside(winding, rule);

            if !was_inside && is_inside {
                start = x;
            } else if was_inside && !is_inside {
                let x0 = ((start - 0.5).ceil().max(rect.x0 as f64)) as u32;
                let x1 = ((x - 0.5).ceil().min(rect.x1 as f64).max(0.0)) as u32;
                if x0 < x1 {
                    span(y, x0, x1);
                }
            }
        }
    }
}

fn inside(winding: i32, rule: FillRule) -> bool {
    match rule {
        FillRule::NonZero => winding != 0,
        FillRule::EvenOdd => winding % 2 != 0,
    }
}

/// Split a polyline into the visible runs of its dash pattern
fn dash_runs(points: &[DVec2], stroke: &Stroke) -> Vec<Vec<DVec2>> {
    let Some(dash) = stroke.dash.filter(|d| d.on > 0.0 && d.off >= 0.0) else {
        return vec![points.to_vec()];
    };
    let (on, off) = (dash.on as f64, dash.off as f64);

    let mut runs = Vec::new();
    let mut current: Vec<DVec2> = Vec::new();
    let mut drawing = true;
    let mut left = on;

    if let Some(&first) = points.first() {
        current.push(first);
    }
    for pair in points.windows(2) {
        let (mut a, b) = (pair[0], pair[1]);
        let mut remaining = a.distance(b);
        while remaining > 0.0 {
            let step = remaining.min(left);
            let p = if step >= remaining { b } else { a + (b - a) * (step / remaining) };
            if drawing {
                current.push(p);
            }
            remaining -= step;
            left -= step;
            a = p;

            if left <= 0.0 {
                if drawing {
                    runs.push(std::mem::take(&mut current));
                } else {
                    current.push(p);
                }
                drawing = !drawing;
                left = if drawing { on } else { off };
            }
        }
    }
    if drawing && current.len() > 1 {
        runs.push(current);
    }
    runs
}

/// Quads for each segment plus caps and joins, as closed polygons
fn stroke_pieces(line: &[DVec2], stroke: &Stroke, closed: bool, out: &mut Vec<Vec<DVec2>>) {
    let hw = stroke.width as f64 * 0.5;
    let line: Vec<DVec2> = dedup(line);

    if line.len() == 1 {
        if stroke.cap == LineCap::Round {
            out.push(circle(line[0], hw));
        }
        return;
    }

    let last = line.len() - 1;
    for (i, pair) in line.windows(2).enumerate() {
        let (mut a, mut b) = (pair[0], pair[1]);
        let dir = (b - a).normalize_or_zero();
        if stroke.cap == LineCap::Square && !closed {
            if i == 0 {
                a -= dir * hw;
            }
            if i + 1 == last {
                b += dir * hw;
            }
        }
        let n = dir.perp() * hw;
        out.push(vec![a - n, b - n, b + n, a + n]);
    }

    // Joins at interior vertices (and the seam of a closed ring)
    let interior = if closed { 0..=last } else { 1..=last.saturating_sub(1) };
    for i in interior {
        if !closed && (i == 0 || i == last) {
            continue;
        }
        let p = line[i];
        match stroke.join {
            LineJoin::Round => out.push(circle(p, hw)),
            // Miter limits are not modelled; both render as bevels
            LineJoin::Miter | LineJoin::Bevel => {
                let prev = if i == 0 { line[last - 1] } else { line[i - 1] };
                let next = if i == last { line[1] } else { line[i + 1] };
                let n1 = (p - prev).normalize_or_zero().perp() * hw;
                let n2 = (next - p).normalize_or_zero().perp() * hw;
                out.push(vec![p, p + n1, p + n2]);
                out.push(vec![p, p - n1, p - n2]);
            }
        }
    }

    if !closed && stroke.cap == LineCap::Round {
        out.push(circle(line[0], hw));
        out.push(circle(line[last], hw));
    }
}

fn dedup(line: &[DVec2]) -> Vec<DVec2> {
    let mut out: Vec<DVec2> = Vec::with_capacity(line.len());
    for &p in line {
        if out.last().is_none_or(|&q| q.distance_squared(p) > 1e-12) {
            out.push(p);
        }
    }
    out
}

fn circle(center: DVec2, radius: f64) -> Vec<DVec2> {
    let mut path = Path::new();
    path.circle(center, radius);
    path.flatten(FLATTEN_TOLERANCE)
        .pop()
        .map(|sub| sub.points)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(255, 0, 0);

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(RasterCanvas::new(0, 10), Err(Error::Canvas(_))));
        assert!(RasterCanvas::new(4, 4).is_ok());
    }

    #[test]
    fn test_fill_rect_with_translate() {
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        canvas.translate(DVec2::new(10.0, 10.0));
        canvas.fill_rect(DVec2::new(-2.0, -2.0), DVec2::new(4.0, 4.0), RED);

        assert_eq!(canvas.pixel(10, 10), RED);
        assert_eq!(canvas.pixel(8, 8), RED);
        assert_eq!(canvas.pixel(12, 12), Color::TRANSPARENT);
        assert_eq!(canvas.pixel(2, 2), Color::TRANSPARENT);
    }

    #[test]
    fn test_even_odd_leaves_hole() {
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        let mut path = Path::new();
        path.rect(DVec2::ZERO, DVec2::new(20.0, 20.0));
        path.rect(DVec2::new(5.0, 5.0), DVec2::new(10.0, 10.0));

        canvas.fill_path(&path, RED, FillRule::EvenOdd);
        assert_eq!(canvas.pixel(2, 2), RED);
        assert_eq!(canvas.pixel(10, 10), Color::TRANSPARENT);

        canvas.fill_path(&path, RED, FillRule::NonZero);
        assert_eq!(canvas.pixel(10, 10), RED);
    }

    #[test]
    fn test_clip_and_restore() {
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        let mut clip = Path::new();
        clip.rect(DVec2::ZERO, DVec2::new(10.0, 20.0));

        canvas.save();
        canvas.clip(&clip, FillRule::EvenOdd);
        canvas.fill_rect(DVec2::ZERO, DVec2::new(20.0, 20.0), RED);
        canvas.restore();

        assert_eq!(canvas.pixel(5, 5), RED);
        assert_eq!(canvas.pixel(15, 5), Color::TRANSPARENT);

        canvas.fill_rect(DVec2::ZERO, DVec2::new(20.0, 20.0), Color::WHITE);
        assert_eq!(canvas.pixel(15, 5), Color::WHITE);
    }

    #[test]
    fn test_stroke_covers_line() {
        let mut canvas = RasterCanvas::new(30, 10).unwrap();
        let mut path = Path::new();
        path.polyline([DVec2::new(2.0, 5.0), DVec2::new(28.0, 5.0)]);
        canvas.stroke_path(&path, &Stroke::solid(RED, 4.0));

        assert_eq!(canvas.pixel(15, 5), RED);
        assert_eq!(canvas.pixel(15, 3), RED);
        assert_eq!(canvas.pixel(15, 8), Color::TRANSPARENT);
    }

    #[test]
    fn test_translucent_stroke_blends_once() {
        let mut canvas = RasterCanvas::new(20, 20).unwrap();
        canvas.fill_rect(DVec2::ZERO, DVec2::new(20.0, 20.0), Color::WHITE);

        // Two overlapping subpaths in one call
        let mut path = Path::new();
        path.polyline([DVec2::new(0.0, 10.0), DVec2::new(20.0, 10.0)]);
        path.polyline([DVec2::new(10.0, 0.0), DVec2::new(10.0, 20.0)]);
        canvas.stroke_path(&path, &Stroke::solid(Color::BLACK.with_alpha(0.5), 4.0));

        assert_eq!(canvas.pixel(10, 10), canvas.pixel(3, 10));
    }

    #[test]
    fn test_dash_runs() {
        let stroke = Stroke {
            dash: Some(crate::style::Dash { on: 4.0, off: 2.0 }),
            ..Stroke::solid(RED, 1.0)
        };
        let runs = dash_runs(&[DVec2::ZERO, DVec2::new(14.0, 0.0)], &stroke);

        let expected = [[0.0, 4.0], [6.0, 10.0], [12.0, 14.0]];
        assert_eq!(runs.len(), expected.len());
        for (run, [start, end]) in runs.iter().zip(expected) {
            assert_eq!(run.len(), 2);
            assert!((run[0].x - start).abs() < 1e-9, "{:?}", run);
            assert!((run[1].x - end).abs() < 1e-9, "{:?}", run);
        }
    }

    #[test]
    fn test_png_header() {
        let canvas = RasterCanvas::new(2, 2).unwrap();
        let png = canvas.encode_png().unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
