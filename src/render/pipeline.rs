//! Frame composition
//!
//! One frame is drawn in a fixed order: background, polygons (clip, fill,
//! inward stroke), ways (casings, batched strokes, selection), nodes (LOD
//! markers, selection). The pipeline only issues canvas calls; it owns no
//! geometry.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::camera::Camera;
use crate::core::types::{DVec2, FeatureId};
use crate::picking::{FeatureKind, SelectedFeature};
use crate::style::{fill_color, Color, RenderFeature, ResolvedStyle, StyleResolver};
use crate::wire::{DecodedViewport, NodeRecord, PolygonView, WayView};

use super::canvas::{Canvas, FillRule, Path, Stroke};
use super::lod::{marker_scale, node_marker, NodeMarker};
use super::profiler::{Pass, PassProfiler};

/// Extra width of the translucent selection halo over the line width
pub const HALO_EXTRA_WIDTH: f32 = 8.0;
pub const HALO_ALPHA: f32 = 0.35;

pub const NODE_COLOR: Color = Color::hex(0x2b6cb0);
pub const NODE_FILL: Color = Color::WHITE;
pub const NODE_STROKE_WIDTH: f32 = 1.5;
pub const DOT_RADIUS: f64 = 3.0;
pub const SQUARE_SIZE: f64 = 7.0;
pub const CIRCLE_RADIUS: f64 = 3.5;

/// Selected node: halo radius, dot radius, outline width
const SELECTED_HALO_RADIUS: f64 = 12.0;
const SELECTED_DOT_RADIUS: f64 = 5.0;
const SELECTED_OUTLINE_WIDTH: f32 = 2.0;

/// Nodes further than this outside the canvas are skipped
const NODE_CULL_MARGIN: f64 = 16.0;

/// Colors that are not part of the feature style table
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub background: Color,
    pub highlight: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: Color::hex(0xf2efe9),
            highlight: Color::hex(0xff6b00),
        }
    }
}

/// What one frame drew
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub polygons: usize,
    pub casings: usize,
    pub ways: usize,
    /// Stroke calls issued for the batched way pass
    pub way_batches: usize,
    pub nodes: usize,
    /// The current selection was found in the data and highlighted
    pub highlighted: bool,
}

pub struct RenderPipeline {
    resolver: StyleResolver,
    options: RenderOptions,
    profiler: PassProfiler,
}

impl RenderPipeline {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            resolver: StyleResolver::new(),
            options,
            profiler: PassProfiler::default(),
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut PassProfiler {
        &mut self.profiler
    }

    /// Draw one frame of `data` as seen through `camera`
    pub fn render<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        data: &DecodedViewport,
        camera: &Camera,
        selection: Option<SelectedFeature>,
    ) -> FrameStats {
        let frame_start = Instant::now();
        self.profiler.begin_frame();
        let mut stats = FrameStats::default();

        let size = camera.size();
        let start = Instant::now();
        canvas.fill_rect(DVec2::ZERO, size, self.options.background);
        self.profiler.record(Pass::Background, start.elapsed());

        canvas.save();
        canvas.translate(size * 0.5);

        let selected_way = selection.filter(|s| s.kind == FeatureKind::Way).map(|s| s.id);
        let selected_node = selection.filter(|s| s.kind == FeatureKind::Node).map(|s| s.id);

        let start = Instant::now();
        self.draw_polygons(canvas, data, camera, selected_way, &mut stats);
        self.profiler.record(Pass::Polygons, start.elapsed());

        let start = Instant::now();
        self.draw_ways(canvas, data, camera, selected_way, &mut stats);
        self.profiler.record(Pass::Ways, start.elapsed());

        let start = Instant::now();
        self.draw_nodes(canvas, &data.nodes, camera, selected_node, &mut stats);
        self.profiler.record(Pass::Nodes, start.elapsed());

        canvas.restore();

        self.profiler.end_frame(frame_start.elapsed());
        stats
    }

    fn draw_polygons<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        data: &DecodedViewport,
        camera: &Camera,
        selected_way: Option<FeatureId>,
        stats: &mut FrameStats,
    ) {
        let mut highlight: Option<(Path, ResolvedStyle)> = None;

        for polygon in data.polygons.iter() {
            let path = polygon_path(&polygon, camera);
            if path.is_empty() {
                continue;
            }
            let style = self.resolver.resolve(polygon.feature);

            // Clipping to the area hides the outer half of a double-width
            // stroke, leaving an inward-only edge
            canvas.save();
            canvas.clip(&path, FillRule::EvenOdd);
            canvas.fill_path(&path, fill_color(polygon.feature), FillRule::EvenOdd);
            canvas.stroke_path(&path, &Stroke::from_style(&style).with_width(style.width * 2.0));
            canvas.restore();
            stats.polygons += 1;

            if selected_way == Some(polygon.id) {
                highlight = Some((path, style));
            }
        }

        if let Some((path, style)) = highlight {
            self.draw_highlight(canvas, &path, &style);
            stats.highlighted = true;
        }
    }

    fn draw_ways<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        data: &DecodedViewport,
        camera: &Camera,
        selected_way: Option<FeatureId>,
        stats: &mut FrameStats,
    ) {
        // Casings go underneath every line
        for way in data.ways.iter() {
            let style = self.resolver.resolve(way.feature);
            let (Some(casing), Some(width)) = (style.casing, style.casing_width()) else {
                continue;
            };
            let path = way_path(&way, camera);
            if path.is_empty() {
                continue;
            }
            canvas.stroke_path(&path, &Stroke::solid(casing.color, width));
            stats.casings += 1;
        }

        // Ways arrive sorted by z-order; consecutive runs of one feature code
        // share a single stroke call
        let mut batch = Path::new();
        let mut batch_feature: Option<RenderFeature> = None;
        for way in data.ways.iter() {
            if batch_feature != Some(way.feature) {
                self.flush_batch(canvas, &mut batch, batch_feature, stats);
                batch_feature = Some(way.feature);
            }
            let before = batch.subpath_count();
            batch.polyline(way.points.iter().map(|p| camera.mercator_to_local(p)));
            if batch.subpath_count() > before {
                stats.ways += 1;
            }
        }
        self.flush_batch(canvas, &mut batch, batch_feature, stats);

        if let Some(way) = selected_way.and_then(|id| data.ways.find(id)) {
            let path = way_path(&way, camera);
            if !path.is_empty() {
                let style = self.resolver.resolve(way.feature);
                self.draw_highlight_halo(canvas, &path, &style);
                canvas.stroke_path(&path, &Stroke::from_style(&style));
                stats.highlighted = true;
            }
        }
    }

    fn flush_batch<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        batch: &mut Path,
        feature: Option<RenderFeature>,
        stats: &mut FrameStats,
    ) {
        if let Some(feature) = feature {
            if !batch.is_empty() {
                let style = self.resolver.resolve(feature);
                canvas.stroke_path(batch, &Stroke::from_style(&style));
                stats.way_batches += 1;
            }
        }
        batch.clear();
    }

    fn draw_nodes<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        nodes: &[NodeRecord],
        camera: &Camera,
        selected_node: Option<FeatureId>,
        stats: &mut FrameStats,
    ) {
        let zoom = camera.zoom();
        let scale = marker_scale(zoom);
        let limit = camera.size() * 0.5 + DVec2::splat(NODE_CULL_MARGIN);

        let mut dots = Path::new();
        let mut squares = Path::new();
        let mut circles = Path::new();
        let mut selected: Option<DVec2> = None;

        for node in nodes {
            let local = camera.mercator_to_local(node.position);
            if selected_node == Some(node.id) {
                selected = Some(local);
                continue;
            }
            if local.x.abs() > limit.x || local.y.abs() > limit.y {
                continue;
            }

            match node_marker(zoom, node.ref_count) {
                NodeMarker::Hidden => continue,
                NodeMarker::Dot => dots.circle(local, DOT_RADIUS * scale),
                NodeMarker::Square => {
                    let side = SQUARE_SIZE * scale;
                    squares.rect(local - DVec2::splat(side * 0.5), DVec2::splat(side));
                }
                NodeMarker::Circle => circles.circle(local, CIRCLE_RADIUS * scale),
            }
            stats.nodes += 1;
        }

        if !dots.is_empty() {
            canvas.fill_path(&dots, NODE_COLOR, FillRule::NonZero);
        }
        for outlined in [&squares, &circles] {
            if !outlined.is_empty() {
                canvas.fill_path(outlined, NODE_FILL, FillRule::NonZero);
                canvas.stroke_path(outlined, &Stroke::solid(NODE_COLOR, NODE_STROKE_WIDTH));
            }
        }

        // Drawn last and regardless of LOD so it always sits on top
        if let Some(center) = selected {
            let highlight = self.options.highlight;

            let mut halo = Path::new();
            halo.circle(center, SELECTED_HALO_RADIUS * scale.max(1.0));
            canvas.fill_path(&halo, highlight.with_alpha(HALO_ALPHA), FillRule::NonZero);

            let mut dot = Path::new();
            dot.circle(center, SELECTED_DOT_RADIUS * scale.max(1.0));
            canvas.fill_path(&dot, highlight, FillRule::NonZero);
            canvas.stroke_path(&dot, &Stroke::solid(Color::WHITE, SELECTED_OUTLINE_WIDTH));

            stats.nodes += 1;
            stats.highlighted = true;
        }
    }

    /// Translucent halo plus a solid stroke in the highlight color
    fn draw_highlight<C: Canvas + ?Sized>(&self, canvas: &mut C, path: &Path, style: &ResolvedStyle) {
        self.draw_highlight_halo(canvas, path, style);
        canvas.stroke_path(path, &Stroke::solid(self.options.highlight, style.width + 1.0));
    }

    fn draw_highlight_halo<C: Canvas + ?Sized>(&self, canvas: &mut C, path: &Path, style: &ResolvedStyle) {
        let halo = self.options.highlight.with_alpha(HALO_ALPHA);
        canvas.stroke_path(path, &Stroke::solid(halo, style.width + HALO_EXTRA_WIDTH));
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

fn way_path(way: &WayView<'_>, camera: &Camera) -> Path {
    let mut path = Path::new();
    path.polyline(way.points.iter().map(|p| camera.mercator_to_local(p)));
    path
}

fn polygon_path(polygon: &PolygonView<'_>, camera: &Camera) -> Path {
    let mut path = Path::new();
    for ring in polygon.rings() {
        path.ring(ring.iter().map(|p| camera.mercator_to_local(p)));
    }
    path
}
