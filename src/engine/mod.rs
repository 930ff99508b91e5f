//! Viewport engine context
//!
//! [`MapEngine`] owns the camera, the decoded buffers, the selection and the
//! render state for one canvas. The host calls its mutators from input
//! handlers and [`MapEngine::frame`] from its per-frame callback; everything
//! runs on the caller's thread except provider I/O, which is spawned onto the
//! tokio runtime and drained at the start of each frame.

pub mod config;
pub mod events;

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;

use crate::core::camera::{Camera, CameraChanged, Viewport};
use crate::core::error::Error;
use crate::core::types::{FeatureId, Result};
use crate::picking::{PickResponse, Picker, SelectedFeature, Selection};
use crate::provider::{DataProvider, UndoRedoResult, UpdateTagsResult};
use crate::render::{Canvas, FrameScheduler, FrameStats, PassTimings, RenderPipeline, SchedulerStats};
use crate::streaming::{LoadEvent, LoaderStats, ViewportLoader};
use crate::style::RenderFeature;
use crate::wire::DecodedViewport;

pub use config::EngineConfig;
pub use events::{DataSummary, EngineEvent};

pub struct MapEngine<C, P> {
    canvas: C,
    camera: Camera,
    pipeline: RenderPipeline,
    scheduler: FrameScheduler,
    loader: ViewportLoader<P>,
    picker: Picker<P>,
    selection: Selection,
    data: DecodedViewport,
    last_frame: FrameStats,
    events: Vec<EngineEvent>,
    config: EngineConfig,
}

impl<C: Canvas, P: DataProvider> MapEngine<C, P> {
    /// Create an engine drawing into `canvas` and issue the first fetch
    ///
    /// Fails if the canvas has no drawable area.
    pub fn new(canvas: C, provider: Arc<P>, config: EngineConfig, runtime: Handle, now: Instant) -> Result<Self> {
        let (width, height) = canvas.size();
        if width == 0 || height == 0 {
            return Err(Error::Canvas(format!("canvas has no drawable area ({}x{})", width, height)));
        }

        let camera = Camera::new(
            config.camera.center_lon,
            config.camera.center_lat,
            config.camera.zoom,
            width,
            height,
        );

        let frame_budget = config.render.frame_budget()?;

        let mut pipeline = RenderPipeline::new(config.render.options());
        pipeline.profiler_mut().set_enabled(config.render.profile_passes);

        let mut loader = ViewportLoader::new(Arc::clone(&provider), runtime.clone(), config.debounce());
        loader.request_now(camera.viewport());

        log::info!(
            "Map engine ready: {}x{} at ({:.5}, {:.5}) z{:.2}",
            width,
            height,
            camera.state().center_lon,
            camera.state().center_lat,
            camera.zoom()
        );

        Ok(Self {
            canvas,
            camera,
            pipeline,
            scheduler: FrameScheduler::new(frame_budget, now),
            loader,
            picker: Picker::new(provider, runtime, config.pick.pixel_tolerance),
            selection: Selection::new(),
            data: DecodedViewport::default(),
            last_frame: FrameStats::default(),
            events: Vec::new(),
            config,
        })
    }

    // --- Camera ---

    /// Jump to a new center and zoom; `None` if any input is not finite
    pub fn set_camera(&mut self, center_lon: f64, center_lat: f64, zoom: f64, now: Instant) -> Option<CameraChanged> {
        let changed = self.camera.set_camera(center_lon, center_lat, zoom)?;
        self.camera_changed(changed, now);
        Some(changed)
    }

    /// Pan by a screen-space delta in pixels
    pub fn pan(&mut self, dx: f64, dy: f64, now: Instant) -> Option<CameraChanged> {
        let changed = self.camera.pan(dx, dy)?;
        self.camera_changed(changed, now);
        Some(changed)
    }

    /// Zoom around a screen point; `None` if the zoom is already at its limit
    /// or an input is not finite
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64, now: Instant) -> Option<CameraChanged> {
        let changed = self.camera.zoom_at(delta, screen_x, screen_y)?;
        self.camera_changed(changed, now);
        Some(changed)
    }

    fn camera_changed(&mut self, changed: CameraChanged, now: Instant) {
        self.scheduler.invalidate();
        self.loader.request(changed.viewport, now);
        self.events.push(EngineEvent::CameraChanged(changed));
    }

    // --- Picking and selection ---

    /// Start a pick at a screen point
    ///
    /// Returns `false` when a pick is already pending; the click is dropped.
    pub fn click(&mut self, screen_x: f64, screen_y: f64) -> bool {
        let query = self.picker.query_at(&self.camera, screen_x, screen_y);
        if !self.picker.pick(query) {
            return false;
        }
        self.events.push(EngineEvent::FeatureClicked(query));
        true
    }

    /// Select a feature directly, e.g. from a search result
    pub fn select(&mut self, feature: SelectedFeature) {
        if self.selection.set(feature) {
            self.selection_changed();
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.selection_changed();
        }
    }

    fn selection_changed(&mut self) {
        self.scheduler.invalidate();
        self.events.push(EngineEvent::SelectionChanged(self.selection.get()));
    }

    // --- Edits ---

    /// React to a tag edit; refetches when the way's paint style changed
    ///
    /// Returns `true` if a refetch was issued.
    pub fn on_way_tags_updated(&mut self, way_id: FeatureId, result: &UpdateTagsResult) -> bool {
        if !result.success {
            return false;
        }
        let updated = RenderFeature(result.render_feature);
        if self.data.feature_of(way_id) == Some(updated) {
            return false;
        }
        log::debug!("Way {} now renders as {:#06x}, refetching", way_id, updated.0);
        self.request_refresh();
        true
    }

    /// React to an undo or redo; returns `true` if a refetch was issued
    pub fn on_history_result(&mut self, result: &UndoRedoResult) -> bool {
        if !result.needs_redraw {
            return false;
        }
        self.request_refresh();
        true
    }

    /// Fetch the current viewport now, superseding any fetch in flight
    pub fn request_refresh(&mut self) -> u64 {
        self.loader.request_now(self.camera.viewport())
    }

    // --- Frame loop ---

    /// Host frame callback
    ///
    /// Applies finished fetches and picks, then renders if anything changed.
    /// Returns the frame's draw statistics when a render happened.
    pub fn frame(&mut self, now: Instant) -> Option<FrameStats> {
        for event in self.loader.poll(now) {
            self.apply_load(event);
        }
        while let Some(response) = self.picker.poll() {
            self.apply_pick(response);
        }

        let Self { canvas, camera, pipeline, scheduler, selection, data, .. } = self;
        let stats = scheduler.tick(now, || pipeline.render(canvas, data, camera, selection.get()))?;
        self.last_frame = stats;
        Some(stats)
    }

    /// Wait for every outstanding fetch and pick and apply them
    ///
    /// Pending debounced requests are not issued; only `frame` does that.
    pub async fn settle(&mut self) {
        while let Some(event) = self.loader.wait().await {
            self.apply_load(event);
        }
        if let Some(response) = self.picker.wait().await {
            self.apply_pick(response);
        }
    }

    /// Force the next frame to render
    pub fn invalidate(&mut self) {
        self.scheduler.invalidate();
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn apply_load(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Loaded { seq, data, bytes, elapsed, .. } => {
                let summary = DataSummary {
                    nodes: data.nodes.len(),
                    ways: data.ways.len(),
                    polygons: data.polygons.len(),
                    truncated: data.header.truncated,
                    bytes,
                };
                log::info!(
                    "Fetch #{}: {} nodes, {} ways, {} polygons ({} bytes) in {:.1}ms{}",
                    seq,
                    summary.nodes,
                    summary.ways,
                    summary.polygons,
                    bytes,
                    elapsed.as_secs_f64() * 1000.0,
                    if summary.truncated { ", truncated" } else { "" }
                );
                self.data = data;
                self.scheduler.invalidate();
                self.events.push(EngineEvent::DataLoaded(summary));
            }
            LoadEvent::Failed { error, .. } => {
                self.events.push(EngineEvent::FetchFailed(error.to_string()));
            }
        }
    }

    fn apply_pick(&mut self, response: PickResponse) {
        match response.result {
            Ok(result) => {
                if self.selection.apply(result) {
                    self.selection_changed();
                }
            }
            Err(e) => {
                log::warn!("Pick failed: {}", e);
                self.events.push(EngineEvent::PickFailed(e.to_string()));
            }
        }
    }

    // --- Accessors ---

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.camera.viewport()
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn data(&self) -> &DecodedViewport {
        &self.data
    }

    pub fn selection(&self) -> Option<SelectedFeature> {
        self.selection.get()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn is_picking(&self) -> bool {
        self.picker.is_picking()
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_dirty()
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    pub fn pass_timings(&self) -> PassTimings {
        self.pipeline.profiler().average_timings()
    }

    pub fn profiling_enabled(&self) -> bool {
        self.pipeline.profiler().is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::types::DVec2;
    use crate::math::projection;
    use crate::picking::FeatureKind;
    use crate::provider::scripted::ScriptedProvider;
    use crate::provider::{MemoryProvider, PickResult};
    use crate::render::RecordingCanvas;
    use crate::style::{base_type, flags};
    use crate::wire::ViewportEncoder;

    const ROAD: RenderFeature = RenderFeature::new(base_type::HIGHWAY_ROAD, 0);

    fn road_buffer(feature: RenderFeature) -> Vec<u8> {
        let mut encoder = ViewportEncoder::new();
        encoder.push_way(7, feature, &[DVec2::new(-50.0, 0.0), DVec2::new(50.0, 0.0)]);
        encoder.finish()
    }

    fn config_at_origin(zoom: f64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.camera.zoom = zoom;
        config
    }

    fn scripted_engine(provider: &Arc<ScriptedProvider>, now: Instant) -> MapEngine<RecordingCanvas, ScriptedProvider> {
        MapEngine::new(
            RecordingCanvas::new(800, 600),
            Arc::clone(provider),
            config_at_origin(17.0),
            Handle::current(),
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_zero_sized_canvas_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new());
        let result = MapEngine::new(
            RecordingCanvas::new(0, 600),
            provider,
            EngineConfig::default(),
            Handle::current(),
            Instant::now(),
        );
        assert!(matches!(result, Err(Error::Canvas(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_frame_budget_is_config_error() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut config = EngineConfig::default();
        config.render.frame_budget_ms = 1e30;

        let result = MapEngine::new(
            RecordingCanvas::new(800, 600),
            Arc::clone(&provider),
            config,
            Handle::current(),
            Instant::now(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(provider.viewport_query_count(), 0);
    }

    #[tokio::test]
    async fn test_initial_fetch_then_render() {
        let mut memory = MemoryProvider::new();
        let origin = projection::forward(0.0, 0.0);
        memory.add_way(7, ROAD, 0, vec![origin - DVec2::X * 20.0, origin + DVec2::X * 20.0]);
        let provider = Arc::new(memory);

        let now = Instant::now();
        let mut engine = MapEngine::new(
            RecordingCanvas::new(800, 600),
            provider,
            config_at_origin(17.0),
            Handle::current(),
            now,
        )
        .unwrap();
        assert!(engine.is_loading());

        engine.settle().await;
        assert_eq!(engine.data().ways.len(), 1);
        let events = engine.drain_events();
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::DataLoaded(DataSummary { ways: 1, truncated: false, .. })]
        ));

        let stats = engine.frame(now).unwrap();
        assert_eq!(stats.ways, 1);

        // Nothing changed: the next frame does no work
        assert!(engine.frame(now + Duration::from_millis(16)).is_none());
        assert_eq!(engine.scheduler_stats().rendered_frames, 1);
    }

    #[tokio::test]
    async fn test_camera_burst_triggers_one_debounced_fetch() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));

        let t0 = Instant::now();
        let mut engine = scripted_engine(&provider, t0);
        engine.settle().await;
        engine.drain_events();

        for i in 0..4 {
            let now = t0 + Duration::from_millis(40 * i);
            engine.pan(10.0, 0.0, now);
            engine.frame(now);
        }
        let camera_events = engine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::CameraChanged(_)))
            .count();
        assert_eq!(camera_events, 4);
        assert!(!engine.is_loading());

        engine.frame(t0 + Duration::from_millis(120 + 300));
        assert!(engine.is_loading());
        engine.settle().await;
        assert_eq!(provider.viewport_query_count(), 2);

        let last = provider.viewport_queries.lock().unwrap()[1];
        assert_eq!(last, engine.viewport());
    }

    #[tokio::test]
    async fn test_click_selects_and_highlights() {
        let mut memory = MemoryProvider::new();
        let origin = projection::forward(0.0, 0.0);
        memory.add_way(7, ROAD, 0, vec![origin - DVec2::X * 20.0, origin + DVec2::X * 20.0]);
        let provider = Arc::new(memory);

        let now = Instant::now();
        let mut engine = MapEngine::new(
            RecordingCanvas::new(800, 600),
            provider,
            config_at_origin(18.0),
            Handle::current(),
            now,
        )
        .unwrap();
        engine.settle().await;
        engine.frame(now);
        engine.drain_events();

        assert!(engine.click(400.0, 302.0));
        // Second click while the first is pending is ignored
        assert!(!engine.click(10.0, 10.0));
        engine.settle().await;

        let events = engine.drain_events();
        assert!(matches!(events[0], EngineEvent::FeatureClicked(_)));
        assert_eq!(
            events[1],
            EngineEvent::SelectionChanged(Some(SelectedFeature { kind: FeatureKind::Way, id: 7 }))
        );

        let stats = engine.frame(now + Duration::from_millis(16)).unwrap();
        assert!(stats.highlighted);
    }

    #[tokio::test]
    async fn test_pick_none_clears_and_failure_keeps_selection() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));
        provider.push_pick(Duration::ZERO, Err("lookup failed".into()));
        provider.push_pick(Duration::ZERO, Ok(PickResult::None));

        let mut engine = scripted_engine(&provider, Instant::now());
        engine.settle().await;
        engine.select(SelectedFeature::way(7));
        engine.drain_events();

        engine.click(400.0, 300.0);
        engine.settle().await;
        assert_eq!(engine.selection(), Some(SelectedFeature::way(7)));
        assert!(engine.drain_events().iter().any(|e| matches!(e, EngineEvent::PickFailed(_))));

        engine.click(400.0, 300.0);
        engine.settle().await;
        assert_eq!(engine.selection(), None);
        assert!(engine.drain_events().contains(&EngineEvent::SelectionChanged(None)));
    }

    #[tokio::test]
    async fn test_panicking_provider_does_not_wedge_engine() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));
        provider.push_pick(Duration::ZERO, Ok(PickResult::Way { id: 7 }));

        let mut engine = scripted_engine(&provider, Instant::now());
        engine.settle().await;
        engine.drain_events();

        provider.panic_next_viewport();
        engine.request_refresh();
        engine.settle().await;
        assert!(!engine.is_loading());
        assert_eq!(engine.data().ways.len(), 1);
        assert!(matches!(engine.drain_events().as_slice(), [EngineEvent::FetchFailed(_)]));

        provider.panic_next_pick();
        assert!(engine.click(400.0, 300.0));
        engine.settle().await;
        assert!(!engine.is_picking());
        assert!(engine.drain_events().iter().any(|e| matches!(e, EngineEvent::PickFailed(_))));

        assert!(engine.click(400.0, 300.0));
        engine.settle().await;
        assert_eq!(engine.selection(), Some(SelectedFeature::way(7)));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_data() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));
        provider.push_viewport(Duration::ZERO, Ok(vec![0; 7]));

        let mut engine = scripted_engine(&provider, Instant::now());
        engine.settle().await;
        engine.drain_events();

        engine.request_refresh();
        engine.settle().await;
        assert_eq!(engine.data().ways.len(), 1);
        assert!(matches!(engine.drain_events().as_slice(), [EngineEvent::FetchFailed(_)]));
    }

    #[tokio::test]
    async fn test_edit_results_trigger_refetch() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD)));
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD.with(flags::BRIDGE))));
        provider.push_viewport(Duration::ZERO, Ok(road_buffer(ROAD.with(flags::BRIDGE))));

        let mut engine = scripted_engine(&provider, Instant::now());
        engine.settle().await;

        let unchanged = UpdateTagsResult { success: true, render_feature: ROAD.0, layer: 0, is_area: false };
        assert!(!engine.on_way_tags_updated(7, &unchanged));

        let failed = UpdateTagsResult { success: false, render_feature: 0, layer: 0, is_area: false };
        assert!(!engine.on_way_tags_updated(7, &failed));

        let bridged = UpdateTagsResult { render_feature: ROAD.with(flags::BRIDGE).0, ..unchanged };
        assert!(engine.on_way_tags_updated(7, &bridged));
        engine.settle().await;
        assert_eq!(engine.data().feature_of(7), Some(ROAD.with(flags::BRIDGE)));

        let mut history = UndoRedoResult {
            success: true,
            needs_redraw: false,
            message: None,
            undo_count: 1,
            redo_count: 0,
        };
        assert!(!engine.on_history_result(&history));
        history.needs_redraw = true;
        assert!(engine.on_history_result(&history));
        engine.settle().await;
        assert_eq!(provider.viewport_query_count(), 3);
    }
}
