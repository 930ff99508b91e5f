//! Mosm - headless map viewport viewer
//!
//! Drives a [`MapEngine`] over a software raster canvas at ~60 frames per
//! second, then writes the last frame as a PNG. With `--debug` it keeps
//! running and exposes the engine through the JSON debug server.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mosm::core::camera::{CameraState, Viewport};
use mosm::core::{logging, Error, Result};
use mosm::engine::{DataSummary, EngineConfig, EngineEvent, MapEngine};
use mosm::math::projection;
use mosm::picking::{FeatureKind, SelectedFeature};
use mosm::provider::synthetic::{self, TownOptions};
use mosm::provider::MemoryProvider;
use mosm::render::{PassTimings, RasterCanvas, SchedulerStats};
use mosm::streaming::LoaderStats;
use mosm::wire;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Starting zoom over the scene center when no config file is given
const SCENE_ZOOM: f64 = 17.0;

/// Camera changes requested by the debug server, applied by the render loop
#[derive(Debug, Clone, Copy)]
enum Control {
    Set { lon: f64, lat: f64, zoom: f64 },
    Pan { dx: f64, dy: f64 },
    ZoomAt { delta: f64, x: f64, y: f64 },
    Click { x: f64, y: f64 },
    ClearSelection,
    Refetch,
}

/// Shared state between the debug server and the render loop
#[derive(Default)]
struct SharedDebugState {
    // Set by the debug handler, drained by the render loop
    pending_controls: Vec<Control>,

    // Updated by the render loop each frame
    camera: Option<CameraState>,
    meters_per_pixel: f64,
    size: (u32, u32),
    viewport: Option<Viewport>,
    selection: Option<SelectedFeature>,
    scheduler: SchedulerStats,
    pass_timings: PassTimings,
    profiling: bool,
    scene: DataSummary,
    loading: bool,
    picking: bool,
    loader: LoaderStats,

    // Screenshot (render loop captures, handler reads)
    screenshot_requested: bool,
    screenshot_data: Option<(u32, u32, Vec<u8>)>,
}

fn lock(state: &StdMutex<SharedDebugState>) -> MutexGuard<'_, SharedDebugState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct AppDebugHandler {
    state: Arc<StdMutex<SharedDebugState>>,
}

impl AppDebugHandler {
    fn queue(&self, control: Control) -> mosm_debug::DebugResponse {
        lock(&self.state).pending_controls.push(control);
        mosm_debug::DebugResponse::ok(mosm_debug::ResponseData::ParamsUpdated {
            description: format!("{:?} queued", control),
        })
    }
}

impl mosm_debug::DebugHandler for AppDebugHandler {
    fn handle_command(&mut self, cmd: mosm_debug::DebugCommand) -> mosm_debug::DebugResponse {
        use mosm_debug::*;

        match cmd {
            DebugCommand::Ping => DebugResponse::pong(),

            DebugCommand::CameraSet { lon, lat, zoom } => self.queue(Control::Set { lon, lat, zoom }),
            DebugCommand::CameraPan { dx, dy } => self.queue(Control::Pan { dx, dy }),
            DebugCommand::CameraZoomAt { delta, x, y } => self.queue(Control::ZoomAt { delta, x, y }),
            DebugCommand::Click { x, y } => self.queue(Control::Click { x, y }),
            DebugCommand::ClearSelection => self.queue(Control::ClearSelection),
            DebugCommand::Refetch => self.queue(Control::Refetch),

            DebugCommand::CameraGetState => {
                let s = lock(&self.state);
                match s.camera {
                    Some(camera) => DebugResponse::ok(ResponseData::CameraState {
                        center_lon: camera.center_lon,
                        center_lat: camera.center_lat,
                        zoom: camera.zoom,
                        meters_per_pixel: s.meters_per_pixel,
                        width: s.size.0,
                        height: s.size.1,
                    }),
                    None => DebugResponse::error("Engine not running yet"),
                }
            }

            DebugCommand::GetViewport => match lock(&self.state).viewport {
                Some(v) => DebugResponse::ok(ResponseData::Viewport {
                    min_lon: v.min_lon,
                    min_lat: v.min_lat,
                    max_lon: v.max_lon,
                    max_lat: v.max_lat,
                    zoom: v.zoom,
                }),
                None => DebugResponse::error("Engine not running yet"),
            },

            DebugCommand::GetSelection => {
                let selected = lock(&self.state).selection.map(|feature| FeatureInfo {
                    kind: match feature.kind {
                        FeatureKind::Node => "Node".into(),
                        FeatureKind::Way => "Way".into(),
                    },
                    id: feature.id,
                });
                DebugResponse::ok(ResponseData::Selection { selected })
            }

            DebugCommand::GetFpsStats => {
                let stats = lock(&self.state).scheduler;
                let window = |w: mosm::core::time::FpsWindow| FpsWindowInfo {
                    avg: w.avg,
                    min: w.min,
                    max: w.max,
                };
                DebugResponse::ok(ResponseData::FpsStats {
                    current_fps: stats.fps.current_fps,
                    frame_count: stats.fps.frame_count,
                    one_sec: window(stats.fps.one_sec),
                    five_sec: window(stats.fps.five_sec),
                    fifteen_sec: window(stats.fps.fifteen_sec),
                    render_time_ms: stats.render_time_ms,
                    rendered_frames: stats.rendered_frames,
                    over_budget_frames: stats.over_budget_frames,
                })
            }

            DebugCommand::GetPassTimings => {
                let s = lock(&self.state);
                let t = s.pass_timings;
                DebugResponse::ok(ResponseData::PassTimings {
                    enabled: s.profiling,
                    background_ms: t.background_ms,
                    polygons_ms: t.polygons_ms,
                    ways_ms: t.ways_ms,
                    nodes_ms: t.nodes_ms,
                    total_ms: t.total_ms,
                })
            }

            DebugCommand::GetSceneInfo => {
                let s = lock(&self.state);
                DebugResponse::ok(ResponseData::SceneInfo {
                    nodes: s.scene.nodes,
                    ways: s.scene.ways,
                    polygons: s.scene.polygons,
                    truncated: s.scene.truncated,
                    loading: s.loading,
                    picking: s.picking,
                    fetch: FetchInfo {
                        issued: s.loader.issued,
                        loaded: s.loader.loaded,
                        failed: s.loader.failed,
                        stale: s.loader.stale,
                        dropped: s.loader.dropped,
                    },
                })
            }

            DebugCommand::TakeScreenshot => {
                {
                    let mut s = lock(&self.state);
                    s.screenshot_requested = true;
                    s.screenshot_data = None;
                }

                // Poll for result (up to 2 seconds)
                for _ in 0..200 {
                    std::thread::sleep(Duration::from_millis(10));
                    let mut s = lock(&self.state);
                    if let Some((width, height, png)) = s.screenshot_data.take() {
                        s.screenshot_requested = false;
                        return DebugResponse::screenshot(width, height, &png);
                    }
                }

                DebugResponse::error("Screenshot timed out")
            }
        }
    }
}

type Engine = MapEngine<RasterCanvas, MemoryProvider>;

/// Apply queued debug controls and answer a pending screenshot request
fn process_debug_commands(engine: &mut Engine, state: &StdMutex<SharedDebugState>, now: Instant) {
    let (controls, screenshot) = {
        let mut s = lock(state);
        let wants_screenshot = s.screenshot_requested && s.screenshot_data.is_none();
        (std::mem::take(&mut s.pending_controls), wants_screenshot)
    };

    for control in controls {
        match control {
            Control::Set { lon, lat, zoom } => {
                engine.set_camera(lon, lat, zoom, now);
            }
            Control::Pan { dx, dy } => {
                engine.pan(dx, dy, now);
            }
            Control::ZoomAt { delta, x, y } => {
                engine.zoom_at(delta, x, y, now);
            }
            Control::Click { x, y } => {
                if !engine.click(x, y) {
                    log::info!("Debug click at ({}, {}) ignored, pick in flight", x, y);
                }
            }
            Control::ClearSelection => engine.clear_selection(),
            Control::Refetch => {
                engine.request_refresh();
            }
        }
    }

    if screenshot {
        let (width, height) = engine.canvas().image().dimensions();
        match engine.canvas().encode_png() {
            Ok(png) => lock(state).screenshot_data = Some((width, height, png)),
            Err(e) => log::error!("Screenshot failed: {}", e),
        }
    }
}

/// Copy the engine's read-only state for the debug handler
fn publish_debug_state(engine: &Engine, state: &StdMutex<SharedDebugState>) {
    let mut s = lock(state);
    let camera = engine.camera();
    s.camera = Some(camera.state());
    s.meters_per_pixel = camera.meters_per_pixel();
    s.size = (camera.size().x as u32, camera.size().y as u32);
    s.viewport = Some(engine.viewport());
    s.selection = engine.selection();
    s.scheduler = engine.scheduler_stats();
    s.pass_timings = engine.pass_timings();
    s.profiling = engine.profiling_enabled();
    s.loading = engine.is_loading();
    s.picking = engine.is_picking();
    s.loader = engine.loader_stats();
    let data = engine.data();
    s.scene = DataSummary {
        nodes: data.nodes.len(),
        ways: data.ways.len(),
        polygons: data.polygons.len(),
        truncated: data.header.truncated,
        bytes: data.ways.byte_len() + data.polygons.byte_len(),
    };
}

fn log_event(event: EngineEvent) {
    match event {
        EngineEvent::CameraChanged(changed) => log::debug!(
            "Camera: ({:.6}, {:.6}) z{:.2}",
            changed.state.center_lon,
            changed.state.center_lat,
            changed.state.zoom
        ),
        EngineEvent::FeatureClicked(query) => log::debug!(
            "Click: ({:.1}, {:.1}) tolerance {:.2}m",
            query.merc_x,
            query.merc_y,
            query.tolerance_meters
        ),
        EngineEvent::SelectionChanged(Some(feature)) => {
            log::info!("Selected {:?} {}", feature.kind, feature.id)
        }
        EngineEvent::SelectionChanged(None) => log::info!("Selection cleared"),
        EngineEvent::DataLoaded(summary) if summary.truncated => {
            log::info!("Provider hit its result cap; zoom in to see everything")
        }
        EngineEvent::DataLoaded(_) => {}
        EngineEvent::FetchFailed(e) => log::warn!("Keeping previous data: {}", e),
        EngineEvent::PickFailed(e) => log::warn!("Keeping previous selection: {}", e),
    }
}

/// Command line options
struct ViewerOptions {
    buffer: Option<PathBuf>,
    config: Option<PathBuf>,
    lon: Option<f64>,
    lat: Option<f64>,
    zoom: Option<f64>,
    width: u32,
    height: u32,
    frames: u64,
    out: PathBuf,
    debug: bool,
}

impl ViewerOptions {
    fn parse(args: &[String]) -> Self {
        Self {
            buffer: parse_arg(args, &["--buffer", "-b"]),
            config: parse_arg(args, &["--config", "-c"]),
            lon: parse_arg(args, &["--lon"]),
            lat: parse_arg(args, &["--lat"]),
            zoom: parse_arg(args, &["--zoom", "-z"]),
            width: parse_arg(args, &["--width"]).unwrap_or(1024),
            height: parse_arg(args, &["--height"]).unwrap_or(768),
            frames: parse_arg(args, &["--frames", "-n"]).unwrap_or(1),
            out: parse_arg(args, &["--out", "-o"]).unwrap_or_else(|| PathBuf::from("frame.png")),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

/// Parse the value following any of `names`
fn parse_arg<T: std::str::FromStr>(args: &[String], names: &[&str]) -> Option<T> {
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}

/// Load the scene and pick a starting camera that shows it
fn load_scene(options: &ViewerOptions) -> Result<(MemoryProvider, EngineConfig)> {
    let mut config = match &options.config {
        Some(path) => EngineConfig::load_sync(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
        None => EngineConfig::default(),
    };

    let provider = match &options.buffer {
        Some(path) => {
            log::info!("Loading viewport buffer from: {}", path.display());
            let bytes = std::fs::read(path)?;
            let data = wire::decode(&bytes)?;
            MemoryProvider::from_decoded(&data)
        }
        None => {
            log::info!("No buffer given, generating synthetic town");
            synthetic::town(&TownOptions::default())
        }
    };

    if options.config.is_none() {
        if let Some(bounds) = provider.bounds() {
            let center = projection::inverse(bounds.center());
            config.camera.center_lon = center.lon;
            config.camera.center_lat = center.lat;
            config.camera.zoom = SCENE_ZOOM;
        }
    }
    if let Some(lon) = options.lon {
        config.camera.center_lon = lon;
    }
    if let Some(lat) = options.lat {
        config.camera.center_lat = lat;
    }
    if let Some(zoom) = options.zoom {
        config.camera.zoom = zoom;
    }

    log::info!(
        "Scene: {} nodes, {} ways, {} polygons",
        provider.node_count(),
        provider.way_count(),
        provider.polygon_count()
    );
    Ok((provider, config))
}

fn start_debug_server() -> Arc<StdMutex<SharedDebugState>> {
    let state = Arc::new(StdMutex::new(SharedDebugState::default()));

    // Debug server gets its own runtime so blocking handlers never stall frames
    let handler_state = state.clone();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Failed to create debug server runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            let handler = Arc::new(tokio::sync::Mutex::new(AppDebugHandler { state: handler_state }));
            let _server = mosm_debug::DebugServer::start(handler, mosm_debug::DEFAULT_PORT);
            log::info!("Debug server started on port {}", mosm_debug::DEFAULT_PORT);
            // Keep runtime alive forever
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    });

    state
}

async fn run(options: ViewerOptions) -> Result<()> {
    let (provider, config) = load_scene(&options)?;
    let canvas = RasterCanvas::new(options.width, options.height)?;
    let mut engine = MapEngine::new(
        canvas,
        Arc::new(provider),
        config,
        tokio::runtime::Handle::current(),
        Instant::now(),
    )?;

    let debug_state = options.debug.then(start_debug_server);

    loop {
        let now = Instant::now();
        if let Some(state) = &debug_state {
            process_debug_commands(&mut engine, state, now);
        }

        if let Some(stats) = engine.frame(now) {
            log::debug!(
                "Frame: {} polygons, {} ways in {} batches, {} nodes",
                stats.polygons,
                stats.ways,
                stats.way_batches,
                stats.nodes
            );
        }
        for event in engine.drain_events() {
            log_event(event);
        }

        if let Some(state) = &debug_state {
            publish_debug_state(&engine, state);
        } else if engine.scheduler_stats().fps.frame_count >= options.frames
            && !engine.is_loading()
            && !engine.is_dirty()
        {
            break;
        }

        tokio::time::sleep(FRAME_INTERVAL).await;
    }

    let stats = engine.scheduler_stats();
    let timings = engine.pass_timings();
    log::info!(
        "{} frames ({} rendered), last render {:.2}ms: polygons {:.2}ms, ways {:.2}ms, nodes {:.2}ms",
        stats.fps.frame_count,
        stats.rendered_frames,
        stats.render_time_ms,
        timings.polygons_ms,
        timings.ways_ms,
        timings.nodes_ms
    );

    engine.canvas().save_png(&options.out)?;
    log::info!("Wrote {}", options.out.display());
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Mosm viewer starting...");

    let args: Vec<String> = std::env::args().collect();
    let options = ViewerOptions::parse(&args);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(options)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
