//! Debug protocol - JSON command/response definitions

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Commands accepted by the debug server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum DebugCommand {
    /// Jump to a center (degrees) and zoom
    CameraSet { lon: f64, lat: f64, zoom: f64 },
    /// Pan by a screen-space delta in pixels
    CameraPan { dx: f64, dy: f64 },
    /// Zoom by `delta` keeping the point under (x, y) fixed
    CameraZoomAt { delta: f64, x: f64, y: f64 },
    /// Get current camera state
    CameraGetState,
    /// Get the geographic rectangle sent to the data provider
    GetViewport,
    /// Click at a screen point (starts a pick)
    Click { x: f64, y: f64 },
    /// Get the selected feature
    GetSelection,
    ClearSelection,
    /// Get FPS statistics (1s/5s/15s averages with min/max)
    GetFpsStats,
    /// Get per-pass CPU timings (rolling average)
    GetPassTimings,
    /// Get counts of the loaded viewport data and fetch state
    GetSceneInfo,
    /// Refetch the current viewport immediately
    Refetch,
    /// Take a screenshot (returns base64 PNG)
    TakeScreenshot,
    /// Ping (health check)
    Ping,
}

/// Responses from debug server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DebugResponse {
    #[serde(rename = "ok")]
    Ok { data: ResponseData },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Response data variants
///
/// Untagged; `Selection` is last because its only field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    None,
    Pong { message: String },
    CameraState {
        center_lon: f64,
        center_lat: f64,
        zoom: f64,
        meters_per_pixel: f64,
        width: u32,
        height: u32,
    },
    Viewport {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
        zoom: f64,
    },
    Screenshot {
        width: u32,
        height: u32,
        png_base64: String,
    },
    ParamsUpdated { description: String },
    FpsStats {
        current_fps: f32,
        frame_count: u64,
        one_sec: FpsWindowInfo,
        five_sec: FpsWindowInfo,
        fifteen_sec: FpsWindowInfo,
        render_time_ms: f32,
        rendered_frames: u64,
        over_budget_frames: u64,
    },
    PassTimings {
        enabled: bool,
        background_ms: f32,
        polygons_ms: f32,
        ways_ms: f32,
        nodes_ms: f32,
        total_ms: f32,
    },
    SceneInfo {
        nodes: usize,
        ways: usize,
        polygons: usize,
        truncated: bool,
        loading: bool,
        picking: bool,
        fetch: FetchInfo,
    },
    Selection { selected: Option<FeatureInfo> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FpsWindowInfo {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

/// Viewport loader counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchInfo {
    pub issued: u64,
    pub loaded: u64,
    pub failed: u64,
    pub stale: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// "Node" or "Way"
    pub kind: String,
    pub id: u64,
}

impl DebugResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self::Ok { data }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error {
            message: msg.into(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(ResponseData::Pong {
            message: "pong".into(),
        })
    }

    pub fn none() -> Self {
        Self::ok(ResponseData::None)
    }

    /// Screenshot response carrying an encoded PNG
    pub fn screenshot(width: u32, height: u32, png: &[u8]) -> Self {
        Self::ok(ResponseData::Screenshot {
            width,
            height,
            png_base64: base64::engine::general_purpose::STANDARD.encode(png),
        })
    }
}
