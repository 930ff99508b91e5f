//! Engine configuration, persisted as JSON

use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::picking::PICK_PIXEL_TOLERANCE;
use crate::render::RenderOptions;
use crate::streaming::DEFAULT_DEBOUNCE;
use crate::style::Color;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub center_lon: f64,
    pub center_lat: f64,
    pub zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            center_lon: 0.0,
            center_lat: 0.0,
            zoom: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Quiet period after the last camera change before fetching
    pub debounce_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickConfig {
    /// Click tolerance in screen pixels
    pub pixel_tolerance: f64,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            pixel_tolerance: PICK_PIXEL_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub background: Color,
    pub highlight: Color,
    pub frame_budget_ms: f32,
    /// Time each draw pass
    pub profile_passes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            background: options.background,
            highlight: options.highlight,
            frame_budget_ms: 16.0,
            profile_passes: true,
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            background: self.background,
            highlight: self.highlight,
        }
    }

    /// Per-frame time budget; fails when `frame_budget_ms` is out of range
    pub fn frame_budget(&self) -> Result<Duration> {
        // Divide as Duration so whole milliseconds stay exact
        Duration::try_from_secs_f32(self.frame_budget_ms.max(0.0))
            .map(|budget| budget / 1000)
            .map_err(|e| Error::Config(format!("frame_budget_ms = {}: {}", self.frame_budget_ms, e)))
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub camera: CameraConfig,
    pub fetch: FetchConfig,
    pub pick: PickConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.fetch.debounce_ms)
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> std::result::Result<(), io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)
    }

    /// Load from file (sync); missing fields take their defaults
    pub fn load_sync(path: &Path) -> std::result::Result<Self, io::Error> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        config
            .render
            .frame_budget()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(config)
    }
}
