//! Per-pass CPU timing for the render pipeline

use std::collections::VecDeque;
use std::time::Duration;

/// Per-pass timing data (in milliseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PassTimings {
    pub background_ms: f32,
    pub polygons_ms: f32,
    pub ways_ms: f32,
    pub nodes_ms: f32,
    pub total_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Background,
    Polygons,
    Ways,
    Nodes,
}

/// Collects pass timings for the current frame and keeps a rolling history
pub struct PassProfiler {
    enabled: bool,
    current: PassTimings,
    /// Stores the latest completed frame
    latest_timings: PassTimings,
    /// Rolling average over N frames
    frame_timings: VecDeque<PassTimings>,
    max_history: usize,
}

impl PassProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: PassTimings::default(),
            latest_timings: PassTimings::default(),
            frame_timings: VecDeque::new(),
            max_history: 60,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn begin_frame(&mut self) {
        self.current = PassTimings::default();
    }

    pub fn record(&mut self, pass: Pass, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        let ms = elapsed.as_secs_f32() * 1000.0;
        match pass {
            Pass::Background => self.current.background_ms = ms,
            Pass::Polygons => self.current.polygons_ms = ms,
            Pass::Ways => self.current.ways_ms = ms,
            Pass::Nodes => self.current.nodes_ms = ms,
        }
    }

    pub fn end_frame(&mut self, total: Duration) {
        if !self.enabled {
            return;
        }
        self.current.total_ms = total.as_secs_f32() * 1000.0;

        self.frame_timings.push_back(self.current);
        if self.frame_timings.len() > self.max_history {
            self.frame_timings.pop_front();
        }
        self.latest_timings = self.current;
    }

    /// Get latest per-pass timings
    pub fn latest_timings(&self) -> PassTimings {
        self.latest_timings
    }

    /// Get averaged timings over the history window
    pub fn average_timings(&self) -> PassTimings {
        if self.frame_timings.is_empty() {
            return PassTimings::default();
        }
        let n = self.frame_timings.len() as f32;
        let mut avg = PassTimings::default();
        for t in &self.frame_timings {
            avg.background_ms += t.background_ms;
            avg.polygons_ms += t.polygons_ms;
            avg.ways_ms += t.ways_ms;
            avg.nodes_ms += t.nodes_ms;
            avg.total_ms += t.total_ms;
        }
        avg.background_ms /= n;
        avg.polygons_ms /= n;
        avg.ways_ms /= n;
        avg.nodes_ms /= n;
        avg.total_ms /= n;
        avg
    }
}

impl Default for PassProfiler {
    fn default() -> Self {
        Self::new(true)
    }
}
