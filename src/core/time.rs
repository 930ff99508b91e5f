//! Frame timing utilities

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Width of the window over which `fps()` is recomputed
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Frames older than this are dropped from the rolling history
const HISTORY_SPAN: Duration = Duration::from_secs(15);

/// FPS statistics for a time window
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FpsWindow {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

/// Rolling FPS statistics over multiple time windows
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FpsStats {
    pub one_sec: FpsWindow,
    pub five_sec: FpsWindow,
    pub fifteen_sec: FpsWindow,
    pub current_fps: f32,
    pub frame_count: u64,
}

/// Tracks host frame callbacks and calculates FPS
///
/// Every host callback counts as a frame, whether or not anything was
/// redrawn; the timer only does bookkeeping.
pub struct FrameTimer {
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    fps_timer: Instant,
    fps: f32,
    fps_frame_count: u32,
    /// Ring buffer of (timestamp, frame_time_secs) for rolling stats
    frame_history: VecDeque<(Instant, f32)>,
}

impl FrameTimer {
    /// Create a new frame timer
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a timer whose first window opens at `now`
    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
            fps_timer: now,
            fps: 0.0,
            fps_frame_count: 0,
            frame_history: VecDeque::new(),
        }
    }

    /// Call once per frame to update timing
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Update timing for a frame that started at `now`
    pub fn tick_at(&mut self, now: Instant) {
        self.delta = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;
        self.fps_frame_count += 1;

        let frame_time = self.delta.as_secs_f32();
        self.frame_history.push_back((now, frame_time));

        // Prune frames older than the longest window
        while let Some(&(timestamp, _)) = self.frame_history.front() {
            if now.saturating_duration_since(timestamp) > HISTORY_SPAN {
                self.frame_history.pop_front();
            } else {
                break;
            }
        }

        // Update FPS once per window
        let fps_elapsed = now.saturating_duration_since(self.fps_timer);
        if fps_elapsed >= FPS_WINDOW {
            self.fps = self.fps_frame_count as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = 0;
            self.fps_timer = now;
        }
    }

    /// Get delta time in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get delta time as Duration
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Get current FPS (updated every second)
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Get total frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get rolling FPS statistics over 1s, 5s, and 15s windows
    pub fn fps_stats(&self) -> FpsStats {
        let now = self.last_frame;

        FpsStats {
            one_sec: self.compute_window_stats(now, Duration::from_secs(1)),
            five_sec: self.compute_window_stats(now, Duration::from_secs(5)),
            fifteen_sec: self.compute_window_stats(now, Duration::from_secs(15)),
            current_fps: self.fps,
            frame_count: self.frame_count,
        }
    }

    /// Compute FPS statistics for a given time window
    fn compute_window_stats(&self, now: Instant, window: Duration) -> FpsWindow {
        let mut frame_count = 0;
        let mut total_time = 0.0f32;
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;

        for &(timestamp, frame_time) in self.frame_history.iter() {
            if now.saturating_duration_since(timestamp) <= window {
                frame_count += 1;
                total_time += frame_time;

                let fps = if frame_time > 0.0 { 1.0 / frame_time } else { 0.0 };
                min_fps = min_fps.min(fps);
                max_fps = max_fps.max(fps);
            }
        }

        if frame_count == 0 {
            return FpsWindow::default();
        }

        let avg = if total_time > 0.0 {
            frame_count as f32 / total_time
        } else {
            0.0
        };

        FpsWindow {
            avg,
            min: min_fps,
            max: max_fps,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_updates_after_one_second() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        // 10 frames spaced 100ms apart
        for i in 1..=10 {
            timer.tick_at(start + Duration::from_millis(100 * i));
        }

        assert_eq!(timer.frame_count(), 10);
        assert!((timer.fps() - 10.0).abs() < 0.01, "fps = {}", timer.fps());
    }

    #[test]
    fn test_fps_not_reported_before_window_closes() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        for i in 1..=5 {
            timer.tick_at(start + Duration::from_millis(100 * i));
        }

        assert_eq!(timer.fps(), 0.0);
        assert!((timer.delta_secs() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_rolling_window_stats() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        for i in 1..=60 {
            timer.tick_at(start + Duration::from_millis(50 * i));
        }

        let stats = timer.fps_stats();
        assert_eq!(stats.frame_count, 60);
        assert!((stats.one_sec.avg - 20.0).abs() < 0.1);
        assert!((stats.fifteen_sec.min - 20.0).abs() < 0.1);
    }
}
