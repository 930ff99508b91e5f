//! Frame scheduling: dirty tracking, fps and render timing

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::time::{FpsStats, FrameTimer};

/// Frame statistics reported to the host
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub fps: FpsStats,
    /// Duration of the last render call
    pub render_time_ms: f32,
    pub rendered_frames: u64,
    pub over_budget_frames: u64,
}

/// Runs on every host frame callback and renders only when something changed
pub struct FrameScheduler {
    timer: FrameTimer,
    dirty: bool,
    budget: Duration,
    render_time: Duration,
    rendered_frames: u64,
    over_budget_frames: u64,
}

impl FrameScheduler {
    /// Starts dirty so that the first frame is always drawn
    pub fn new(budget: Duration, now: Instant) -> Self {
        Self {
            timer: FrameTimer::starting_at(now),
            dirty: true,
            budget,
            render_time: Duration::ZERO,
            rendered_frames: 0,
            over_budget_frames: 0,
        }
    }

    /// Mark the view as needing a redraw
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Handle one host frame
    ///
    /// Always updates fps bookkeeping; calls `render` only if dirty and
    /// returns its result.
    pub fn tick<R>(&mut self, now: Instant, render: impl FnOnce() -> R) -> Option<R> {
        self.timer.tick_at(now);
        if !self.dirty {
            return None;
        }

        let start = Instant::now();
        let result = render();
        self.finish_render(start.elapsed());
        Some(result)
    }

    /// Record a render that was timed elsewhere
    pub fn finish_render(&mut self, elapsed: Duration) {
        self.dirty = false;
        self.render_time = elapsed;
        self.rendered_frames += 1;

        if elapsed > self.budget {
            self.over_budget_frames += 1;
            log::debug!(
                "Frame {} took {:.2}ms (budget {:.2}ms)",
                self.rendered_frames,
                elapsed.as_secs_f32() * 1000.0,
                self.budget.as_secs_f32() * 1000.0
            );
        }
    }

    pub fn fps(&self) -> f32 {
        self.timer.fps()
    }

    pub fn render_time(&self) -> Duration {
        self.render_time
    }

    /// Host frames seen, rendered or not
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            fps: self.timer.fps_stats(),
            render_time_ms: self.render_time.as_secs_f32() * 1000.0,
            rendered_frames: self.rendered_frames,
            over_budget_frames: self.over_budget_frames,
        }
    }
}
