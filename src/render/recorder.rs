//! Canvas that records draw calls instead of rasterizing

use crate::core::types::DVec2;
use crate::style::Color;

use super::canvas::{Canvas, FillRule, Path, Stroke};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Save,
    Restore,
    Translate(DVec2),
    FillRect { origin: DVec2, size: DVec2, color: Color },
    FillPath { path: Path, color: Color, rule: FillRule },
    StrokePath { path: Path, stroke: Stroke },
    Clip { path: Path, rule: FillRule },
}

/// Draw-call log used by tests and benchmarks
#[derive(Clone, Debug)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
    depth: usize,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, calls: Vec::new(), depth: 0 }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Unbalanced `save` calls so far
    pub fn save_depth(&self) -> usize {
        self.depth
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&Path, &Stroke)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            DrawCall::StrokePath { path, stroke } => Some((path, stroke)),
            _ => None,
        })
    }

    pub fn fills(&self) -> impl Iterator<Item = (&Path, Color)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            DrawCall::FillPath { path, color, .. } => Some((path, *color)),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn save(&mut self) {
        self.depth += 1;
        self.calls.push(DrawCall::Save);
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.calls.push(DrawCall::Restore);
    }

    fn translate(&mut self, offset: DVec2) {
        self.calls.push(DrawCall::Translate(offset));
    }

    fn fill_rect(&mut self, origin: DVec2, size: DVec2, color: Color) {
        self.calls.push(DrawCall::FillRect { origin, size, color });
    }

    fn fill_path(&mut self, path: &Path, color: Color, rule: FillRule) {
        self.calls.push(DrawCall::FillPath { path: path.clone(), color, rule });
    }

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke) {
        self.calls.push(DrawCall::StrokePath { path: path.clone(), stroke: *stroke });
    }

    fn clip(&mut self, path: &Path, rule: FillRule) {
        self.calls.push(DrawCall::Clip { path: path.clone(), rule });
    }
}
