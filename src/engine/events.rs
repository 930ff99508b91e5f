//! Notifications the engine hands back to its host

use serde::{Deserialize, Serialize};

use crate::core::camera::CameraChanged;
use crate::picking::SelectedFeature;
use crate::provider::PickQuery;

/// Drained with [`super::MapEngine::drain_events`] after each frame
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Emitted after every camera mutation
    CameraChanged(CameraChanged),
    /// A click was turned into a pick query
    FeatureClicked(PickQuery),
    SelectionChanged(Option<SelectedFeature>),
    /// New viewport data replaced the previous buffers
    DataLoaded(DataSummary),
    FetchFailed(String),
    PickFailed(String),
}

/// Counts from a viewport response
///
/// `truncated` means the provider hit a result cap; hosts should tell the
/// user, but it is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSummary {
    pub nodes: usize,
    pub ways: usize,
    pub polygons: usize,
    pub truncated: bool,
    pub bytes: usize,
}
