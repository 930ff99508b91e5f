//! Currently selected feature

use serde::{Deserialize, Serialize};

use crate::core::types::FeatureId;
use crate::provider::PickResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Node,
    Way,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedFeature {
    pub kind: FeatureKind,
    pub id: FeatureId,
}

impl SelectedFeature {
    pub fn node(id: FeatureId) -> Self {
        Self { kind: FeatureKind::Node, id }
    }

    pub fn way(id: FeatureId) -> Self {
        Self { kind: FeatureKind::Way, id }
    }
}

/// At most one selected feature
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<SelectedFeature>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SelectedFeature> {
        self.current
    }

    /// Returns `true` if the selection changed
    pub fn set(&mut self, feature: SelectedFeature) -> bool {
        self.replace(Some(feature))
    }

    /// Returns `true` if something was selected
    pub fn clear(&mut self) -> bool {
        self.replace(None)
    }

    /// Apply a pick result; `None` clears the selection
    pub fn apply(&mut self, result: PickResult) -> bool {
        match result {
            PickResult::Node { id } => self.set(SelectedFeature::node(id)),
            PickResult::Way { id } => self.set(SelectedFeature::way(id)),
            PickResult::None => self.clear(),
        }
    }

    pub fn selected_way(&self) -> Option<FeatureId> {
        self.current.filter(|f| f.kind == FeatureKind::Way).map(|f| f.id)
    }

    pub fn selected_node(&self) -> Option<FeatureId> {
        self.current.filter(|f| f.kind == FeatureKind::Node).map(|f| f.id)
    }

    fn replace(&mut self, next: Option<SelectedFeature>) -> bool {
        let changed = self.current != next;
        self.current = next;
        changed
    }
}
