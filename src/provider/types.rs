//! Query and response shapes exchanged with the data provider

use serde::{Deserialize, Serialize};

use crate::core::types::FeatureId;

/// Nearest-feature lookup around a clicked point
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickQuery {
    pub merc_x: f64,
    pub merc_y: f64,
    pub tolerance_meters: f64,
    pub zoom: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PickResult {
    Node { id: FeatureId },
    Way { id: FeatureId },
    None,
}

/// Outcome of a tag edit on a way
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTagsResult {
    pub success: bool,
    /// Feature code derived from the new tags
    pub render_feature: u16,
    pub layer: i8,
    pub is_area: bool,
}

/// Outcome of an undo or redo
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRedoResult {
    pub success: bool,
    pub needs_redraw: bool,
    pub message: Option<String>,
    pub undo_count: usize,
    pub redo_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_result_wire_shape() {
        let json = serde_json::to_string(&PickResult::Way { id: 12 }).unwrap();
        assert_eq!(json, r#"{"type":"Way","id":12}"#);

        let none: PickResult = serde_json::from_str(r#"{"type":"None"}"#).unwrap();
        assert_eq!(none, PickResult::None);

        let node: PickResult = serde_json::from_str(r#"{"type":"Node","id":4294967296}"#).unwrap();
        assert_eq!(node, PickResult::Node { id: 4_294_967_296 });
    }

    #[test]
    fn test_edit_results_parse() {
        let tags: UpdateTagsResult =
            serde_json::from_str(r#"{"success":true,"render_feature":259,"layer":1,"is_area":false}"#).unwrap();
        assert_eq!(tags.render_feature, 0x0103);
        assert_eq!(tags.layer, 1);

        let undo: UndoRedoResult = serde_json::from_str(
            r#"{"success":true,"needs_redraw":true,"message":null,"undo_count":2,"redo_count":1}"#,
        )
        .unwrap();
        assert!(undo.needs_redraw);
        assert_eq!(undo.message, None);
    }
}
