//! Click picking and selection state

pub mod selection;
pub mod picker;

pub use picker::{pick_query, PickResponse, Picker, PICK_PIXEL_TOLERANCE};
pub use selection::{FeatureKind, SelectedFeature, Selection};
