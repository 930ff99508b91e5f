//! Node level-of-detail policy

/// Zoom at which shared nodes start to appear
pub const PRIORITY_NODE_MIN_ZOOM: f64 = 18.0;

/// Zoom at which every node appears and shared nodes switch to squares
pub const ALL_NODES_MIN_ZOOM: f64 = 20.0;

/// Zoom at which ordinary nodes switch to outlined circles
pub const DETAIL_MIN_ZOOM: f64 = 22.0;

/// Marker scale never grows past this
pub const MAX_MARKER_SCALE: f64 = 1.5;

/// How a node is drawn at a given zoom
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeMarker {
    Hidden,
    /// Filled dot
    Dot,
    /// Stroked square
    Square,
    /// Stroked circle
    Circle,
}

/// Marker for a node given the zoom and the number of ways sharing it
///
/// | zoom     | shared (ref ≥ 2) | other  |
/// |----------|------------------|--------|
/// | < 18     | hidden           | hidden |
/// | 18 to 20 | dot              | hidden |
/// | 20 to 22 | square           | dot    |
/// | ≥ 22     | square           | circle |
pub fn node_marker(zoom: f64, ref_count: u16) -> NodeMarker {
    let priority = ref_count >= 2;
    if zoom < PRIORITY_NODE_MIN_ZOOM {
        NodeMarker::Hidden
    } else if zoom < ALL_NODES_MIN_ZOOM {
        if priority { NodeMarker::Dot } else { NodeMarker::Hidden }
    } else if zoom < DETAIL_MIN_ZOOM {
        if priority { NodeMarker::Square } else { NodeMarker::Dot }
    } else if priority {
        NodeMarker::Square
    } else {
        NodeMarker::Circle
    }
}

/// Marker size multiplier at `zoom`
pub fn marker_scale(zoom: f64) -> f64 {
    (zoom / ALL_NODES_MIN_ZOOM).min(MAX_MARKER_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_boundaries() {
        assert_eq!(node_marker(17.9, 2), NodeMarker::Hidden);
        assert_eq!(node_marker(18.0, 2), NodeMarker::Dot);
        assert_eq!(node_marker(19.99, 2), NodeMarker::Dot);
        assert_eq!(node_marker(20.0, 2), NodeMarker::Square);
        assert_eq!(node_marker(25.0, 9), NodeMarker::Square);
    }

    #[test]
    fn test_normal_boundaries() {
        assert_eq!(node_marker(19.5, 1), NodeMarker::Hidden);
        assert_eq!(node_marker(20.0, 1), NodeMarker::Dot);
        assert_eq!(node_marker(21.9, 0), NodeMarker::Dot);
        assert_eq!(node_marker(22.0, 0), NodeMarker::Circle);
    }

    #[test]
    fn test_marker_scale() {
        assert_eq!(marker_scale(20.0), 1.0);
        assert_eq!(marker_scale(18.0), 0.9);
        assert_eq!(marker_scale(26.0), 1.5);
    }
}
