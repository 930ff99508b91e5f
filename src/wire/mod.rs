//! Viewport wire format
//!
//! Binary layout produced by the data provider, all integers little-endian,
//! floats IEEE-754 f64, coordinates already in Mercator meters:
//!
//! ```text
//! [header: 16 bytes]      node_count:u32 way_count:u32 polygon_count:u32 truncated:u32
//! [nodes: node_count × 32] id:i64 x:f64 y:f64 ref_count:u16 pad:6
//! [ways]                  way_count:u32 then per way
//!                           id:i64 render_feature:u16 point_count:u32 point_count × (x:f64 y:f64)
//! [polygons, optional]    polygon_count:u32 then per polygon
//!                           id:i64 render_feature:u16 ring_count:u16
//!                           ring_count × (point_count:u32 point_count × (x:f64 y:f64))
//! ```
//!
//! Ring 0 of a polygon is its outer boundary, later rings are holes.

pub mod decoder;
pub mod encoder;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::core::types::{DVec2, FeatureId};

pub use decoder::{decode, DecodedViewport, PolygonBuffer, PolygonView, Points, WayBuffer, WayView};
pub use encoder::ViewportEncoder;

/// Size of the response header
pub const HEADER_SIZE: usize = 16;

/// Size of one node record including padding
pub const NODE_RECORD_SIZE: usize = 32;

/// Size of one encoded (x, y) point
pub const POINT_SIZE: usize = 16;

/// Size of a section's leading record count
pub const COUNT_SIZE: usize = 4;

/// id + render_feature + point_count
pub const WAY_RECORD_HEADER_SIZE: usize = 8 + 2 + 4;

/// id + render_feature + ring_count
pub const POLYGON_RECORD_HEADER_SIZE: usize = 8 + 2 + 2;

/// Leading point count of a ring
pub const RING_HEADER_SIZE: usize = 4;

/// Buffer section, reported in decode errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Header,
    Nodes,
    Ways,
    Polygons,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Header => "header",
            Section::Nodes => "nodes",
            Section::Ways => "ways",
            Section::Polygons => "polygons",
        };
        f.write_str(name)
    }
}

/// Reasons a viewport buffer is rejected
///
/// The decoder never clamps or guesses: any of these means the caller keeps
/// its previous data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{section} section truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        section: Section,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{section} section declares {section_count} records but header declares {header}")]
    CountMismatch {
        section: Section,
        header: u32,
        section_count: u32,
    },

    #[error("truncated flag must be 0 or 1, got {0}")]
    InvalidTruncatedFlag(u32),

    #[error("{len} unexpected bytes after offset {offset}")]
    TrailingBytes { offset: usize, len: usize },
}

/// Fixed 16-byte response header as laid out on the wire
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WireHeader {
    pub node_count: u32,
    pub way_count: u32,
    pub polygon_count: u32,
    pub truncated: u32,
}

/// Fixed 32-byte node record as laid out on the wire
///
/// The id is carried as two 32-bit halves so that it round-trips through
/// readers without native 64-bit integers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WireNode {
    pub id_low: u32,
    pub id_high: u32,
    pub x: f64,
    pub y: f64,
    pub ref_count: u16,
    pub _pad: [u16; 3],
}

impl WireNode {
    pub fn from_record(record: &NodeRecord) -> Self {
        let (id_low, id_high) = split_id(record.id);
        Self {
            id_low: id_low.to_le(),
            id_high: id_high.to_le(),
            x: f64::from_bits(record.position.x.to_bits().to_le()),
            y: f64::from_bits(record.position.y.to_bits().to_le()),
            ref_count: record.ref_count.to_le(),
            _pad: [0; 3],
        }
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: join_id(u32::from_le(self.id_low), u32::from_le(self.id_high)),
            position: DVec2::new(
                f64::from_bits(u64::from_le(self.x.to_bits())),
                f64::from_bits(u64::from_le(self.y.to_bits())),
            ),
            ref_count: u16::from_le(self.ref_count),
        }
    }
}

/// Decoded response header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResponseHeader {
    pub node_count: u32,
    pub way_count: u32,
    pub polygon_count: u32,
    /// The provider hit a result cap; surface to the user, not an error
    pub truncated: bool,
}

/// A vertex as delivered by the provider
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRecord {
    pub id: FeatureId,
    /// Position in Mercator meters
    pub position: DVec2,
    /// Number of ways referencing this node
    pub ref_count: u16,
}

impl NodeRecord {
    /// Shared by two or more ways (junctions, shared vertices)
    pub fn is_priority(&self) -> bool {
        self.ref_count >= 2
    }
}

/// Rebuild a 64-bit id from its two unsigned 32-bit halves
#[inline]
pub fn join_id(low: u32, high: u32) -> FeatureId {
    ((high as u64) << 32) | low as u64
}

/// Split a 64-bit id into (low, high) 32-bit halves
#[inline]
pub fn split_id(id: FeatureId) -> (u32, u32) {
    (id as u32, (id >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<WireHeader>(), HEADER_SIZE);
        assert_eq!(std::mem::size_of::<WireNode>(), NODE_RECORD_SIZE);
    }

    #[test]
    fn test_id_halves() {
        assert_eq!(join_id(0, 1), 4_294_967_296);
        assert_eq!(split_id(4_294_967_296), (0, 1));
        // Top bit of the low word must not leak a sign into the result
        assert_eq!(join_id(0x8000_0000, 1), 0x1_8000_0000);
        let id = 9_007_199_254_740_991; // 2^53 - 1
        let (low, high) = split_id(id);
        assert_eq!(join_id(low, high), id);
    }

    #[test]
    fn test_priority() {
        let node = |ref_count| NodeRecord { id: 1, position: DVec2::ZERO, ref_count };
        assert!(!node(0).is_priority());
        assert!(!node(1).is_priority());
        assert!(node(2).is_priority());
        assert!(node(7).is_priority());
    }
}
