//! Provider-side writer for the viewport wire format

use crate::core::types::{DVec2, FeatureId};
use crate::style::RenderFeature;

use super::{NodeRecord, WireHeader, WireNode, COUNT_SIZE, HEADER_SIZE, NODE_RECORD_SIZE};

/// Accumulates records and produces one response buffer
#[derive(Debug, Default)]
pub struct ViewportEncoder {
    nodes: Vec<u8>,
    ways: Vec<u8>,
    polygons: Vec<u8>,
    node_count: u32,
    way_count: u32,
    polygon_count: u32,
    truncated: bool,
}

impl ViewportEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the response as capped by the provider
    pub fn set_truncated(&mut self, truncated: bool) {
        self.truncated = truncated;
    }

    pub fn push_node(&mut self, node: &NodeRecord) {
        self.nodes.extend_from_slice(bytemuck::bytes_of(&WireNode::from_record(node)));
        self.node_count += 1;
    }

    pub fn push_way(&mut self, id: FeatureId, feature: RenderFeature, points: &[DVec2]) {
        self.ways.extend_from_slice(&id.to_le_bytes());
        self.ways.extend_from_slice(&feature.0.to_le_bytes());
        write_points(&mut self.ways, points);
        self.way_count += 1;
    }

    /// Ring 0 is the outer boundary, the rest are holes
    pub fn push_polygon<R: AsRef<[DVec2]>>(&mut self, id: FeatureId, feature: RenderFeature, rings: &[R]) {
        let rings = if rings.len() > u16::MAX as usize {
            log::warn!("Polygon {} has {} rings, keeping the first {}", id, rings.len(), u16::MAX);
            &rings[..u16::MAX as usize]
        } else {
            rings
        };

        self.polygons.extend_from_slice(&id.to_le_bytes());
        self.polygons.extend_from_slice(&feature.0.to_le_bytes());
        self.polygons.extend_from_slice(&(rings.len() as u16).to_le_bytes());
        for ring in rings {
            write_points(&mut self.polygons, ring.as_ref());
        }
        self.polygon_count += 1;
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn way_count(&self) -> u32 {
        self.way_count
    }

    pub fn polygon_count(&self) -> u32 {
        self.polygon_count
    }

    /// Assemble the buffer; the polygon section is only written when non-empty
    pub fn finish(self) -> Vec<u8> {
        let header = WireHeader {
            node_count: self.node_count.to_le(),
            way_count: self.way_count.to_le(),
            polygon_count: self.polygon_count.to_le(),
            truncated: (self.truncated as u32).to_le(),
        };

        let polygon_len = if self.polygon_count > 0 { COUNT_SIZE + self.polygons.len() } else { 0 };
        let mut out = Vec::with_capacity(
            HEADER_SIZE + self.nodes.len() + COUNT_SIZE + self.ways.len() + polygon_len,
        );
        debug_assert_eq!(self.nodes.len(), self.node_count as usize * NODE_RECORD_SIZE);

        out.extend_from_slice(bytemuck::bytes_of(&header));
        out.extend_from_slice(&self.nodes);
        out.extend_from_slice(&self.way_count.to_le_bytes());
        out.extend_from_slice(&self.ways);
        if self.polygon_count > 0 {
            out.extend_from_slice(&self.polygon_count.to_le_bytes());
            out.extend_from_slice(&self.polygons);
        }
        out
    }
}

fn write_points(buf: &mut Vec<u8>, points: &[DVec2]) {
    let count = u32::try_from(points.len()).unwrap_or(u32::MAX);
    buf.extend_from_slice(&count.to_le_bytes());
    for point in &points[..count as usize] {
        buf.extend_from_slice(&point.x.to_le_bytes());
        buf.extend_from_slice(&point.y.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{decode, HEADER_SIZE};

    #[test]
    fn test_empty_response() {
        let bytes = ViewportEncoder::new().finish();
        // Header plus the mandatory way count
        assert_eq!(bytes.len(), HEADER_SIZE + 4);

        let decoded = decode(&bytes).unwrap();
        assert!(decoded.nodes.is_empty());
        assert!(decoded.ways.is_empty());
        assert!(decoded.polygons.is_empty());
    }

    #[test]
    fn test_polygon_section_omitted_when_empty() {
        let mut encoder = ViewportEncoder::new();
        encoder.push_way(1, RenderFeature(2), &[DVec2::ZERO, DVec2::ONE]);
        let bytes = encoder.finish();

        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 8 + 2 + 4 + 32);
    }

    #[test]
    fn test_truncated_and_nodes_survive() {
        let mut encoder = ViewportEncoder::new();
        encoder.push_node(&NodeRecord { id: 1 << 40, position: DVec2::new(1.5, -2.5), ref_count: 4 });
        encoder.set_truncated(true);
        assert_eq!(encoder.node_count(), 1);

        let decoded = decode(&encoder.finish()).unwrap();
        assert!(decoded.header.truncated);
        assert_eq!(decoded.nodes[0].id, 1 << 40);
        assert_eq!(decoded.nodes[0].position, DVec2::new(1.5, -2.5));
        assert!(decoded.nodes[0].is_priority());
    }
}
