//! Viewport buffer decoder
//!
//! Validates the whole buffer once up front; the way and polygon sections
//! are then kept as raw little-endian bytes and read through borrowed views,
//! so a decoded viewport costs one copy of the geometry and no per-record
//! allocation.

use crate::core::types::{DVec2, FeatureId};
use crate::style::RenderFeature;

use super::{
    COUNT_SIZE, DecodeError, HEADER_SIZE, NODE_RECORD_SIZE, NodeRecord, POINT_SIZE,
    POLYGON_RECORD_HEADER_SIZE, RING_HEADER_SIZE, ResponseHeader, Section, WAY_RECORD_HEADER_SIZE,
    WireHeader, WireNode, join_id,
};

/// Result of decoding one viewport response
#[derive(Clone, Debug, Default)]
pub struct DecodedViewport {
    pub header: ResponseHeader,
    pub nodes: Vec<NodeRecord>,
    pub ways: WayBuffer,
    pub polygons: PolygonBuffer,
}

impl DecodedViewport {
    /// Render feature currently displayed for `id`, as a line or as an area
    pub fn feature_of(&self, id: FeatureId) -> Option<RenderFeature> {
        self.ways
            .find(id)
            .map(|way| way.feature)
            .or_else(|| self.polygons.find(id).map(|polygon| polygon.feature))
    }

    pub fn node(&self, id: FeatureId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Decode a complete viewport response
///
/// Fails instead of truncating when a declared count would read past the end
/// of the buffer; the caller keeps whatever it had before.
pub fn decode(bytes: &[u8]) -> Result<DecodedViewport, DecodeError> {
    let mut reader = Reader::new(bytes);

    let header = read_header(&mut reader)?;
    let nodes = read_nodes(&mut reader, header.node_count)?;
    let ways = read_ways(&mut reader, header.way_count)?;
    let polygons = read_polygons(&mut reader, header.polygon_count)?;

    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes {
            offset: reader.offset,
            len: reader.remaining(),
        });
    }

    Ok(DecodedViewport { header, nodes, ways, polygons })
}

fn read_header(reader: &mut Reader<'_>) -> Result<ResponseHeader, DecodeError> {
    let raw: WireHeader = bytemuck::pod_read_unaligned(reader.take(Section::Header, HEADER_SIZE)?);
    let truncated = match u32::from_le(raw.truncated) {
        0 => false,
        1 => true,
        other => return Err(DecodeError::InvalidTruncatedFlag(other)),
    };

    Ok(ResponseHeader {
        node_count: u32::from_le(raw.node_count),
        way_count: u32::from_le(raw.way_count),
        polygon_count: u32::from_le(raw.polygon_count),
        truncated,
    })
}

fn read_nodes(reader: &mut Reader<'_>, count: u32) -> Result<Vec<NodeRecord>, DecodeError> {
    let len = (count as usize).saturating_mul(NODE_RECORD_SIZE);
    let section = reader.take(Section::Nodes, len)?;

    Ok(section
        .chunks_exact(NODE_RECORD_SIZE)
        .map(|chunk| bytemuck::pod_read_unaligned::<WireNode>(chunk).to_record())
        .collect())
}

fn read_ways(reader: &mut Reader<'_>, header_count: u32) -> Result<WayBuffer, DecodeError> {
    let start = reader.offset;
    let section_count = reader.read_u32(Section::Ways)?;
    if section_count != header_count {
        return Err(DecodeError::CountMismatch {
            section: Section::Ways,
            header: header_count,
            section_count,
        });
    }

    // Offsets are relative to the start of the section
    let mut records = Vec::with_capacity(capacity_for(reader, section_count, WAY_RECORD_HEADER_SIZE));
    for _ in 0..section_count {
        records.push(reader.offset - start);
        reader.take(Section::Ways, 8 + 2)?;
        let point_count = reader.read_u32(Section::Ways)?;
        reader.take(Section::Ways, points_len(point_count))?;
    }

    Ok(WayBuffer {
        bytes: reader.bytes[start..reader.offset].to_vec(),
        records,
    })
}

fn read_polygons(reader: &mut Reader<'_>, header_count: u32) -> Result<PolygonBuffer, DecodeError> {
    // The section is omitted entirely when there are no polygons
    if reader.remaining() == 0 {
        if header_count > 0 {
            return Err(DecodeError::Truncated {
                section: Section::Polygons,
                offset: reader.offset,
                needed: COUNT_SIZE,
                available: 0,
            });
        }
        return Ok(PolygonBuffer::default());
    }

    let start = reader.offset;
    let section_count = reader.read_u32(Section::Polygons)?;
    if section_count != header_count {
        return Err(DecodeError::CountMismatch {
            section: Section::Polygons,
            header: header_count,
            section_count,
        });
    }

    let mut records =
        Vec::with_capacity(capacity_for(reader, section_count, POLYGON_RECORD_HEADER_SIZE));
    for _ in 0..section_count {
        records.push(reader.offset - start);
        reader.take(Section::Polygons, 8 + 2)?;
        let ring_count = reader.read_u16(Section::Polygons)?;
        for _ in 0..ring_count {
            let point_count = reader.read_u32(Section::Polygons)?;
            reader.take(Section::Polygons, points_len(point_count))?;
        }
    }

    Ok(PolygonBuffer {
        bytes: reader.bytes[start..reader.offset].to_vec(),
        records,
    })
}

/// Declared record count, capped by how many record headers the rest of the buffer can hold
fn capacity_for(reader: &Reader<'_>, declared: u32, record_size: usize) -> usize {
    (declared as usize).min(reader.remaining() / record_size)
}

fn points_len(count: u32) -> usize {
    (count as usize).saturating_mul(POINT_SIZE)
}

/// Bounds-checked cursor over the input buffer
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, section: Section, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                section,
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u16(&mut self, section: Section) -> Result<u16, DecodeError> {
        let b = self.take(section, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, section: Section) -> Result<u32, DecodeError> {
        let b = self.take(section, 4)?;
        Ok(le_u32(b, 0))
    }
}

// Infallible reads for views over already-validated sections

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_id(bytes: &[u8], at: usize) -> FeatureId {
    join_id(le_u32(bytes, at), le_u32(bytes, at + 4))
}

fn le_f64(bytes: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    f64::from_le_bytes(raw)
}

/// Packed (x, y) sequence borrowed from a decoded section
#[derive(Clone, Copy, Debug)]
pub struct Points<'a> {
    bytes: &'a [u8],
}

impl<'a> Points<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len() / POINT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<DVec2> {
        (index < self.len()).then(|| {
            let at = index * POINT_SIZE;
            DVec2::new(le_f64(self.bytes, at), le_f64(self.bytes, at + 8))
        })
    }

    /// Points in polyline order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = DVec2> + 'a {
        self.bytes
            .chunks_exact(POINT_SIZE)
            .map(|p| DVec2::new(le_f64(p, 0), le_f64(p, 8)))
    }
}

/// Way section exactly as received, leading count included
#[derive(Clone, Debug, Default)]
pub struct WayBuffer {
    bytes: Vec<u8>,
    records: Vec<usize>,
}

/// One way record read out of a [`WayBuffer`]
#[derive(Clone, Copy, Debug)]
pub struct WayView<'a> {
    pub id: FeatureId,
    pub feature: RenderFeature,
    pub points: Points<'a>,
}

impl WayBuffer {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the section in bytes
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn get(&self, index: usize) -> Option<WayView<'_>> {
        self.records.get(index).map(|&at| self.view_at(at))
    }

    pub fn iter(&self) -> impl Iterator<Item = WayView<'_>> + '_ {
        self.records.iter().map(|&at| self.view_at(at))
    }

    pub fn find(&self, id: FeatureId) -> Option<WayView<'_>> {
        self.iter().find(|way| way.id == id)
    }

    fn view_at(&self, at: usize) -> WayView<'_> {
        let point_count = le_u32(&self.bytes, at + 10) as usize;
        let points_start = at + WAY_RECORD_HEADER_SIZE;
        WayView {
            id: le_id(&self.bytes, at),
            feature: RenderFeature(le_u16(&self.bytes, at + 8)),
            points: Points {
                bytes: &self.bytes[points_start..points_start + point_count * POINT_SIZE],
            },
        }
    }
}

/// Polygon section exactly as received; empty when the provider omitted it
#[derive(Clone, Debug, Default)]
pub struct PolygonBuffer {
    bytes: Vec<u8>,
    records: Vec<usize>,
}

/// One polygon record read out of a [`PolygonBuffer`]
#[derive(Clone, Copy, Debug)]
pub struct PolygonView<'a> {
    pub id: FeatureId,
    pub feature: RenderFeature,
    ring_count: u16,
    rings: &'a [u8],
}

impl<'a> PolygonView<'a> {
    pub fn ring_count(&self) -> usize {
        self.ring_count as usize
    }

    /// Outer ring first, then holes
    pub fn rings(&self) -> Rings<'a> {
        Rings {
            bytes: self.rings,
            remaining: self.ring_count,
        }
    }
}

/// Iterator over the rings of one polygon
#[derive(Clone, Debug)]
pub struct Rings<'a> {
    bytes: &'a [u8],
    remaining: u16,
}

impl<'a> Iterator for Rings<'a> {
    type Item = Points<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let point_count = le_u32(self.bytes, 0) as usize;
        let end = RING_HEADER_SIZE + point_count * POINT_SIZE;
        let points = Points { bytes: &self.bytes[RING_HEADER_SIZE..end] };
        self.bytes = &self.bytes[end..];
        Some(points)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl PolygonBuffer {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = PolygonView<'_>> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(index, &at)| self.view_at(index, at))
    }

    pub fn find(&self, id: FeatureId) -> Option<PolygonView<'_>> {
        self.iter().find(|polygon| polygon.id == id)
    }

    fn view_at(&self, index: usize, at: usize) -> PolygonView<'_> {
        let end = self.records.get(index + 1).copied().unwrap_or(self.bytes.len());
        PolygonView {
            id: le_id(&self.bytes, at),
            feature: RenderFeature(le_u16(&self.bytes, at + 8)),
            ring_count: le_u16(&self.bytes, at + 10),
            rings: &self.bytes[at + POLYGON_RECORD_HEADER_SIZE..end],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ViewportEncoder;

    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_f64(buf: &mut Vec<u8>, v: f64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_node(buf: &mut Vec<u8>, id: u64, x: f64, y: f64, ref_count: u16) {
        push_u32(buf, id as u32);
        push_u32(buf, (id >> 32) as u32);
        push_f64(buf, x);
        push_f64(buf, y);
        push_u16(buf, ref_count);
        buf.extend_from_slice(&[0u8; 6]);
    }

    fn header(nodes: u32, ways: u32, polygons: u32, truncated: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, nodes);
        push_u32(&mut buf, ways);
        push_u32(&mut buf, polygons);
        push_u32(&mut buf, truncated);
        buf
    }

    /// Two nodes and one two-point way, laid out by hand
    fn reference_buffer() -> Vec<u8> {
        let mut buf = header(2, 1, 0, 0);
        push_node(&mut buf, 1000, 100.0, 200.0, 3);
        push_node(&mut buf, 2000, -50.5, 75.25, 0);
        push_u32(&mut buf, 1);
        buf.extend_from_slice(&5000i64.to_le_bytes());
        push_u16(&mut buf, 1);
        push_u32(&mut buf, 2);
        for v in [0.0, 0.0, 10.0, 10.0] {
            push_f64(&mut buf, v);
        }
        buf
    }

    #[test]
    fn test_decode_reference_buffer() {
        let decoded = decode(&reference_buffer()).unwrap();

        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.nodes[0].id, 1000);
        assert_eq!(decoded.nodes[0].ref_count, 3);
        assert_eq!(decoded.nodes[0].position, DVec2::new(100.0, 200.0));
        assert_eq!(decoded.nodes[1].position, DVec2::new(-50.5, 75.25));
        assert_eq!(decoded.nodes[1].ref_count, 0);

        assert_eq!(decoded.ways.byte_len(), 4 + 8 + 2 + 4 + 2 * 16);
        let way = decoded.ways.get(0).unwrap();
        assert_eq!(way.id, 5000);
        assert_eq!(way.feature, RenderFeature(1));
        let points: Vec<_> = way.points.iter().collect();
        assert_eq!(points, vec![DVec2::ZERO, DVec2::new(10.0, 10.0)]);

        assert!(decoded.polygons.is_empty());
        assert_eq!(decoded.polygons.byte_len(), 0);
        assert!(!decoded.header.truncated);
    }

    #[test]
    fn test_id_high_word() {
        let mut buf = header(1, 0, 0, 0);
        push_node(&mut buf, 4_294_967_296, 0.0, 0.0, 1);
        push_u32(&mut buf, 0);

        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.nodes[0].id, 4_294_967_296);
    }

    #[test]
    fn test_id_low_word_top_bit() {
        let id = 0x0000_0001_8000_0001;
        let mut buf = header(1, 0, 0, 0);
        push_node(&mut buf, id, 0.0, 0.0, 1);
        push_u32(&mut buf, 0);

        assert_eq!(decode(&buf).unwrap().nodes[0].id, id);
    }

    #[test]
    fn test_truncated_flag() {
        let mut buf = header(0, 0, 0, 1);
        push_u32(&mut buf, 0);
        assert!(decode(&buf).unwrap().header.truncated);

        let mut buf = header(0, 0, 0, 2);
        push_u32(&mut buf, 0);
        assert_eq!(decode(&buf).unwrap_err(), DecodeError::InvalidTruncatedFlag(2));
    }

    #[test]
    fn test_empty_buffer_fails() {
        assert!(matches!(
            decode(&[]),
            Err(DecodeError::Truncated { section: Section::Header, needed: 16, available: 0, .. })
        ));
    }

    #[test]
    fn test_node_count_past_end_fails() {
        let mut buf = header(3, 0, 0, 0);
        push_node(&mut buf, 1, 0.0, 0.0, 0);
        push_node(&mut buf, 2, 0.0, 0.0, 0);
        push_u32(&mut buf, 0);

        let err = decode(&buf).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated { section: Section::Nodes, offset: 16, needed: 96, available: 68 }
        );
    }

    #[test]
    fn test_point_count_past_end_fails() {
        let mut buf = reference_buffer();
        // Drop the last coordinate
        buf.truncate(buf.len() - 8);

        assert!(matches!(
            decode(&buf),
            Err(DecodeError::Truncated { section: Section::Ways, needed: 32, available: 24, .. })
        ));
    }

    #[test]
    fn test_missing_way_count_fails() {
        let buf = header(0, 0, 0, 0);
        assert!(matches!(
            decode(&buf),
            Err(DecodeError::Truncated { section: Section::Ways, .. })
        ));
    }

    #[test]
    fn test_way_count_mismatch() {
        let mut buf = header(0, 2, 0, 0);
        push_u32(&mut buf, 1);
        assert_eq!(
            decode(&buf).unwrap_err(),
            DecodeError::CountMismatch { section: Section::Ways, header: 2, section_count: 1 }
        );
    }

    #[test]
    fn test_huge_way_count_fails_without_allocating() {
        let mut buf = header(0, u32::MAX, 0, 0);
        push_u32(&mut buf, u32::MAX);
        assert_eq!(
            decode(&buf).unwrap_err(),
            DecodeError::Truncated { section: Section::Ways, offset: 20, needed: 10, available: 0 }
        );
    }

    #[test]
    fn test_huge_polygon_count_fails_without_allocating() {
        let mut buf = header(0, 0, u32::MAX, 0);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, u32::MAX);
        assert_eq!(
            decode(&buf).unwrap_err(),
            DecodeError::Truncated {
                section: Section::Polygons,
                offset: 24,
                needed: 10,
                available: 0,
            }
        );
    }

    #[test]
    fn test_missing_polygon_section_fails() {
        let mut buf = header(0, 0, 1, 0);
        push_u32(&mut buf, 0);
        assert!(matches!(
            decode(&buf),
            Err(DecodeError::Truncated { section: Section::Polygons, needed: 4, available: 0, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = reference_buffer();
        // An empty polygon section followed by garbage
        push_u32(&mut buf, 0);
        let expected_offset = buf.len();
        push_u16(&mut buf, 7);

        assert_eq!(
            decode(&buf).unwrap_err(),
            DecodeError::TrailingBytes { offset: expected_offset, len: 2 }
        );
    }

    #[test]
    fn test_polygon_rings() {
        let outer = [
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            DVec2::new(100.0, 100.0),
            DVec2::new(0.0, 100.0),
            DVec2::new(0.0, 0.0),
        ];
        let hole = [
            DVec2::new(40.0, 40.0),
            DVec2::new(60.0, 40.0),
            DVec2::new(60.0, 60.0),
            DVec2::new(40.0, 40.0),
        ];

        let mut encoder = ViewportEncoder::new();
        encoder.push_polygon(77, RenderFeature(40), &[&outer[..], &hole[..]]);
        encoder.push_polygon(78, RenderFeature(51), &[&outer[..]]);
        let decoded = decode(&encoder.finish()).unwrap();

        assert_eq!(decoded.header.polygon_count, 2);
        let polygons: Vec<_> = decoded.polygons.iter().collect();
        assert_eq!(polygons.len(), 2);

        assert_eq!(polygons[0].id, 77);
        assert_eq!(polygons[0].ring_count(), 2);
        let rings: Vec<Vec<DVec2>> = polygons[0].rings().map(|r| r.iter().collect()).collect();
        assert_eq!(rings[0], outer.to_vec());
        assert_eq!(rings[1], hole.to_vec());

        assert_eq!(polygons[1].feature, RenderFeature(51));
        assert_eq!(polygons[1].rings().count(), 1);
    }

    #[test]
    fn test_feature_lookup_covers_areas() {
        let line = [DVec2::ZERO, DVec2::new(5.0, 5.0)];
        let mut encoder = ViewportEncoder::new();
        encoder.push_way(10, RenderFeature(3), &line);
        encoder.push_polygon(11, RenderFeature(40), &[&line[..]]);
        let decoded = decode(&encoder.finish()).unwrap();

        assert_eq!(decoded.feature_of(10), Some(RenderFeature(3)));
        assert_eq!(decoded.feature_of(11), Some(RenderFeature(40)));
        assert_eq!(decoded.feature_of(12), None);
    }
}
