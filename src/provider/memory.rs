//! In-memory data provider
//!
//! Brute-force bbox filtering over plain vectors. Serves the headless viewer,
//! tests and benchmarks; a real editor backend would sit behind an R-tree.

use std::time::Duration;

use crate::core::camera::Viewport;
use crate::core::types::{DVec2, FeatureId};
use crate::math::geometry::{point_in_rings, point_polyline_distance};
use crate::math::{projection, Bounds};
use crate::style::RenderFeature;
use crate::style::feature::DEFAULT_LAYER;
use crate::wire::{DecodedViewport, NodeRecord, ViewportEncoder};

use super::{DataProvider, PickQuery, PickResult, ProviderError};

/// Result caps for one viewport query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderLimits {
    pub max_nodes: usize,
    pub max_ways: usize,
    /// Nodes below this reference count are not sent
    pub min_node_ref_count: u16,
}

/// Caps scale with zoom: the wider the view, the fewer records per query
pub fn render_limits(zoom: f64) -> RenderLimits {
    let max_ways = match zoom as u32 {
        0..=8 => 5_000,
        9..=11 => 15_000,
        12..=14 => 40_000,
        15..=17 => 80_000,
        _ => 150_000,
    };
    let (max_nodes, min_node_ref_count) = match zoom as u32 {
        0..=16 => (0, 0),
        17..=18 => (50_000, 2),
        19..=20 => (100_000, 0),
        _ => (200_000, 0),
    };
    RenderLimits { max_nodes, max_ways, min_node_ref_count }
}

#[derive(Clone, Debug)]
struct StoredWay {
    id: FeatureId,
    feature: RenderFeature,
    layer: i8,
    points: Vec<DVec2>,
    bounds: Bounds,
}

#[derive(Clone, Debug)]
struct StoredPolygon {
    id: FeatureId,
    feature: RenderFeature,
    layer: i8,
    rings: Vec<Vec<DVec2>>,
    bounds: Bounds,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    nodes: Vec<NodeRecord>,
    ways: Vec<StoredWay>,
    polygons: Vec<StoredPolygon>,
    latency: Option<Duration>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record of an already decoded buffer, all on the default layer
    pub fn from_decoded(data: &DecodedViewport) -> Self {
        let mut provider = Self::new();
        for node in &data.nodes {
            provider.add_node(*node);
        }
        for way in data.ways.iter() {
            provider.add_way(way.id, way.feature, DEFAULT_LAYER, way.points.iter().collect());
        }
        for polygon in data.polygons.iter() {
            let rings = polygon.rings().map(|ring| ring.iter().collect()).collect();
            provider.add_polygon(polygon.id, polygon.feature, DEFAULT_LAYER, rings);
        }
        provider
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn add_node(&mut self, node: NodeRecord) {
        self.nodes.push(node);
    }

    /// Ways with no points are ignored
    pub fn add_way(&mut self, id: FeatureId, feature: RenderFeature, layer: i8, points: Vec<DVec2>) {
        if let Some(bounds) = Bounds::from_points(points.iter().copied()) {
            self.ways.push(StoredWay { id, feature, layer, points, bounds });
        }
    }

    /// Ring 0 is the outer boundary; polygons with no points are ignored
    pub fn add_polygon(&mut self, id: FeatureId, feature: RenderFeature, layer: i8, rings: Vec<Vec<DVec2>>) {
        if let Some(bounds) = Bounds::from_points(rings.iter().flatten().copied()) {
            self.polygons.push(StoredPolygon { id, feature, layer, rings, bounds });
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Bounds of everything stored
    pub fn bounds(&self) -> Option<Bounds> {
        let corners = self
            .ways
            .iter()
            .map(|w| w.bounds)
            .chain(self.polygons.iter().map(|p| p.bounds))
            .flat_map(|b| [b.min, b.max]);
        Bounds::from_points(corners.chain(self.nodes.iter().map(|n| n.position)))
    }

    /// Encode every record intersecting `viewport`, capped by [`render_limits`]
    ///
    /// Ways and polygons are sorted by z-order, grouping equal feature codes
    /// within one z level.
    pub fn encode_viewport(&self, viewport: &Viewport) -> Vec<u8> {
        let area = Bounds::new(
            projection::forward(viewport.min_lon, viewport.min_lat),
            projection::forward(viewport.max_lon, viewport.max_lat),
        );
        let limits = render_limits(viewport.zoom);
        let mut truncated = false;

        let mut nodes: Vec<&NodeRecord> = self
            .nodes
            .iter()
            .filter(|_| limits.max_nodes > 0)
            .filter(|n| n.ref_count >= limits.min_node_ref_count && area.contains_point(n.position))
            .collect();
        // Junctions first so they survive the cap
        nodes.sort_by(|a, b| b.ref_count.cmp(&a.ref_count));
        if nodes.len() > limits.max_nodes {
            nodes.truncate(limits.max_nodes);
            truncated = true;
        }

        let mut ways: Vec<&StoredWay> = self.ways.iter().filter(|w| w.bounds.intersects(&area)).collect();
        if ways.len() > limits.max_ways {
            ways.truncate(limits.max_ways);
            truncated = true;
        }
        ways.sort_by_key(|w| (w.feature.z_order(w.layer), w.feature, w.id));

        let mut polygons: Vec<&StoredPolygon> =
            self.polygons.iter().filter(|p| p.bounds.intersects(&area)).collect();
        if polygons.len() > limits.max_ways {
            polygons.truncate(limits.max_ways);
            truncated = true;
        }
        polygons.sort_by_key(|p| (p.feature.z_order(p.layer), p.feature, p.id));

        let mut encoder = ViewportEncoder::new();
        for node in nodes {
            encoder.push_node(node);
        }
        for way in ways {
            encoder.push_way(way.id, way.feature, &way.points);
        }
        for polygon in polygons {
            encoder.push_polygon(polygon.id, polygon.feature, polygon.rings.as_slice());
        }
        encoder.set_truncated(truncated);

        log::debug!(
            "Viewport query z{:.1}: {} nodes, {} ways, {} polygons{}",
            viewport.zoom,
            encoder.node_count(),
            encoder.way_count(),
            encoder.polygon_count(),
            if truncated { " (truncated)" } else { "" }
        );
        encoder.finish()
    }

    /// Nodes win over ways, ways over areas; nearest within tolerance wins
    pub fn pick(&self, query: &PickQuery) -> PickResult {
        let p = DVec2::new(query.merc_x, query.merc_y);
        let tolerance = query.tolerance_meters;

        let nearest_node = self
            .nodes
            .iter()
            .map(|n| (n.id, n.position.distance(p)))
            .filter(|&(_, d)| d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((id, _)) = nearest_node {
            return PickResult::Node { id };
        }

        let nearest_way = self
            .ways
            .iter()
            .filter(|w| w.bounds.inflate(tolerance).contains_point(p))
            .map(|w| (w.id, point_polyline_distance(p, &w.points)))
            .filter(|&(_, d)| d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((id, _)) = nearest_way {
            return PickResult::Way { id };
        }

        // Smallest containing area is the most specific one
        let containing = self
            .polygons
            .iter()
            .filter(|poly| {
                poly.bounds.inflate(tolerance).contains_point(p)
                    && (point_in_rings(p, &poly.rings)
                        || poly.rings.iter().any(|r| point_polyline_distance(p, r) <= tolerance))
            })
            .min_by(|a, b| {
                let area = |b: &Bounds| b.size().x * b.size().y;
                area(&a.bounds).total_cmp(&area(&b.bounds))
            });
        match containing {
            Some(poly) => PickResult::Way { id: poly.id },
            None => PickResult::None,
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl DataProvider for MemoryProvider {
    async fn query_viewport(&self, viewport: Viewport) -> Result<Vec<u8>, ProviderError> {
        let finite = [viewport.min_lon, viewport.min_lat, viewport.max_lon, viewport.max_lat, viewport.zoom]
            .iter()
            .all(|v| v.is_finite());
        if !finite || viewport.min_lon > viewport.max_lon || viewport.min_lat > viewport.max_lat {
            return Err(ProviderError::Rejected(format!("invalid viewport {:?}", viewport)));
        }

        self.simulate_latency().await;
        Ok(self.encode_viewport(&viewport))
    }

    async fn pick_feature(&self, query: PickQuery) -> Result<PickResult, ProviderError> {
        if query.tolerance_meters.is_nan() || query.tolerance_meters < 0.0 {
            return Err(ProviderError::Rejected(format!("invalid tolerance {}", query.tolerance_meters)));
        }

        self.simulate_latency().await;
        Ok(self.pick(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::camera::Camera;
    use crate::style::{base_type, flags};
    use crate::wire::decode;

    fn feature(base: u8, f: u16) -> RenderFeature {
        RenderFeature::new(base, f)
    }

    fn provider() -> MemoryProvider {
        let mut p = MemoryProvider::new();
        p.add_way(1, feature(base_type::HIGHWAY_ROAD, flags::BRIDGE), 1, vec![DVec2::new(-50.0, 0.0), DVec2::new(50.0, 0.0)]);
        p.add_way(2, feature(base_type::WATERWAY_RIVER, 0), 0, vec![DVec2::new(0.0, -50.0), DVec2::new(0.0, 50.0)]);
        p.add_way(3, feature(base_type::HIGHWAY_ROAD, flags::TUNNEL), -1, vec![DVec2::new(-50.0, 20.0), DVec2::new(50.0, 20.0)]);
        p.add_way(4, feature(base_type::HIGHWAY_ROAD, 0), 0, vec![DVec2::new(1.0e6, 0.0), DVec2::new(1.0e6 + 10.0, 0.0)]);
        p.add_polygon(
            5,
            feature(base_type::BUILDING, 0),
            0,
            vec![vec![
                DVec2::new(20.0, 20.0),
                DVec2::new(40.0, 20.0),
                DVec2::new(40.0, 40.0),
                DVec2::new(20.0, 40.0),
                DVec2::new(20.0, 20.0),
            ]],
        );
        p.add_node(NodeRecord { id: 10, position: DVec2::new(0.0, 0.0), ref_count: 2 });
        p.add_node(NodeRecord { id: 11, position: DVec2::new(-50.0, 0.0), ref_count: 1 });
        p
    }

    fn viewport(zoom: f64) -> Viewport {
        Camera::new(0.0, 0.0, zoom, 800, 600).viewport()
    }

    #[test]
    fn test_query_filters_and_sorts() {
        let data = decode(&provider().encode_viewport(&viewport(20.0))).unwrap();

        let ids: Vec<_> = data.ways.iter().map(|w| w.id).collect();
        // Tunnel, river, bridge; the far-away road is outside
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(data.polygons.len(), 1);
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[0].id, 10);
        assert!(!data.header.truncated);
    }

    #[test]
    fn test_low_zoom_sends_no_nodes() {
        let data = decode(&provider().encode_viewport(&viewport(15.0))).unwrap();
        assert!(data.nodes.is_empty());

        let data = decode(&provider().encode_viewport(&viewport(17.5))).unwrap();
        assert_eq!(data.nodes.len(), 1);
        assert!(data.nodes[0].is_priority());
    }

    #[test]
    fn test_cap_sets_truncated() {
        let mut p = MemoryProvider::new();
        let limit = render_limits(5.0).max_ways;
        for id in 0..(limit as u64 + 1) {
            p.add_way(id, feature(base_type::HIGHWAY_PATH, 0), 0, vec![DVec2::ZERO, DVec2::ONE]);
        }
        let data = decode(&p.encode_viewport(&viewport(5.0))).unwrap();
        assert!(data.header.truncated);
        assert_eq!(data.ways.len(), limit);
    }

    #[test]
    fn test_pick_priorities() {
        let p = provider();
        let at = |x: f64, y: f64| PickQuery { merc_x: x, merc_y: y, tolerance_meters: 3.0, zoom: 20.0 };

        assert_eq!(p.pick(&at(1.0, 1.0)), PickResult::Node { id: 10 });
        assert_eq!(p.pick(&at(25.0, 1.0)), PickResult::Way { id: 1 });
        assert_eq!(p.pick(&at(30.0, 30.0)), PickResult::Way { id: 5 });
        assert_eq!(p.pick(&at(-30.0, -30.0)), PickResult::None);
    }

    #[test]
    fn test_from_decoded_round_trip() {
        let original = provider();
        let data = decode(&original.encode_viewport(&viewport(22.0))).unwrap();
        let copy = MemoryProvider::from_decoded(&data);

        assert_eq!(copy.way_count(), 3);
        assert_eq!(copy.polygon_count(), 1);
        assert_eq!(copy.node_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_viewport_rejected() {
        let mut bad = viewport(18.0);
        bad.min_lon = f64::NAN;
        let err = provider().query_viewport(bad).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }
}
