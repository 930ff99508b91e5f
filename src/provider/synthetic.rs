//! Synthetic town generator
//!
//! Produces a small street grid with a river, bridges, a tunnel, a railway,
//! buildings (some with courtyards), a lake, a park and a boundary. Used when
//! no captured buffer is available.

use std::collections::HashMap;

use crate::core::types::{DVec2, FeatureId};
use crate::math::{projection, LonLat};
use crate::style::{base_type, flags, RenderFeature};
use crate::wire::NodeRecord;

use super::MemoryProvider;

/// Node ids start above 2^32 so that both id words are exercised
const NODE_ID_BASE: FeatureId = 1 << 32;

#[derive(Clone, Copy, Debug)]
pub struct TownOptions {
    pub center: LonLat,
    /// Blocks per side
    pub blocks: u32,
    /// Block edge length in Mercator meters
    pub block_size: f64,
}

impl Default for TownOptions {
    fn default() -> Self {
        Self {
            center: LonLat::new(7.4246, 43.7384),
            blocks: 8,
            block_size: 120.0,
        }
    }
}

/// Tracks way ids and how many ways reference each vertex
struct TownBuilder {
    provider: MemoryProvider,
    next_way: FeatureId,
    vertices: HashMap<(i64, i64), (DVec2, u16)>,
}

impl TownBuilder {
    fn new() -> Self {
        Self {
            provider: MemoryProvider::new(),
            next_way: 1,
            vertices: HashMap::new(),
        }
    }

    fn way(&mut self, feature: RenderFeature, layer: i8, points: Vec<DVec2>) {
        let mut seen = Vec::with_capacity(points.len());
        for &p in &points {
            let key = ((p.x * 100.0).round() as i64, (p.y * 100.0).round() as i64);
            if !seen.contains(&key) {
                seen.push(key);
                self.vertices.entry(key).or_insert((p, 0)).1 += 1;
            }
        }
        let id = self.next_id();
        self.provider.add_way(id, feature, layer, points);
    }

    fn area(&mut self, feature: RenderFeature, rings: Vec<Vec<DVec2>>) {
        let id = self.next_id();
        self.provider.add_polygon(id, feature, 0, rings);
    }

    fn next_id(&mut self) -> FeatureId {
        let id = self.next_way;
        self.next_way += 1;
        id
    }

    fn finish(mut self) -> MemoryProvider {
        let mut vertices: Vec<_> = self.vertices.into_iter().collect();
        vertices.sort_by_key(|(key, _)| *key);
        for (index, (_, (position, ref_count))) in vertices.into_iter().enumerate() {
            self.provider.add_node(NodeRecord {
                id: NODE_ID_BASE + index as FeatureId,
                position,
                ref_count,
            });
        }
        self.provider
    }
}

fn street_feature(index: u32) -> RenderFeature {
    let base = if index % 4 == 0 {
        base_type::HIGHWAY_MAJOR
    } else if index % 2 == 0 {
        base_type::HIGHWAY_MINOR
    } else {
        base_type::HIGHWAY_ROAD
    };
    RenderFeature::new(base, 0)
}

/// Closed axis-aligned ring
fn rect_ring(min: DVec2, max: DVec2) -> Vec<DVec2> {
    vec![min, DVec2::new(max.x, min.y), max, DVec2::new(min.x, max.y), min]
}

/// Closed regular polygon approximating a circle
fn round_ring(center: DVec2, radius: f64, sides: usize) -> Vec<DVec2> {
    let mut ring: Vec<DVec2> = (0..sides)
        .map(|i| {
            let a = i as f64 / sides as f64 * std::f64::consts::TAU;
            center + DVec2::new(a.cos(), a.sin()) * radius
        })
        .collect();
    ring.push(ring[0]);
    ring
}

/// Build the town scene
pub fn town(options: &TownOptions) -> MemoryProvider {
    let n = options.blocks.max(4);
    let bs = options.block_size;
    let extent = n as f64 * bs;
    let origin = projection::forward(options.center.lon, options.center.lat) - DVec2::splat(extent * 0.5);
    let gx = |i: u32| origin.x + i as f64 * bs;
    let gy = |j: u32| origin.y + j as f64 * bs;

    let river_col = n / 2;
    let tunnel_col = n / 4;
    let lake_block = (1, n - 2);
    let park_block = (n - 2, 1);
    let mut town = TownBuilder::new();

    // Boundary and landuse underneath everything
    let margin = bs * 0.75;
    town.way(
        RenderFeature::new(base_type::BOUNDARY, 0),
        0,
        rect_ring(origin - DVec2::splat(margin), origin + DVec2::splat(extent + margin)),
    );
    town.area(
        RenderFeature::new(base_type::LANDUSE, 0),
        vec![rect_ring(DVec2::new(gx(0), gy(0)), DVec2::new(gx(1), gy(1)))],
    );

    // River meanders through the middle of one block column
    let river_x = gx(river_col) + bs * 0.5;
    let river: Vec<DVec2> = (0..=n * 2 + 2)
        .map(|k| {
            let y = origin.y - bs * 0.5 + k as f64 * bs * 0.5;
            DVec2::new(river_x + (k as f64 * 0.9).sin() * bs * 0.12, y)
        })
        .collect();
    town.way(RenderFeature::new(base_type::WATERWAY_RIVER, 0), 0, river);

    // East-west streets, split into west, bridge and east parts
    for j in 0..=n {
        let feature = street_feature(j);
        let y = gy(j);
        let vertices = |from: u32, to: u32| -> Vec<DVec2> {
            let mut points = Vec::new();
            for i in from..to {
                points.push(DVec2::new(gx(i), y));
                points.push(DVec2::new(gx(i) + bs * 0.5, y));
            }
            points.push(DVec2::new(gx(to), y));
            points
        };
        town.way(feature, 0, vertices(0, river_col));
        town.way(feature.with(flags::BRIDGE), 1, vertices(river_col, river_col + 1));
        town.way(feature, 0, vertices(river_col + 1, n));
    }

    // North-south streets; one dips into a tunnel for its first block
    for i in 0..=n {
        let feature = street_feature(i);
        let x = gx(i);
        let vertices = |from: u32, to: u32| -> Vec<DVec2> {
            let mut points = Vec::new();
            for j in from..to {
                points.push(DVec2::new(x, gy(j)));
                points.push(DVec2::new(x, gy(j) + bs * 0.5));
            }
            points.push(DVec2::new(x, gy(to)));
            points
        };
        if i == tunnel_col {
            town.way(feature.with(flags::TUNNEL), -1, vertices(0, 1));
            town.way(feature, 0, vertices(1, n));
        } else {
            town.way(feature, 0, vertices(0, n));
        }
    }

    // Railway along the southern edge, bridging the river
    let rail_y = origin.y - bs * 0.4;
    let rail = RenderFeature::new(base_type::RAILWAY_MAIN, 0);
    town.way(rail, 0, vec![DVec2::new(gx(0), rail_y), DVec2::new(gx(river_col), rail_y)]);
    town.way(
        rail.with(flags::BRIDGE),
        1,
        vec![DVec2::new(gx(river_col), rail_y), DVec2::new(gx(river_col + 1), rail_y)],
    );
    town.way(rail, 0, vec![DVec2::new(gx(river_col + 1), rail_y), DVec2::new(gx(n), rail_y)]);

    // Blocks: buildings, the lake and the park
    let inset = bs * 0.12;
    for j in 0..n {
        for i in 0..n {
            let min = DVec2::new(gx(i), gy(j)) + DVec2::splat(inset);
            let max = DVec2::new(gx(i + 1), gy(j + 1)) - DVec2::splat(inset);
            let center = (min + max) * 0.5;

            if (i, j) == lake_block {
                town.area(
                    RenderFeature::new(base_type::NATURAL_WATER, 0),
                    vec![round_ring(center, bs * 0.35, 16)],
                );
            } else if (i, j) == park_block {
                town.area(RenderFeature::new(base_type::NATURAL_GRASS, 0), vec![rect_ring(min, max)]);
                town.area(
                    RenderFeature::new(base_type::NATURAL_WOOD, 0),
                    vec![round_ring(center + DVec2::splat(bs * 0.1), bs * 0.2, 10)],
                );
                town.way(
                    RenderFeature::new(base_type::HIGHWAY_PATH, 0),
                    0,
                    vec![min, center, max],
                );
            } else if i == river_col || (i == 0 && j == 0) {
                continue;
            } else if (i + j) % 5 == 0 {
                // Courtyard block
                let hole = bs * 0.18;
                town.area(
                    RenderFeature::new(base_type::BUILDING, 0),
                    vec![
                        rect_ring(min, max),
                        rect_ring(center - DVec2::splat(hole), center + DVec2::splat(hole)),
                    ],
                );
            } else {
                let split = center.x;
                town.area(RenderFeature::new(base_type::BUILDING, 0), vec![rect_ring(min, DVec2::new(split - 2.0, max.y))]);
                town.area(RenderFeature::new(base_type::BUILDING, 0), vec![rect_ring(DVec2::new(split + 2.0, min.y), max)]);
            }
        }
    }

    // A seasonal stream and some steps down to the river
    let stream_y = gy(n - 1) + bs * 0.5;
    town.way(
        RenderFeature::new(base_type::WATERWAY_STREAM, flags::INTERMITTENT),
        0,
        vec![DVec2::new(gx(river_col + 1) + inset, stream_y), DVec2::new(river_x, stream_y)],
    );
    town.way(
        RenderFeature::new(base_type::HIGHWAY_STEPS, 0),
        0,
        vec![DVec2::new(gx(river_col), gy(2) + bs * 0.5), DVec2::new(river_x - bs * 0.2, gy(2) + bs * 0.5)],
    );

    let provider = town.finish();
    log::debug!(
        "Synthetic town: {} nodes, {} ways, {} polygons",
        provider.node_count(),
        provider.way_count(),
        provider.polygon_count()
    );
    provider
}
