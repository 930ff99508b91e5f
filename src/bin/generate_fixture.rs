//! Fixture generator binary - writes a synthetic viewport buffer to disk.
//!
//! Usage: cargo run --release --bin generate_fixture -- [OPTIONS]
//!
//! Options:
//!   --out <FILE>      Output path (default: fixtures/town.bin)
//!   --lon <DEG>       Town center longitude (default: 7.4246)
//!   --lat <DEG>       Town center latitude (default: 43.7384)
//!   --blocks <N>      Blocks per side (default: 8)
//!   --zoom <Z>        Zoom used for the provider's result caps (default: 19)
//!
//! The buffer covers the whole town and can be fed back into the viewer
//! with `mosm --buffer <FILE>`.

use std::path::PathBuf;
use std::time::Instant;

use mosm::core::camera::Viewport;
use mosm::math::projection;
use mosm::provider::synthetic::{self, TownOptions};
use mosm::wire;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let defaults = TownOptions::default();
    let out = parse_arg(&args, "--out").unwrap_or_else(|| PathBuf::from("fixtures/town.bin"));
    let lon = parse_arg(&args, "--lon").unwrap_or(defaults.center.lon);
    let lat = parse_arg(&args, "--lat").unwrap_or(defaults.center.lat);
    let blocks = parse_arg(&args, "--blocks").unwrap_or(defaults.blocks);
    let zoom = parse_arg(&args, "--zoom").unwrap_or(19.0);

    let start = Instant::now();
    let options = TownOptions {
        center: projection::LonLat::new(lon, lat),
        blocks,
        ..defaults
    };
    let town = synthetic::town(&options);

    let Some(bounds) = town.bounds() else {
        log::error!("Town generator produced no geometry");
        std::process::exit(1);
    };
    let min = projection::inverse(bounds.min);
    let max = projection::inverse(bounds.max);
    let viewport = Viewport {
        min_lon: min.lon,
        min_lat: min.lat,
        max_lon: max.lon,
        max_lat: max.lat,
        zoom,
    };

    let bytes = town.encode_viewport(&viewport);
    let header = match wire::decode(&bytes) {
        Ok(data) => data.header,
        Err(e) => {
            log::error!("Encoded buffer does not decode: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(parent) = out.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }
    if let Err(e) = std::fs::write(&out, &bytes) {
        log::error!("Failed to write {}: {}", out.display(), e);
        std::process::exit(1);
    }

    log::info!(
        "Wrote {} ({} bytes): {} nodes, {} ways, {} polygons{} in {:.1}ms",
        out.display(),
        bytes.len(),
        header.node_count,
        header.way_count,
        header.polygon_count,
        if header.truncated { " (truncated)" } else { "" },
        start.elapsed().as_secs_f64() * 1000.0
    );
}

fn parse_arg<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
