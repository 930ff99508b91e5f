//! Web Mercator projection (EPSG:3857)
//!
//! Converts WGS84 lon/lat degrees to projected meters and back. The data
//! provider projects geometry with exactly these constants and operation
//! order; any divergence shows up as geometry drifting against the camera.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::core::types::DVec2;

/// Earth half-circumference in meters (6378137 m × π)
pub const EARTH_HALF_CIRCUMFERENCE: f64 = 20037508.342789244;

/// Latitude limit of the square Mercator world, in degrees
pub const MAX_LATITUDE: f64 = 85.051129;

/// A WGS84 coordinate in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Project lon/lat degrees to Mercator meters
///
/// Latitude is clamped to ±[`MAX_LATITUDE`] so the poles stay finite.
///
/// # Examples
/// ```
/// use mosm::math::projection::forward;
///
/// let origin = forward(0.0, 0.0);
/// assert!(origin.x.abs() < 1e-9 && origin.y.abs() < 1e-9);
/// ```
#[inline]
pub fn forward(lon: f64, lat: f64) -> DVec2 {
    let x = lon * EARTH_HALF_CIRCUMFERENCE / 180.0;

    let lat_clamped = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let lat_rad = (90.0 + lat_clamped) * PI / 360.0;
    let y = lat_rad.tan().ln() * EARTH_HALF_CIRCUMFERENCE / PI;

    DVec2::new(x, y)
}

/// Unproject Mercator meters back to lon/lat degrees
#[inline]
pub fn inverse(merc: DVec2) -> LonLat {
    let lon = merc.x * 180.0 / EARTH_HALF_CIRCUMFERENCE;
    let lat = (2.0 * (merc.y * PI / EARTH_HALF_CIRCUMFERENCE).exp().atan() - PI / 2.0) * 180.0 / PI;
    LonLat { lon, lat }
}
