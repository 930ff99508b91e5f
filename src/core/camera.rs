//! Map camera: viewport center and zoom over Web Mercator
//!
//! Screen space has its origin at the top-left corner of the canvas with
//! y growing downwards; Mercator y grows northwards. All conversions are
//! affine around the canvas center.

use serde::{Deserialize, Serialize};

use crate::core::types::DVec2;
use crate::math::projection::{self, EARTH_HALF_CIRCUMFERENCE, LonLat};

/// Lowest zoom the camera accepts
pub const MIN_ZOOM: f64 = 1.0;

/// Highest zoom the camera accepts
pub const MAX_ZOOM: f64 = 26.0;

/// Edge length of a zoom-0 world tile in pixels
pub const TILE_SIZE: f64 = 256.0;

/// Meters covered by one screen pixel at `zoom`
pub fn meters_per_pixel(zoom: f64) -> f64 {
    2.0 * EARTH_HALF_CIRCUMFERENCE / (TILE_SIZE * 2f64.powf(zoom))
}

/// Camera state as seen by callers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Center longitude in degrees
    pub center_lon: f64,
    /// Center latitude in degrees
    pub center_lat: f64,
    /// Zoom level, clamped to [MIN_ZOOM, MAX_ZOOM]
    pub zoom: f64,
}

/// Geographic query rectangle sent to the data provider
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub zoom: f64,
}

/// Emitted by every camera mutation; consumed by whatever schedules refetches
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraChanged {
    pub state: CameraState,
    pub viewport: Viewport,
}

/// 2D map camera
///
/// The Mercator center is cached and kept in sync on every mutation so that
/// panning accumulates in meters rather than being re-derived from degrees.
#[derive(Clone, Debug)]
pub struct Camera {
    state: CameraState,
    center_merc: DVec2,
    width: f64,
    height: f64,
}

impl Camera {
    /// Create a camera for a canvas of `width` x `height` pixels
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: u32, height: u32) -> Self {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        Self {
            state: CameraState { center_lon, center_lat, zoom },
            center_merc: projection::forward(center_lon, center_lat),
            width: width as f64,
            height: height as f64,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn zoom(&self) -> f64 {
        self.state.zoom
    }

    /// Cached center in Mercator meters
    pub fn center_mercator(&self) -> DVec2 {
        self.center_merc
    }

    /// Canvas size in pixels
    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    /// Meters per pixel at the current zoom
    pub fn meters_per_pixel(&self) -> f64 {
        meters_per_pixel(self.state.zoom)
    }

    /// Jump to a new center and zoom
    ///
    /// Returns `None` and leaves the camera untouched if any input is not finite.
    pub fn set_camera(&mut self, center_lon: f64, center_lat: f64, zoom: f64) -> Option<CameraChanged> {
        if !(center_lon.is_finite() && center_lat.is_finite() && zoom.is_finite()) {
            return None;
        }
        self.state = CameraState {
            center_lon,
            center_lat,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        };
        self.center_merc = projection::forward(center_lon, center_lat);
        Some(self.changed())
    }

    /// Update the canvas size (center and zoom are kept)
    pub fn set_size(&mut self, width: u32, height: u32) -> CameraChanged {
        self.width = width as f64;
        self.height = height as f64;
        self.changed()
    }

    /// Move the view center by a screen-space delta in pixels
    ///
    /// Positive `dy` moves the view down the screen, which is south in
    /// Mercator. A pointer drag maps to `pan(-drag_x, -drag_y)`. Non-finite
    /// deltas are ignored and return `None`.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Option<CameraChanged> {
        if !(dx.is_finite() && dy.is_finite()) {
            return None;
        }
        let mpp = self.meters_per_pixel();
        self.center_merc.x += dx * mpp;
        self.center_merc.y -= dy * mpp;
        self.sync_lonlat();
        Some(self.changed())
    }

    /// Zoom by `delta` keeping the Mercator point under (`screen_x`, `screen_y`) fixed
    ///
    /// Returns `None` when the clamped zoom does not change or an input is
    /// not finite.
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) -> Option<CameraChanged> {
        if !(delta.is_finite() && screen_x.is_finite() && screen_y.is_finite()) {
            return None;
        }
        let new_zoom = (self.state.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        if new_zoom == self.state.zoom {
            return None;
        }

        let anchor = self.screen_to_mercator(screen_x, screen_y);
        let offset = self.screen_offset(screen_x, screen_y);
        let new_mpp = meters_per_pixel(new_zoom);

        self.state.zoom = new_zoom;
        self.center_merc = DVec2::new(
            anchor.x - offset.x * new_mpp,
            anchor.y + offset.y * new_mpp,
        );
        self.sync_lonlat();
        Some(self.changed())
    }

    /// Screen pixel to Mercator meters
    pub fn screen_to_mercator(&self, screen_x: f64, screen_y: f64) -> DVec2 {
        let offset = self.screen_offset(screen_x, screen_y);
        let mpp = self.meters_per_pixel();
        DVec2::new(
            self.center_merc.x + offset.x * mpp,
            self.center_merc.y - offset.y * mpp,
        )
    }

    /// Mercator meters to screen pixel
    pub fn mercator_to_screen(&self, merc: DVec2) -> DVec2 {
        self.mercator_to_local(merc) + self.size() * 0.5
    }

    /// Mercator meters to pixels relative to the canvas center
    ///
    /// This is the transform used for drawing once the origin has been
    /// translated to the canvas center.
    #[inline]
    pub fn mercator_to_local(&self, merc: DVec2) -> DVec2 {
        let mpp = self.meters_per_pixel();
        DVec2::new(
            (merc.x - self.center_merc.x) / mpp,
            (self.center_merc.y - merc.y) / mpp,
        )
    }

    /// Screen pixel to lon/lat degrees
    pub fn screen_to_lonlat(&self, screen_x: f64, screen_y: f64) -> LonLat {
        projection::inverse(self.screen_to_mercator(screen_x, screen_y))
    }

    /// Geographic rectangle covering the whole canvas
    ///
    /// Every corner is unprojected exactly and the extremes taken, so the
    /// rectangle never under-covers the visible area.
    pub fn viewport(&self) -> Viewport {
        let mpp = self.meters_per_pixel();
        let half = self.size() * 0.5 * mpp;
        let c = self.center_merc;

        let corners = [
            DVec2::new(c.x - half.x, c.y - half.y),
            DVec2::new(c.x + half.x, c.y - half.y),
            DVec2::new(c.x - half.x, c.y + half.y),
            DVec2::new(c.x + half.x, c.y + half.y),
        ];

        let mut viewport = Viewport {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
            zoom: self.state.zoom,
        };
        for corner in corners {
            let ll = projection::inverse(corner);
            viewport.min_lon = viewport.min_lon.min(ll.lon);
            viewport.min_lat = viewport.min_lat.min(ll.lat);
            viewport.max_lon = viewport.max_lon.max(ll.lon);
            viewport.max_lat = viewport.max_lat.max(ll.lat);
        }
        viewport
    }

    fn screen_offset(&self, screen_x: f64, screen_y: f64) -> DVec2 {
        DVec2::new(screen_x - self.width * 0.5, screen_y - self.height * 0.5)
    }

    fn sync_lonlat(&mut self) {
        let ll = projection::inverse(self.center_merc);
        self.state.center_lon = ll.lon;
        self.state.center_lat = ll.lat;
    }

    fn changed(&self) -> CameraChanged {
        CameraChanged {
            state: self.state,
            viewport: self.viewport(),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 2.0, 800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monaco() -> Camera {
        Camera::new(7.42, 43.74, 17.0, 1024, 768)
    }

    #[test]
    fn test_zoom_is_clamped_on_construction() {
        assert_eq!(Camera::new(0.0, 0.0, 40.0, 10, 10).zoom(), MAX_ZOOM);
        assert_eq!(Camera::new(0.0, 0.0, -3.0, 10, 10).zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_meters_per_pixel_at_zoom_zero() {
        let mpp = meters_per_pixel(0.0);
        assert!((mpp - 2.0 * EARTH_HALF_CIRCUMFERENCE / 256.0).abs() < 1e-9);
        assert!((meters_per_pixel(1.0) * 2.0 - mpp).abs() < 1e-9);
    }

    #[test]
    fn test_canvas_center_is_camera_center() {
        let camera = monaco();
        let merc = camera.screen_to_mercator(512.0, 384.0);
        assert_eq!(merc, camera.center_mercator());
    }

    #[test]
    fn test_pan_round_trip() {
        for &(dx, dy) in &[(10.0, -4.0), (-250.5, 300.25), (0.0, 1000.0)] {
            let mut camera = monaco();
            let before = camera.center_mercator();
            camera.pan(dx, dy);
            camera.pan(-dx, -dy);
            let after = camera.center_mercator();
            assert!((after - before).length() < 1e-6, "drift {:?}", after - before);
        }
    }

    #[test]
    fn test_pan_direction() {
        let mut camera = monaco();
        let before = camera.center_mercator();
        camera.pan(100.0, 50.0);
        let after = camera.center_mercator();
        assert!(after.x > before.x);
        assert!(after.y < before.y);
        let state = camera.state();
        assert!(state.center_lon > 7.42);
        assert!(state.center_lat < 43.74);
    }

    #[test]
    fn test_pan_shifts_content_against_delta() {
        let mut camera = monaco();
        let target = camera.screen_to_mercator(340.0, 175.0);
        camera.pan(40.0, -25.0);
        let now_at = camera.screen_to_mercator(300.0, 200.0);
        assert!((now_at - target).length() < 1e-6);
    }

    #[test]
    fn test_zoom_at_keeps_cursor_point_fixed() {
        let cases = [
            (1.0, 100.0, 100.0),
            (-2.5, 900.0, 50.0),
            (0.37, 512.0, 384.0),
            (3.0, 0.0, 767.0),
        ];
        for &(delta, sx, sy) in &cases {
            let mut camera = monaco();
            let before = camera.screen_to_mercator(sx, sy);
            let changed = camera.zoom_at(delta, sx, sy);
            assert!(changed.is_some());
            let after = camera.screen_to_mercator(sx, sy);
            assert!(
                (after - before).length() < 1e-6,
                "delta {} at ({}, {}) drifted {:?}",
                delta, sx, sy, after - before
            );
        }
    }

    #[test]
    fn test_zoom_at_noop_when_clamped() {
        let mut camera = Camera::new(0.0, 0.0, MAX_ZOOM, 100, 100);
        let before = camera.state();
        assert!(camera.zoom_at(1.0, 10.0, 10.0).is_none());
        assert_eq!(camera.state(), before);
    }

    #[test]
    fn test_zoom_at_clamps_to_range() {
        let mut camera = Camera::new(0.0, 0.0, 25.5, 100, 100);
        let changed = camera.zoom_at(2.0, 50.0, 50.0).unwrap();
        assert_eq!(changed.state.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_screen_mercator_inverse() {
        let camera = monaco();
        for &(sx, sy) in &[(0.0, 0.0), (1024.0, 768.0), (13.5, 700.25), (-40.0, 2000.0)] {
            let merc = camera.screen_to_mercator(sx, sy);
            let back = camera.mercator_to_screen(merc);
            assert!((back.x - sx).abs() < 1e-6 && (back.y - sy).abs() < 1e-6);
        }

        let merc = DVec2::new(826_000.0, 5_425_000.0);
        let screen = camera.mercator_to_screen(merc);
        let back = camera.screen_to_mercator(screen.x, screen.y);
        assert!((back - merc).length() < 1e-6);
    }

    #[test]
    fn test_viewport_covers_corners() {
        let camera = monaco();
        let viewport = camera.viewport();
        for &(sx, sy) in &[(0.0, 0.0), (1024.0, 0.0), (0.0, 768.0), (1024.0, 768.0), (512.0, 384.0)] {
            let ll = camera.screen_to_lonlat(sx, sy);
            assert!(ll.lon >= viewport.min_lon - 1e-12 && ll.lon <= viewport.max_lon + 1e-12);
            assert!(ll.lat >= viewport.min_lat - 1e-12 && ll.lat <= viewport.max_lat + 1e-12);
        }
        assert!(viewport.min_lat < 43.74 && viewport.max_lat > 43.74);
        assert_eq!(viewport.zoom, 17.0);
    }

    #[test]
    fn test_mutations_report_new_state() {
        let mut camera = monaco();
        let changed = camera.pan(10.0, 0.0).unwrap();
        assert_eq!(changed.state, camera.state());
        assert_eq!(changed.viewport, camera.viewport());

        let changed = camera.set_camera(2.35, 48.85, 12.0).unwrap();
        assert_eq!(changed.state.zoom, 12.0);
        assert!((camera.center_mercator() - projection::forward(2.35, 48.85)).length() < 1e-9);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut camera = monaco();
        let before = camera.state();

        assert!(camera.set_camera(f64::NAN, 43.0, 12.0).is_none());
        assert!(camera.set_camera(7.0, 43.0, f64::NAN).is_none());
        assert!(camera.set_camera(7.0, 43.0, f64::INFINITY).is_none());
        assert!(camera.zoom_at(f64::NAN, 10.0, 10.0).is_none());
        assert!(camera.zoom_at(1.0, f64::NAN, 10.0).is_none());
        assert!(camera.pan(f64::INFINITY, 0.0).is_none());

        assert_eq!(camera.state(), before);
        assert!(camera.center_mercator().is_finite());
    }
}
