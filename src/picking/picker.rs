//! Click to feature lookup
//!
//! The actual nearest-feature search belongs to the data provider. The
//! picker turns a click into a query, runs it on the async runtime and hands
//! the answer back to the render thread through a channel. Only one pick can
//! be outstanding; clicks while it is pending are ignored.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::core::camera::Camera;
use crate::provider::{DataProvider, PickQuery, PickResult, ProviderError};

/// Click tolerance in screen pixels
pub const PICK_PIXEL_TOLERANCE: f64 = 8.0;

/// Query for the feature under a screen point
pub fn pick_query(camera: &Camera, screen_x: f64, screen_y: f64, pixel_tolerance: f64) -> PickQuery {
    let merc = camera.screen_to_mercator(screen_x, screen_y);
    PickQuery {
        merc_x: merc.x,
        merc_y: merc.y,
        tolerance_meters: pixel_tolerance * camera.meters_per_pixel(),
        zoom: camera.zoom(),
    }
}

/// Completed pick, paired with the query that produced it
#[derive(Debug)]
pub struct PickResponse {
    pub query: PickQuery,
    pub result: Result<PickResult, ProviderError>,
}

pub struct Picker<P> {
    provider: Arc<P>,
    runtime: Handle,
    result_tx: mpsc::UnboundedSender<PickResponse>,
    result_rx: mpsc::UnboundedReceiver<PickResponse>,
    in_flight: bool,
    pixel_tolerance: f64,
}

impl<P: DataProvider> Picker<P> {
    pub fn new(provider: Arc<P>, runtime: Handle, pixel_tolerance: f64) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            runtime,
            result_tx,
            result_rx,
            in_flight: false,
            pixel_tolerance,
        }
    }

    pub fn is_picking(&self) -> bool {
        self.in_flight
    }

    pub fn pixel_tolerance(&self) -> f64 {
        self.pixel_tolerance
    }

    /// Build the query for a click without issuing it
    pub fn query_at(&self, camera: &Camera, screen_x: f64, screen_y: f64) -> PickQuery {
        pick_query(camera, screen_x, screen_y, self.pixel_tolerance)
    }

    /// Start a pick; returns `false` if one is already pending
    pub fn pick(&mut self, query: PickQuery) -> bool {
        if self.in_flight {
            log::debug!("Pick already in flight, ignoring click");
            return false;
        }
        self.in_flight = true;

        let provider = Arc::clone(&self.provider);
        let tx = self.result_tx.clone();
        self.runtime.spawn(async move {
            let result = tokio::spawn(async move { provider.pick_feature(query).await })
                .await
                .unwrap_or_else(|e| Err(ProviderError::from(e)));
            let _ = tx.send(PickResponse { query, result });
        });
        true
    }

    /// Non-blocking check for a finished pick
    pub fn poll(&mut self) -> Option<PickResponse> {
        let response = self.result_rx.try_recv().ok()?;
        self.in_flight = false;
        Some(response)
    }

    /// Wait for the pending pick, `None` if there is none
    pub async fn wait(&mut self) -> Option<PickResponse> {
        if !self.in_flight {
            return None;
        }
        let response = self.result_rx.recv().await?;
        self.in_flight = false;
        Some(response)
    }
}
