//! Debounced async viewport fetching
//!
//! Camera changes call [`ViewportLoader::request`], which only records the
//! latest viewport. Once no new request has arrived for the debounce delay,
//! the next [`ViewportLoader::poll`] issues a single fetch. A debounced
//! request that comes due while a fetch is outstanding is dropped, not
//! queued. Every fetch carries a sequence number and only the response to
//! the most recently issued one is accepted.
//!
//! Fetch tasks only move bytes; decoding happens in `poll` on the caller's
//! thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::core::camera::Viewport;
use crate::core::error::Error;
use crate::provider::{DataProvider, ProviderError};
use crate::wire::{self, DecodedViewport};

/// Delay between the last camera change and the fetch it triggers
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Raw provider response for one fetch
#[derive(Debug)]
struct FetchResponse {
    seq: u64,
    viewport: Viewport,
    elapsed: Duration,
    result: Result<Vec<u8>, ProviderError>,
}

/// Outcome of a fetch, as seen by the render loop
#[derive(Debug)]
pub enum LoadEvent {
    Loaded {
        seq: u64,
        viewport: Viewport,
        data: DecodedViewport,
        bytes: usize,
        elapsed: Duration,
    },
    /// The fetch or its decode failed; previous data should be kept
    Failed {
        seq: u64,
        viewport: Viewport,
        error: Error,
    },
}

/// Counters for the debug view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoaderStats {
    pub issued: u64,
    pub loaded: u64,
    pub failed: u64,
    pub stale: u64,
    pub dropped: u64,
}

pub struct ViewportLoader<P> {
    provider: Arc<P>,
    runtime: Handle,
    debounce: Duration,
    /// Latest requested viewport and when it was requested
    pending: Option<(Viewport, Instant)>,
    /// Fetches issued whose responses have not been drained yet
    outstanding: usize,
    latest_seq: u64,
    result_tx: mpsc::UnboundedSender<FetchResponse>,
    result_rx: mpsc::UnboundedReceiver<FetchResponse>,
    stats: LoaderStats,
}

impl<P: DataProvider> ViewportLoader<P> {
    pub fn new(provider: Arc<P>, runtime: Handle, debounce: Duration) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            runtime,
            debounce,
            pending: None,
            outstanding: 0,
            latest_seq: 0,
            result_tx,
            result_rx,
            stats: LoaderStats::default(),
        }
    }

    /// A fetch is outstanding
    pub fn is_loading(&self) -> bool {
        self.outstanding > 0
    }

    /// A debounced request is waiting for its delay to pass
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Record a camera-driven request; restarts the debounce delay
    pub fn request(&mut self, viewport: Viewport, now: Instant) {
        self.pending = Some((viewport, now));
    }

    /// Fetch immediately, superseding anything in flight
    ///
    /// Used after edits, where the current data is known to be out of date.
    /// Any outstanding response will be discarded as stale.
    pub fn request_now(&mut self, viewport: Viewport) -> u64 {
        self.pending = None;
        self.issue(viewport)
    }

    /// Issue due requests and drain finished fetches
    pub fn poll(&mut self, now: Instant) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.result_rx.try_recv() {
            events.extend(self.handle(response));
        }

        if let Some((viewport, requested_at)) = self.pending {
            if now.saturating_duration_since(requested_at) >= self.debounce {
                self.pending = None;
                if self.is_loading() {
                    self.stats.dropped += 1;
                    log::debug!("Fetch in flight, dropping viewport request {:?}", viewport);
                } else {
                    self.issue(viewport);
                }
            }
        }

        events
    }

    /// Wait for the next accepted response, `None` once nothing is outstanding
    pub async fn wait(&mut self) -> Option<LoadEvent> {
        while self.outstanding > 0 {
            let response = self.result_rx.recv().await?;
            if let Some(event) = self.handle(response) {
                return Some(event);
            }
        }
        None
    }

    fn issue(&mut self, viewport: Viewport) -> u64 {
        self.latest_seq += 1;
        self.outstanding += 1;
        self.stats.issued += 1;
        let seq = self.latest_seq;

        let provider = Arc::clone(&self.provider);
        let tx = self.result_tx.clone();
        self.runtime.spawn(async move {
            let start = Instant::now();
            // A panicking provider still answers, as a failed fetch
            let result = tokio::spawn(async move { provider.query_viewport(viewport).await })
                .await
                .unwrap_or_else(|e| Err(ProviderError::from(e)));
            let _ = tx.send(FetchResponse {
                seq,
                viewport,
                elapsed: start.elapsed(),
                result,
            });
        });

        log::debug!("Fetch #{} issued for z{:.2}", seq, viewport.zoom);
        seq
    }

    fn handle(&mut self, response: FetchResponse) -> Option<LoadEvent> {
        self.outstanding = self.outstanding.saturating_sub(1);
        let FetchResponse { seq, viewport, elapsed, result } = response;

        if seq != self.latest_seq {
            self.stats.stale += 1;
            log::debug!("Discarding stale fetch #{} (latest #{})", seq, self.latest_seq);
            return None;
        }

        let decoded = result
            .map_err(Error::from)
            .and_then(|bytes| Ok((bytes.len(), wire::decode(&bytes)?)));

        match decoded {
            Ok((bytes, data)) => {
                self.stats.loaded += 1;
                Some(LoadEvent::Loaded { seq, viewport, data, bytes, elapsed })
            }
            Err(error) => {
                self.stats.failed += 1;
                log::warn!("Viewport fetch #{} failed: {}", seq, error);
                Some(LoadEvent::Failed { seq, viewport, error })
            }
        }
    }
}
