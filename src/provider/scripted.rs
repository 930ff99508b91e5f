//! Provider that replays queued responses, for tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::camera::Viewport;

use super::{DataProvider, PickQuery, PickResult, ProviderError};

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, String>)>>;

/// Each call pops the next queued response, waits its delay and returns it
///
/// An exhausted queue answers with `Unavailable`.
#[derive(Default)]
pub struct ScriptedProvider {
    viewports: Scripted<Vec<u8>>,
    picks: Scripted<PickResult>,
    panic_viewport: AtomicBool,
    panic_pick: AtomicBool,
    pub viewport_queries: Mutex<Vec<Viewport>>,
    pub pick_queries: Mutex<Vec<PickQuery>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_viewport(&self, delay: Duration, response: Result<Vec<u8>, String>) {
        if let Ok(mut queue) = self.viewports.lock() {
            queue.push_back((delay, response));
        }
    }

    pub fn push_pick(&self, delay: Duration, response: Result<PickResult, String>) {
        if let Ok(mut queue) = self.picks.lock() {
            queue.push_back((delay, response));
        }
    }

    /// Make the next viewport query panic instead of answering
    pub fn panic_next_viewport(&self) {
        self.panic_viewport.store(true, Ordering::SeqCst);
    }

    pub fn panic_next_pick(&self) {
        self.panic_pick.store(true, Ordering::SeqCst);
    }

    pub fn viewport_query_count(&self) -> usize {
        self.viewport_queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn pick_query_count(&self) -> usize {
        self.pick_queries.lock().map(|q| q.len()).unwrap_or(0)
    }
}

async fn replay<T>(queue: &Scripted<T>) -> Result<T, ProviderError> {
    let next = queue.lock().ok().and_then(|mut q| q.pop_front());
    let Some((delay, response)) = next else {
        return Err(ProviderError::Unavailable("no scripted response".into()));
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    response.map_err(ProviderError::Unavailable)
}

impl DataProvider for ScriptedProvider {
    async fn query_viewport(&self, viewport: Viewport) -> Result<Vec<u8>, ProviderError> {
        if let Ok(mut seen) = self.viewport_queries.lock() {
            seen.push(viewport);
        }
        if self.panic_viewport.swap(false, Ordering::SeqCst) {
            panic!("scripted viewport query panicked");
        }
        replay(&self.viewports).await
    }

    async fn pick_feature(&self, query: PickQuery) -> Result<PickResult, ProviderError> {
        if let Ok(mut seen) = self.pick_queries.lock() {
            seen.push(query);
        }
        if self.panic_pick.swap(false, Ordering::SeqCst) {
            panic!("scripted pick panicked");
        }
        replay(&self.picks).await
    }
}
