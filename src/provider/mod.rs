//! Data provider boundary
//!
//! Storage, spatial indexing and editing live behind this async interface;
//! the engine only issues viewport and pick queries and consumes the results.

pub mod types;
pub mod memory;
pub mod synthetic;
#[cfg(test)]
pub mod scripted;

use std::future::Future;

use thiserror::Error;

use crate::core::camera::Viewport;

pub use memory::MemoryProvider;
pub use types::{PickQuery, PickResult, UndoRedoResult, UpdateTagsResult};

/// Failures reported by a data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("query rejected: {0}")]
    Rejected(String),

    #[error("provider I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The query task panicked or was cancelled before answering
    #[error("provider task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Asynchronous source of viewport geometry and feature picks
pub trait DataProvider: Send + Sync + 'static {
    /// Encoded viewport buffer covering `viewport`
    fn query_viewport(&self, viewport: Viewport) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Nearest feature to a Mercator point within a tolerance
    fn pick_feature(&self, query: PickQuery) -> impl Future<Output = Result<PickResult, ProviderError>> + Send;
}
