//! Error types for the viewport engine

use thiserror::Error;

use crate::provider::ProviderError;
use crate::wire::DecodeError;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// No drawable surface; the engine cannot be constructed without one
    #[error("Canvas error: {0}")]
    Canvas(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
