//! Core type aliases and re-exports

pub use glam::DVec2;

/// Standard Result type for the engine
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// OSM element id as carried on the wire (unsigned 64-bit)
pub type FeatureId = u64;
