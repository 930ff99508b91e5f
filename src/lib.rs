//! Mosm - viewport rendering engine for a local OpenStreetMap editor

pub mod core;
pub mod math;
pub mod wire;
pub mod style;
pub mod render;
pub mod picking;
pub mod streaming;
pub mod provider;
pub mod engine;

pub use engine::{EngineConfig, EngineEvent, MapEngine};
