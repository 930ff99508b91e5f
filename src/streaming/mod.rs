//! Viewport data streaming from the provider

pub mod viewport_loader;

pub use viewport_loader::{LoadEvent, LoaderStats, ViewportLoader, DEFAULT_DEBOUNCE};
