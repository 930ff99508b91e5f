//! Mathematical utilities: projection and planar geometry

pub mod projection;
pub mod bounds;
pub mod geometry;

pub use bounds::Bounds;
pub use projection::LonLat;
