//! Feature codes and paint style resolution

pub mod feature;
pub mod color;
pub mod resolver;

pub use color::Color;
pub use feature::{base_type, flags, RenderFeature};
pub use resolver::{fill_color, Casing, Dash, LineCap, LineJoin, ResolvedStyle, StyleResolver};
