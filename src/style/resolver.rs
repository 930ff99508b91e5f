//! Render feature to paint style resolution
//!
//! Styles are built fresh for every call from a fixed base table and a fixed
//! sequence of flag modifiers; nothing is shared or mutated between calls.

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::feature::{base_type, flags, RenderFeature};

/// Color change applied by the tunnel and construction modifiers
pub const MODIFIER_AMOUNT: f32 = 0.3;

pub const CASING_COLOR: Color = Color::hex(0x333333);
pub const CASING_WIDTH: f32 = 1.5;

pub const TUNNEL_DASH: Dash = Dash { on: 6.0, off: 4.0 };
pub const INTERMITTENT_DASH: Dash = Dash { on: 3.0, off: 3.0 };
pub const CONSTRUCTION_DASH: Dash = Dash { on: 8.0, off: 4.0 };

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineCap {
    Butt,
    #[default]
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineJoin {
    Miter,
    #[default]
    Round,
    Bevel,
}

/// On/off dash lengths in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dash {
    pub on: f32,
    pub off: f32,
}

/// Wider stroke painted underneath a line
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Casing {
    pub color: Color,
    pub width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStyle {
    pub color: Color,
    pub width: f32,
    pub dash: Option<Dash>,
    pub cap: LineCap,
    pub join: LineJoin,
    pub casing: Option<Casing>,
}

impl ResolvedStyle {
    const fn line(color: u32, width: f32) -> Self {
        Self {
            color: Color::hex(color),
            width,
            dash: None,
            cap: LineCap::Round,
            join: LineJoin::Round,
            casing: None,
        }
    }

    const fn edge(color: u32, width: f32) -> Self {
        Self {
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            ..Self::line(color, width)
        }
    }

    const fn dashed(self, dash: Dash) -> Self {
        Self { dash: Some(dash), ..self }
    }

    /// Total width covered by the casing stroke, if any
    pub fn casing_width(&self) -> Option<f32> {
        self.casing.map(|casing| self.width + 2.0 * casing.width)
    }
}

const DEFAULT_STYLE: ResolvedStyle = ResolvedStyle::line(0x888888, 1.0);

fn base_style(base: u8) -> ResolvedStyle {
    match base {
        base_type::HIGHWAY_MAJOR => ResolvedStyle::line(0xe8924a, 5.0),
        base_type::HIGHWAY_MINOR => ResolvedStyle::line(0xf6d365, 4.0),
        base_type::HIGHWAY_ROAD => ResolvedStyle::line(0xd0d0d0, 3.0),
        base_type::HIGHWAY_PATH => ResolvedStyle::line(0xc2714f, 1.5),
        base_type::HIGHWAY_STEPS => ResolvedStyle::edge(0xc2714f, 2.0).dashed(Dash { on: 2.0, off: 2.0 }),
        base_type::RAILWAY_MAIN => ResolvedStyle::edge(0x555555, 2.5),
        base_type::RAILWAY_LIGHT => ResolvedStyle::edge(0x777777, 2.0),
        base_type::WATERWAY_RIVER => ResolvedStyle::line(0x4a90d9, 4.0),
        base_type::WATERWAY_STREAM => ResolvedStyle::line(0x6aa7e0, 2.0),
        base_type::WATERWAY_CANAL => ResolvedStyle::line(0x4a90d9, 3.0),
        base_type::BUILDING => ResolvedStyle::edge(0xa08c7a, 1.0),
        base_type::NATURAL_WOOD => ResolvedStyle::edge(0x4f8a3c, 1.0),
        base_type::NATURAL_WATER => ResolvedStyle::edge(0x4a90d9, 1.0),
        base_type::NATURAL_GRASS => ResolvedStyle::edge(0x7cb661, 1.0),
        base_type::LANDUSE => ResolvedStyle::edge(0xb5a67a, 1.0),
        base_type::BOUNDARY => ResolvedStyle::edge(0x9b59b6, 1.5).dashed(Dash { on: 8.0, off: 4.0 }),
        _ => DEFAULT_STYLE,
    }
}

/// Low-alpha area fill keyed by base type range
pub fn fill_color(feature: RenderFeature) -> Color {
    match feature.base_type() {
        base_type::NATURAL_WATER | 30..=39 => Color::hex(0x4a90d9).with_alpha(0.35),
        40..=49 => Color::hex(0xa08c7a).with_alpha(0.35),
        base_type::NATURAL_GRASS => Color::hex(0x7cb661).with_alpha(0.3),
        50..=59 => Color::hex(0x4f8a3c).with_alpha(0.3),
        60..=69 => Color::hex(0xb5a67a).with_alpha(0.25),
        _ => Color::hex(0x888888).with_alpha(0.2),
    }
}

/// Maps feature codes to paint styles
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleResolver;

impl StyleResolver {
    pub fn new() -> Self {
        Self
    }

    /// Never fails: unknown base types get the default style
    ///
    /// Modifiers apply in the order tunnel, bridge, intermittent,
    /// construction, so a later one overwrites the fields an earlier one set.
    pub fn resolve(&self, feature: RenderFeature) -> ResolvedStyle {
        let mut style = base_style(feature.base_type());

        if feature.has(flags::TUNNEL) {
            style.dash = Some(TUNNEL_DASH);
            style.color = style.color.darken(MODIFIER_AMOUNT);
        }
        if feature.has(flags::BRIDGE) {
            style.casing = Some(Casing { color: CASING_COLOR, width: CASING_WIDTH });
        }
        if feature.has(flags::INTERMITTENT) {
            style.dash = Some(INTERMITTENT_DASH);
        }
        if feature.has(flags::CONSTRUCTION) {
            style.dash = Some(CONSTRUCTION_DASH);
            style.color = style.color.lighten(MODIFIER_AMOUNT);
        }

        style
    }
}
