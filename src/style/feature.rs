//! Packed 16-bit render feature codes
//!
//! Low byte is the base type, high byte a set of independent modifier flags.

use serde::{Deserialize, Serialize};

/// Base type codes (low byte)
pub mod base_type {
    pub const DEFAULT: u8 = 0;

    // Roads 1-19
    pub const HIGHWAY_MAJOR: u8 = 1;
    pub const HIGHWAY_MINOR: u8 = 2;
    pub const HIGHWAY_ROAD: u8 = 3;
    pub const HIGHWAY_PATH: u8 = 4;
    pub const HIGHWAY_STEPS: u8 = 5;

    // Rail 20-29
    pub const RAILWAY_MAIN: u8 = 20;
    pub const RAILWAY_LIGHT: u8 = 21;

    // Waterways 30-39
    pub const WATERWAY_RIVER: u8 = 30;
    pub const WATERWAY_STREAM: u8 = 31;
    pub const WATERWAY_CANAL: u8 = 32;

    // Buildings 40-49
    pub const BUILDING: u8 = 40;

    // Natural and landuse 50-69
    pub const NATURAL_WOOD: u8 = 50;
    pub const NATURAL_WATER: u8 = 51;
    pub const NATURAL_GRASS: u8 = 52;
    pub const LANDUSE: u8 = 60;

    // Boundaries 70-79
    pub const BOUNDARY: u8 = 70;
}

/// Modifier flags (high byte)
pub mod flags {
    pub const BRIDGE: u16 = 0x0100;
    pub const TUNNEL: u16 = 0x0200;
    pub const INTERMITTENT: u16 = 0x0400;
    pub const CONSTRUCTION: u16 = 0x0800;
    pub const ONEWAY: u16 = 0x1000;
}

/// Layer value when the source data carries none
pub const DEFAULT_LAYER: i8 = 0;

/// Packed base type + flags describing how a way or area is painted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderFeature(pub u16);

impl RenderFeature {
    pub const fn new(base: u8, flags: u16) -> Self {
        Self(base as u16 | (flags & 0xFF00))
    }

    #[inline]
    pub const fn base_type(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    #[inline]
    pub const fn flags(self) -> u16 {
        self.0 & 0xFF00
    }

    #[inline]
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub const fn with(self, flag: u16) -> Self {
        Self(self.0 | (flag & 0xFF00))
    }

    /// Draw order key: lower values are painted first
    ///
    /// Each layer step spans 100 units. Within a layer tunnels sink below
    /// everything, water sits under landuse, landuse under buildings,
    /// buildings under roads and rail, and bridges float on top.
    pub fn z_order(self, layer: i8) -> i16 {
        let layer_z = layer as i16 * 100;

        let type_z: i16 = match self.base_type() {
            base_type::WATERWAY_RIVER | base_type::WATERWAY_STREAM | base_type::WATERWAY_CANAL => -30,
            base_type::NATURAL_WATER => -35,
            base_type::LANDUSE | base_type::NATURAL_GRASS => -20,
            base_type::NATURAL_WOOD => -15,
            base_type::BUILDING => -10,
            base_type::HIGHWAY_PATH | base_type::HIGHWAY_STEPS => 0,
            base_type::HIGHWAY_ROAD => 5,
            base_type::HIGHWAY_MINOR => 10,
            base_type::HIGHWAY_MAJOR => 15,
            base_type::RAILWAY_MAIN | base_type::RAILWAY_LIGHT => 20,
            base_type::BOUNDARY => 50,
            _ => 0,
        };

        let flag_z: i16 = if self.has(flags::TUNNEL) {
            -40
        } else if self.has(flags::BRIDGE) {
            40
        } else {
            0
        };

        layer_z + type_z + flag_z
    }
}

impl From<u16> for RenderFeature {
    fn from(code: u16) -> Self {
        Self(code)
    }
}
