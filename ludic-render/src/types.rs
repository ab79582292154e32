// SPDX-License-Identifier: LGPL-3.0-only

//! Core value types of the sprite engine: colors, bounds and request
//! descriptors.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};
use nalgebra::Vector2;

/// Frame sentinel for non-animated sprite requests.
pub const NO_FRAME: i32 = -1;

/// An 8-bit RGBA color used in color-substitution maps and cache keys.
///
/// Ordered and hashable so substitution maps serialize into cache keys in
/// a stable, reproducible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl SpriteColor {
    /// An opaque color from RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// A color from RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The color packed as `0xRRGGBBAA`, used in cache keys.
    pub const fn as_u32(&self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }
}

/// A color-substitution mapping from source colors to replacements.
///
/// Substitution matches pixels by RGB only: the source color's alpha
/// channel is ignored, and every remapped pixel keeps its own alpha (so
/// antialiased edges stay intact).
///
/// Semantically unordered; the `BTreeMap` ordering only pins down the
/// cache-key serialization.
pub type ColorMap = BTreeMap<SpriteColor, SpriteColor>;

/// Axis-aligned bounds of a sprite element in the SVG coordinate system.
///
/// The default (all-zero) value doubles as the "element not found"
/// sentinel; sprite queries never fail with an error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Encode, Decode)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Bounds {
    /// Create bounds from position and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether these bounds cover no area (the sentinel state).
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An immutable sprite request descriptor: which element, at which frame,
/// rendered at which pixel size, with which color substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    /// The sprite key, without any frame suffix.
    pub sprite_key: String,
    /// The frame index, or [`NO_FRAME`] for non-animated sprites.
    pub frame: i32,
    /// Target size in pixels.
    pub size: Vector2<u32>,
    /// Color substitutions applied to the rendered pixels.
    pub custom_colors: ColorMap,
}

impl ClientSpec {
    /// Create a spec for a plain, uncolored sprite request.
    pub fn new(sprite_key: impl Into<String>, frame: i32, size: Vector2<u32>) -> Self {
        Self {
            sprite_key: sprite_key.into(),
            frame,
            size,
            custom_colors: ColorMap::new(),
        }
    }

    /// Whether the requested size covers no pixels.
    pub fn is_empty_size(&self) -> bool {
        self.size.x == 0 || self.size.y == 0
    }
}
