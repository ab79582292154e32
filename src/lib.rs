#![warn(missing_docs)]

//! Themeable SVG sprite rendering and caching for Rust games.

pub use nalgebra as math;

pub use ludic_render as render;
pub use ludic_theme as theme;

/// A "prelude" for users of the ludic sprite engine.
///
/// Importing this module brings into scope the most common types
/// needed to render themed sprites.
///
/// ```rust
/// use ludic::prelude::*;
/// ```
pub mod prelude {
    pub use crate::render::{
        Bounds, ClientSpec, ColorMap, RenderConfig, RenderEngine, SpriteClient, SpriteColor,
        SpritePixmap, Strategies, NO_FRAME,
    };
    pub use crate::theme::{DirectoryProvider, StaticProvider, Theme, ThemeProvider};

    // Math
    pub use nalgebra::Vector2;
}
