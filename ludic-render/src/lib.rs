// SPDX-License-Identifier: LGPL-3.0-only

#![warn(missing_docs)]

//! # Ludic Sprite Rendering
//!
//! Renders named elements of themed SVG files into pixmaps of arbitrary
//! size, with aggressive caching so games can redraw and rescale sprites
//! without paying the rasterization cost more than once.
//!
//! ## Overview
//!
//! - **[RenderEngine](engine::RenderEngine)**: owns the caches, the
//!   worker threads and the active theme.
//! - **[SpriteClient](client::SpriteClient)**: one on-screen use of one
//!   sprite, re-rendered automatically on theme change.
//! - **[Theme](ludic_theme::Theme)** / **[ThemeProvider](ludic_theme::ThemeProvider)**:
//!   where sprites come from (one SVG file per theme).
//!
//! Rendered pixmaps pass through three tiers: an in-process cache, a
//! persistent per-theme disk cache, and finally a render job on a worker
//! thread. Synchronous one-shot queries are available through
//! [`RenderEngine::sprite_pixmap`](engine::RenderEngine::sprite_pixmap);
//! everything else is delivered asynchronously when the application calls
//! [`RenderEngine::pump`](engine::RenderEngine::pump).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ludic_render::{RenderConfig, RenderEngine, SpriteClient};
//! use ludic_theme::DirectoryProvider;
//! use nalgebra::Vector2;
//!
//! let provider = DirectoryProvider::new("assets/themes");
//! let engine = RenderEngine::new(Box::new(provider), RenderConfig::new("default"));
//!
//! let player = SpriteClient::new(&engine, "player");
//! player.on_pixmap(|_pixmap| {
//!     // blit the new pixmap
//! });
//! player.set_render_size(Vector2::new(64, 64));
//!
//! // once per frame:
//! engine.pump();
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod pixmap;
pub mod pool;
pub mod svg;
pub mod types;

mod worker;

pub use client::SpriteClient;
pub use config::{RenderConfig, Strategies};
pub use engine::RenderEngine;
pub use pixmap::SpritePixmap;
pub use types::{Bounds, ClientSpec, ColorMap, SpriteColor, NO_FRAME};
