#![warn(missing_docs)]

//! Theme descriptors and resolution for the ludic sprite renderer.
//!
//! A theme names a single SVG source file that all sprites of a game are
//! drawn from. This crate provides the [`Theme`] descriptor, the
//! [`ThemeProvider`] trait used by the rendering engine to look themes up
//! by name, and ready-made providers for directory-based and bundled
//! theme sets.

pub mod error;
pub mod provider;
pub mod theme;

pub use error::{ThemeError, ThemeResult};
pub use provider::{DirectoryProvider, StaticProvider, ThemeProvider};
pub use theme::Theme;
