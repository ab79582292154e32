//! Theme descriptors.
//!
//! A theme is a named configuration pointing at one vector (SVG) source
//! file. Themes can be constructed directly or loaded from a TOML
//! descriptor that carries optional display metadata next to the source
//! path.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ThemeError, ThemeResult};

/// A named sprite theme backed by a single SVG source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    name: String,
    svg_path: PathBuf,
    description: Option<String>,
    author: Option<String>,
}

/// On-disk TOML descriptor layout.
#[derive(Deserialize)]
struct ThemeFile {
    name: Option<String>,
    svg: PathBuf,
    description: Option<String>,
    author: Option<String>,
}

impl Theme {
    /// Create a theme pointing directly at an SVG file.
    pub fn new(name: impl Into<String>, svg_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            svg_path: svg_path.into(),
            description: None,
            author: None,
        }
    }

    /// Load a theme from a TOML descriptor file.
    ///
    /// Relative `svg` paths are resolved against the descriptor's parent
    /// directory. The theme name defaults to the descriptor's file stem
    /// when the descriptor does not set one.
    pub fn load(path: impl AsRef<Path>) -> ThemeResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ThemeError::file_not_found(path));
        }
        let raw = std::fs::read_to_string(path)?;
        let file: ThemeFile =
            toml::from_str(&raw).map_err(|e| ThemeError::parse_error(path, e.to_string()))?;

        let name = file
            .name
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let svg_path = if file.svg.is_relative() {
            path.parent().unwrap_or_else(|| Path::new(".")).join(file.svg)
        } else {
            file.svg
        };
        if !svg_path.is_file() {
            return Err(ThemeError::missing_source(name, svg_path));
        }
        log::debug!("loaded theme descriptor '{}' from {:?}", name, path);

        Ok(Self {
            name,
            svg_path,
            description: file.description,
            author: file.author,
        })
    }

    /// The theme's name. Also namespaces the persistent sprite cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path to the theme's SVG source file.
    pub fn svg_path(&self) -> &Path {
        &self.svg_path
    }

    /// Optional human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Optional author name.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
}
