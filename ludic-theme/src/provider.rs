//! Theme providers: resolving a theme name to a [`Theme`].

use std::path::PathBuf;

use crate::error::{ThemeError, ThemeResult};
use crate::theme::Theme;

/// Resolves theme names to concrete [`Theme`]s.
///
/// The rendering engine holds a provider and asks it for a theme whenever
/// the active theme changes. Providers only resolve descriptors; whether
/// the SVG source actually parses is checked by the renderer itself.
pub trait ThemeProvider {
    /// Resolve `name` to a theme, or report why it is unavailable.
    fn resolve(&self, name: &str) -> ThemeResult<Theme>;
}

/// Resolves themes from a single directory.
///
/// For a theme `name`, `<root>/<name>.toml` is tried first (a descriptor
/// with metadata), then the bare `<root>/<name>.svg`.
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Create a provider rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List the names of all resolvable themes in the directory.
    pub fn available_themes(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return names;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some("toml") | Some("svg")) {
                if let Some(stem) = path.file_stem() {
                    let name = stem.to_string_lossy().into_owned();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        names
    }
}

impl ThemeProvider for DirectoryProvider {
    fn resolve(&self, name: &str) -> ThemeResult<Theme> {
        let descriptor = self.root.join(format!("{name}.toml"));
        if descriptor.is_file() {
            return Theme::load(descriptor);
        }
        let svg = self.root.join(format!("{name}.svg"));
        if svg.is_file() {
            return Ok(Theme::new(name, svg));
        }
        Err(ThemeError::not_found(name))
    }
}

/// A provider over a fixed set of themes, resolved by name.
///
/// Useful for applications that bundle their themes and for tests.
pub struct StaticProvider {
    themes: Vec<Theme>,
}

impl StaticProvider {
    /// Create a provider over the given themes.
    pub fn new(themes: Vec<Theme>) -> Self {
        Self { themes }
    }
}

impl ThemeProvider for StaticProvider {
    fn resolve(&self, name: &str) -> ThemeResult<Theme> {
        self.themes
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .ok_or_else(|| ThemeError::not_found(name))
    }
}
