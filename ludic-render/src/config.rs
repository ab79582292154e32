// SPDX-License-Identifier: LGPL-3.0-only

//! Engine configuration.

use std::path::PathBuf;

use bitflags::bitflags;

bitflags! {
    /// Optimization strategies the engine may use.
    ///
    /// All strategies are enabled by default. Disabling them is mainly
    /// useful for debugging and benchmarking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Strategies: u32 {
        /// Gate reads and writes of the persistent on-disk cache tier.
        /// Toggling this strategy reloads the active theme.
        const USE_DISK_CACHE = 1 << 0;
        /// Dispatch asynchronous render jobs to worker threads instead
        /// of executing them inline on the calling thread.
        const USE_RENDERING_THREADS = 1 << 1;
    }
}

/// The frame suffix pattern used when none (or an invalid one) is given.
pub(crate) const DEFAULT_FRAME_SUFFIX: &str = "_{}";

/// Normalize a frame suffix pattern: it must contain the `{}` placeholder
/// for the frame number, otherwise the default pattern is used.
pub(crate) fn normalize_frame_suffix(suffix: &str) -> String {
    if suffix.contains("{}") {
        suffix.to_string()
    } else {
        DEFAULT_FRAME_SUFFIX.to_string()
    }
}

/// Configuration for a [`RenderEngine`](crate::engine::RenderEngine).
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Name of the theme loaded when none is set explicitly, and the
    /// fallback when a requested theme fails to load.
    pub default_theme: String,
    /// Persistent cache budget in MiB. `0` selects the 3 MiB default.
    pub cache_size_mib: u32,
    /// First frame index of animated sprites.
    pub frame_base_index: i32,
    /// Pattern appended to sprite keys to form per-frame element keys.
    /// Must contain a `{}` placeholder for the frame number.
    pub frame_suffix: String,
    /// Number of render worker threads. `0` selects the number of
    /// available CPUs.
    pub worker_threads: usize,
    /// Root directory for the persistent cache. When [`None`], the XDG
    /// cache home is used.
    pub cache_dir: Option<PathBuf>,
    /// Enabled optimization strategies.
    pub strategies: Strategies,
}

impl RenderConfig {
    /// Create a configuration with the given default theme name.
    pub fn new(default_theme: impl Into<String>) -> Self {
        Self {
            default_theme: default_theme.into(),
            ..Self::default()
        }
    }

    /// The persistent cache budget in bytes.
    pub fn cache_size_bytes(&self) -> u64 {
        let mib = if self.cache_size_mib == 0 {
            3
        } else {
            self.cache_size_mib
        };
        (mib as u64) << 20
    }

    /// Resolve the persistent cache root directory.
    pub(crate) fn resolve_cache_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        match xdg::BaseDirectories::with_prefix("ludic") {
            Ok(base) => Some(base.get_cache_home().join("sprites")),
            Err(e) => {
                log::warn!("no XDG cache home available, disk cache disabled: {e}");
                None
            }
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_theme: String::from("default"),
            cache_size_mib: 0,
            frame_base_index: 0,
            frame_suffix: String::from(DEFAULT_FRAME_SUFFIX),
            worker_threads: 0,
            cache_dir: None,
            strategies: Strategies::all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_size_default() {
        let config = RenderConfig::default();
        assert_eq!(config.cache_size_bytes(), 3 << 20);

        let config = RenderConfig {
            cache_size_mib: 8,
            ..RenderConfig::default()
        };
        assert_eq!(config.cache_size_bytes(), 8 << 20);
    }

    #[test]
    fn test_frame_suffix_normalization() {
        assert_eq!(normalize_frame_suffix("-frame{}"), "-frame{}");
        assert_eq!(normalize_frame_suffix("no-placeholder"), "_{}");
    }
}
