// SPDX-License-Identifier: LGPL-3.0-only

//! Thin wrapper around the SVG rasterization capability.
//!
//! The rest of the engine treats vector graphics as an opaque capability:
//! "render the named element into a target surface, or report its
//! bounds". This module is the only place that talks to `usvg`/`resvg`.

use std::path::Path;

use resvg::tiny_skia;
use resvg::usvg;
use thiserror::Error;

use crate::types::Bounds;

/// Errors from loading an SVG source file.
#[derive(Error, Debug)]
pub enum SvgError {
    /// The source file could not be read.
    #[error("Failed to read SVG file: {0}")]
    Io(#[from] std::io::Error),

    /// The source file is not a valid SVG document.
    #[error("Failed to parse SVG file: {0}")]
    Parse(#[from] usvg::Error),
}

/// One renderer instance bound to a parsed SVG document.
///
/// Instances are owned by the [`RendererPool`](crate::pool::RendererPool)
/// and handed to exactly one holder at a time.
pub struct SvgRenderer {
    tree: usvg::Tree,
}

impl SvgRenderer {
    /// Load and parse an SVG source file.
    pub fn from_file(path: &Path) -> Result<Self, SvgError> {
        let data = std::fs::read(path)?;
        let tree = usvg::Tree::from_data(&data, &usvg::Options::default())?;
        Ok(Self { tree })
    }

    /// Whether an element with the given id exists in the document.
    pub fn element_exists(&self, id: &str) -> bool {
        find_node(self.tree.root(), id).is_some()
    }

    /// Bounds of the named element in the document's coordinate system.
    ///
    /// Returns the empty sentinel when the element does not exist.
    pub fn bounds_on_element(&self, id: &str) -> Bounds {
        match find_node(self.tree.root(), id) {
            Some(node) => {
                let rect = node.abs_bounding_box();
                Bounds::new(
                    rect.x() as f64,
                    rect.y() as f64,
                    rect.width() as f64,
                    rect.height() as f64,
                )
            }
            None => Bounds::default(),
        }
    }

    /// Rasterize the named element into the pixmap, scaled to fill it.
    ///
    /// A missing element is a no-op: the pixmap stays fully transparent.
    pub fn render_element(&self, id: &str, pixmap: &mut tiny_skia::PixmapMut<'_>) {
        let Some(node) = find_node(self.tree.root(), id) else {
            return;
        };
        // A node can lack a layer bounding box (nothing drawable in it);
        // treat that like a missing element.
        let Some(bbox) = node.abs_layer_bounding_box() else {
            return;
        };
        let sx = pixmap.width() as f32 / bbox.width();
        let sy = pixmap.height() as f32 / bbox.height();
        resvg::render_node(node, tiny_skia::Transform::from_scale(sx, sy), pixmap);
    }
}

fn node_id(node: &usvg::Node) -> &str {
    match node {
        usvg::Node::Group(g) => g.id(),
        usvg::Node::Path(p) => p.id(),
        usvg::Node::Image(i) => i.id(),
        usvg::Node::Text(t) => t.id(),
    }
}

fn find_node<'a>(group: &'a usvg::Group, id: &str) -> Option<&'a usvg::Node> {
    for node in group.children() {
        if node_id(node) == id {
            return Some(node);
        }
        if let usvg::Node::Group(g) = node {
            if let Some(found) = find_node(g, id) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const TEST_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <rect id="player" x="10" y="20" width="40" height="30" fill="#c80000"/>
  <circle id="coin_0" cx="70" cy="70" r="10" fill="#ffd700"/>
  <circle id="coin_1" cx="70" cy="70" r="8" fill="#ffd700"/>
</svg>"##;

    fn renderer() -> SvgRenderer {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.svg");
        std::fs::write(&path, TEST_SVG).unwrap();
        SvgRenderer::from_file(&path).unwrap()
    }

    #[test]
    fn test_element_exists() {
        let r = renderer();
        assert!(r.element_exists("player"));
        assert!(r.element_exists("coin_1"));
        assert!(!r.element_exists("coin_2"));
        assert!(!r.element_exists("missing"));
    }

    #[test]
    fn test_bounds_on_element() {
        let r = renderer();
        let bounds = r.bounds_on_element("player");
        assert_eq!(bounds, Bounds::new(10.0, 20.0, 40.0, 30.0));
        assert!(r.bounds_on_element("missing").is_empty());
    }

    #[test]
    fn test_render_element_fills_pixels() {
        let r = renderer();
        let mut pixmap = tiny_skia::Pixmap::new(16, 16).unwrap();
        r.render_element("player", &mut pixmap.as_mut());
        assert!(pixmap.pixels().iter().any(|p| p.alpha() > 0));
    }

    #[test]
    fn test_render_missing_element_is_noop() {
        let r = renderer();
        let mut pixmap = tiny_skia::Pixmap::new(16, 16).unwrap();
        r.render_element("missing", &mut pixmap.as_mut());
        assert!(pixmap.pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.svg");
        std::fs::write(&path, "this is not svg").unwrap();
        assert!(SvgRenderer::from_file(&path).is_err());
        assert!(SvgRenderer::from_file(&dir.path().join("absent.svg")).is_err());
    }
}
