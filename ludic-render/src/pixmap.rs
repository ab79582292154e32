// SPDX-License-Identifier: LGPL-3.0-only

//! The delivered pixmap type.
//!
//! Render jobs produce premultiplied `tiny_skia::Pixmap`s; what clients
//! receive (and what the in-process pixmap cache stores) is the
//! display-format conversion: a straight-alpha [`image::RgbaImage`]
//! behind an [`Arc`], cheap to clone and hand out to many subscribers.

use std::sync::Arc;

use image::RgbaImage;
use resvg::tiny_skia;

/// A rendered sprite in display format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpritePixmap {
    image: Arc<RgbaImage>,
}

impl SpritePixmap {
    /// The empty (0×0) pixmap sentinel.
    pub fn empty() -> Self {
        Self {
            image: Arc::new(RgbaImage::new(0, 0)),
        }
    }

    /// Convert a raw premultiplied render result to display format.
    pub fn from_raw(raw: &tiny_skia::Pixmap) -> Self {
        let mut data = Vec::with_capacity(raw.pixels().len() * 4);
        for pixel in raw.pixels() {
            let c = pixel.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let image = RgbaImage::from_raw(raw.width(), raw.height(), data)
            .unwrap_or_else(|| RgbaImage::new(0, 0));
        Self {
            image: Arc::new(image),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether this is the empty sentinel (or otherwise has no pixels).
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Whether any pixel is not fully transparent.
    pub fn has_content(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] > 0)
    }

    /// The underlying straight-alpha RGBA image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sentinel() {
        let empty = SpritePixmap::empty();
        assert!(empty.is_empty());
        assert!(!empty.has_content());
        assert_eq!(empty, SpritePixmap::empty());
    }

    #[test]
    fn test_from_raw_demultiplies() {
        let mut raw = tiny_skia::Pixmap::new(2, 1).unwrap();
        // Half-transparent pure red, premultiplied.
        raw.pixels_mut()[0] =
            tiny_skia::ColorU8::from_rgba(255, 0, 0, 128).premultiply();

        let pixmap = SpritePixmap::from_raw(&raw);
        assert_eq!(pixmap.width(), 2);
        assert!(pixmap.has_content());
        let p = pixmap.image().get_pixel(0, 0);
        assert_eq!(p.0[3], 128);
        assert!(p.0[0] > 250);
        let q = pixmap.image().get_pixel(1, 0);
        assert_eq!(q.0, [0, 0, 0, 0]);
    }
}
