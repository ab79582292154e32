// SPDX-License-Identifier: LGPL-3.0-only

//! The client-side handle for asynchronously rendered sprites.
//!
//! A [`SpriteClient`] represents one on-screen use of one sprite. It
//! records what it wants (sprite key, frame, size, color substitutions)
//! with the engine; every setter re-requests the pixmap, and a fresh
//! pixmap arrives through the registered callback once rendered. Clients
//! hold the engine weakly, so dropping the engine simply detaches them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use nalgebra::Vector2;

use crate::engine::{dispatch, ClientEntry, ClientId, EngineInner, RenderEngine};
use crate::pixmap::SpritePixmap;
use crate::types::{ClientSpec, ColorMap, NO_FRAME};

/// A registered consumer of one sprite, rendered asynchronously.
pub struct SpriteClient {
    inner: Weak<RefCell<EngineInner>>,
    id: ClientId,
}

impl SpriteClient {
    /// Register a new client for the given sprite key.
    ///
    /// The render size starts out empty, so the first delivery is the
    /// empty pixmap; call [`set_render_size`](Self::set_render_size) to
    /// request actual content.
    pub fn new(engine: &RenderEngine, sprite_key: impl Into<String>) -> Self {
        let rc = engine.inner();
        let spec = ClientSpec::new(sprite_key, NO_FRAME, Vector2::new(0, 0));
        let id = {
            let mut inner = rc.borrow_mut();
            let id = inner.register_client(spec.clone());
            inner.request_pixmap(&spec, Some(id));
            id
        };
        dispatch(rc);
        Self {
            inner: Rc::downgrade(rc),
            id,
        }
    }

    /// Register the callback that receives every delivered pixmap.
    ///
    /// Replaces any previously registered callback. Invoked from
    /// [`RenderEngine::pump`] (or any engine call that resolves a request
    /// immediately), never from a worker thread.
    pub fn on_pixmap(&self, callback: impl FnMut(&SpritePixmap) + 'static) {
        let Some(rc) = self.inner.upgrade() else {
            return;
        };
        let mut inner = rc.borrow_mut();
        if let Some(entry) = inner.clients.get_mut(&self.id) {
            entry.callback = Some(Box::new(callback));
        }
    }

    /// The most recently delivered pixmap, if any.
    pub fn pixmap(&self) -> Option<SpritePixmap> {
        self.read(|entry| entry.pixmap.clone()).flatten()
    }

    /// The sprite key this client renders.
    pub fn sprite_key(&self) -> String {
        self.read(|entry| entry.spec.sprite_key.clone())
            .unwrap_or_default()
    }

    /// Switch this client to another sprite.
    pub fn set_sprite_key(&self, sprite_key: impl Into<String>) {
        let sprite_key = sprite_key.into();
        self.update(move |spec| spec.sprite_key = sprite_key);
    }

    /// The current frame index.
    pub fn frame(&self) -> i32 {
        self.read(|entry| entry.spec.frame).unwrap_or(NO_FRAME)
    }

    /// Request another frame of an animated sprite. Frame numbers outside
    /// the sprite's frame range wrap around.
    pub fn set_frame(&self, frame: i32) {
        self.update(move |spec| spec.frame = frame);
    }

    /// Number of frames of this client's sprite; see
    /// [`RenderEngine::frame_count`].
    pub fn frame_count(&self) -> i32 {
        let Some(rc) = self.inner.upgrade() else {
            return -1;
        };
        let key = self.sprite_key();
        let count = rc.borrow_mut().frame_count(&key);
        dispatch(&rc);
        count
    }

    /// The requested render size in pixels.
    pub fn render_size(&self) -> Vector2<u32> {
        self.read(|entry| entry.spec.size)
            .unwrap_or_else(|| Vector2::new(0, 0))
    }

    /// Request the sprite at another pixel size. A result for a
    /// previously requested size that has not been delivered yet is
    /// silently discarded.
    pub fn set_render_size(&self, size: Vector2<u32>) {
        self.update(move |spec| spec.size = size);
    }

    /// The active color substitutions.
    pub fn custom_colors(&self) -> ColorMap {
        self.read(|entry| entry.spec.custom_colors.clone())
            .unwrap_or_default()
    }

    /// Replace the color substitutions applied to the rendered sprite.
    pub fn set_custom_colors(&self, custom_colors: ColorMap) {
        self.update(move |spec| spec.custom_colors = custom_colors);
    }

    fn read<T>(&self, f: impl FnOnce(&ClientEntry) -> T) -> Option<T> {
        let rc = self.inner.upgrade()?;
        let inner = rc.borrow();
        inner.clients.get(&self.id).map(f)
    }

    /// Apply a spec change and re-request the pixmap. The request path
    /// de-duplicates, so a no-op change requests nothing.
    fn update(&self, f: impl FnOnce(&mut ClientSpec)) {
        let Some(rc) = self.inner.upgrade() else {
            return;
        };
        {
            let mut inner = rc.borrow_mut();
            let Some(entry) = inner.clients.get_mut(&self.id) else {
                return;
            };
            f(&mut entry.spec);
            let spec = entry.spec.clone();
            inner.request_pixmap(&spec, Some(self.id));
        }
        dispatch(&rc);
    }
}

impl Drop for SpriteClient {
    fn drop(&mut self) {
        if let Some(rc) = self.inner.upgrade() {
            rc.borrow_mut().unregister_client(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::types::SpriteColor;
    use ludic_theme::DirectoryProvider;
    use std::time::Duration;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <rect id="player" x="10" y="20" width="40" height="30" fill="#c80000"/>
  <circle id="coin_0" cx="70" cy="70" r="12" fill="#ffd700"/>
  <circle id="coin_1" cx="70" cy="70" r="10" fill="#ffd700"/>
</svg>"##;

    fn engine() -> (tempfile::TempDir, RenderEngine) {
        let dir = tempfile::tempdir().unwrap();
        let themes = dir.path().join("themes");
        std::fs::create_dir_all(&themes).unwrap();
        std::fs::write(themes.join("default.svg"), SVG).unwrap();
        let config = RenderConfig {
            cache_dir: Some(dir.path().join("cache")),
            worker_threads: 1,
            ..RenderConfig::new("default")
        };
        let engine = RenderEngine::new(Box::new(DirectoryProvider::new(themes)), config);
        (dir, engine)
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_spec_accessors() {
        let (_dir, engine) = engine();
        let client = SpriteClient::new(&engine, "coin");
        assert_eq!(client.sprite_key(), "coin");
        assert_eq!(client.frame(), NO_FRAME);
        assert_eq!(client.render_size(), Vector2::new(0, 0));
        assert!(client.custom_colors().is_empty());
        assert_eq!(client.frame_count(), 2);

        client.set_frame(1);
        client.set_render_size(Vector2::new(24, 24));
        let mut colors = ColorMap::new();
        colors.insert(SpriteColor::rgb(255, 215, 0), SpriteColor::rgb(0, 0, 255));
        client.set_custom_colors(colors.clone());
        assert_eq!(client.frame(), 1);
        assert_eq!(client.render_size(), Vector2::new(24, 24));
        assert_eq!(client.custom_colors(), colors);
    }

    #[test]
    fn test_delivery_after_pump() {
        let (_dir, engine) = engine();
        let client = SpriteClient::new(&engine, "player");
        // The initial (empty-size) request resolves without rendering.
        assert!(client.pixmap().unwrap().is_empty());

        client.set_render_size(Vector2::new(20, 20));
        assert!(engine.pump_until_idle(TIMEOUT));
        let pixmap = client.pixmap().unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (20, 20));
        assert!(pixmap.has_content());
    }

    #[test]
    fn test_switching_sprite_key_refetches() {
        let (_dir, engine) = engine();
        let client = SpriteClient::new(&engine, "player");
        client.set_render_size(Vector2::new(16, 16));
        assert!(engine.pump_until_idle(TIMEOUT));
        let player = client.pixmap().unwrap();

        client.set_sprite_key("coin");
        assert!(engine.pump_until_idle(TIMEOUT));
        let coin = client.pixmap().unwrap();
        assert_ne!(player, coin);
    }

    #[test]
    fn test_drop_deregisters() {
        let (_dir, engine) = engine();
        let client = SpriteClient::new(&engine, "player");
        client.set_render_size(Vector2::new(8, 8));
        drop(client);
        // The in-flight result finds no requester; nothing panics and
        // the engine settles.
        assert!(engine.pump_until_idle(TIMEOUT));
    }

    #[test]
    fn test_detached_client_is_inert() {
        let (_dir, engine) = engine();
        let client = SpriteClient::new(&engine, "player");
        drop(engine);
        client.set_render_size(Vector2::new(8, 8));
        assert_eq!(client.sprite_key(), "");
        assert_eq!(client.frame_count(), -1);
        assert!(client.pixmap().is_none());
    }
}
