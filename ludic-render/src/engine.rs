// SPDX-License-Identifier: LGPL-3.0-only

//! The rendering engine: theme handling, three-tier sprite lookup and
//! job dispatch.
//!
//! Lookup order for a sprite pixmap is always: in-process cache, then the
//! persistent disk cache (when enabled), then a render job. Render jobs
//! run inline for synchronous requests and on the worker pool otherwise;
//! finished jobs are committed to both cache tiers on the control thread
//! and fanned out to every client waiting on the same cache key.
//!
//! The engine handle is deliberately `!Send`: the thread that creates it
//! is the control thread, and it is the only mutator of caches, the
//! client registry and the pending-request set.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::Vector2;

use ludic_theme::{Theme, ThemeProvider};

use crate::cache::DiskCache;
use crate::config::{normalize_frame_suffix, RenderConfig, Strategies};
use crate::pixmap::SpritePixmap;
use crate::pool::RendererPool;
use crate::svg::SvgRenderer;
use crate::types::{Bounds, ClientSpec, ColorMap};
use crate::worker::{render_job, Job, JobResult, WorkerPool};

/// Identity of a registered client within one engine.
pub(crate) type ClientId = u64;

/// How long a theme switch waits for in-flight render jobs.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) struct ClientEntry {
    /// Cache key of the most recently delivered or pending pixmap.
    /// Empty when no request has been recorded yet.
    pub cache_key: String,
    pub spec: ClientSpec,
    pub callback: Option<Box<dyn FnMut(&SpritePixmap)>>,
    pub pixmap: Option<SpritePixmap>,
}

enum ThemeState {
    None,
    Loading,
    Active(Theme),
}

enum Notification {
    Pixmap(ClientId, SpritePixmap),
    ThemeChanged(String),
}

pub(crate) struct EngineInner {
    provider: Box<dyn ThemeProvider>,
    default_theme: String,
    frame_suffix: String,
    frame_base_index: i32,
    strategies: Strategies,
    cache_size_bytes: u64,
    cache_root: Option<PathBuf>,

    theme_state: ThemeState,
    pool: Arc<RendererPool>,
    workers: WorkerPool,
    render_count: Arc<AtomicUsize>,
    disk_cache: Option<DiskCache>,

    pixmap_cache: HashMap<String, SpritePixmap>,
    frame_count_cache: HashMap<String, i32>,
    bounds_cache: HashMap<String, Bounds>,

    pub(crate) clients: HashMap<ClientId, ClientEntry>,
    next_client_id: ClientId,
    pending_requests: HashSet<String>,

    notifications: Vec<Notification>,
    theme_callbacks: Vec<Box<dyn FnMut(&str)>>,
}

impl EngineInner {
    fn new(provider: Box<dyn ThemeProvider>, config: RenderConfig) -> Self {
        let render_count = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(RendererPool::new());
        let workers = WorkerPool::new(config.worker_threads, pool.clone(), render_count.clone());
        Self {
            default_theme: config.default_theme.clone(),
            frame_suffix: normalize_frame_suffix(&config.frame_suffix),
            frame_base_index: config.frame_base_index,
            strategies: config.strategies,
            cache_size_bytes: config.cache_size_bytes(),
            cache_root: config.resolve_cache_dir(),
            provider,
            theme_state: ThemeState::None,
            pool,
            workers,
            render_count,
            disk_cache: None,
            pixmap_cache: HashMap::new(),
            frame_count_cache: HashMap::new(),
            bounds_cache: HashMap::new(),
            clients: HashMap::new(),
            next_client_id: 0,
            pending_requests: HashSet::new(),
            notifications: Vec::new(),
            theme_callbacks: Vec::new(),
        }
    }

    fn theme_name(&self) -> &str {
        match &self.theme_state {
            ThemeState::Active(theme) => theme.name(),
            _ => "",
        }
    }

    fn use_disk_cache(&self) -> bool {
        self.strategies.contains(Strategies::USE_DISK_CACHE)
    }

    // -- theme handling ---------------------------------------------------

    pub(crate) fn set_theme(&mut self, name: &str) {
        let old_theme = self.theme_name().to_string();
        if old_theme == name {
            return;
        }
        log::debug!("setting theme: {name}");
        if !self.load_theme(name) && name != self.default_theme {
            log::debug!("falling back to default theme: {}", self.default_theme);
            let default = self.default_theme.clone();
            self.load_theme(&default);
        }
        // Still themeless after the fallback: every query degrades to its
        // sentinel. Refetching clients here would loop back into another
        // theme load per request.
        if !matches!(self.theme_state, ThemeState::Active(_)) {
            return;
        }
        // Every registered client holds an outdated pixmap now.
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            let spec = match self.clients.get_mut(&id) {
                Some(entry) => {
                    entry.cache_key.clear();
                    entry.spec.clone()
                }
                None => continue,
            };
            self.request_pixmap(&spec, Some(id));
        }
        if self.theme_name() != old_theme {
            let name = self.theme_name().to_string();
            self.notifications.push(Notification::ThemeChanged(name));
        }
    }

    /// Load and validate one theme. Returns false when the theme cannot
    /// be resolved or its SVG source does not parse; the engine is left
    /// themeless in that case.
    fn load_theme(&mut self, name: &str) -> bool {
        self.theme_state = ThemeState::Loading;
        let theme = match self.provider.resolve(name) {
            Ok(theme) => theme,
            Err(e) => {
                log::warn!("theme '{name}' unavailable: {e}");
                self.theme_state = ThemeState::None;
                return false;
            }
        };
        let seed = match SvgRenderer::from_file(theme.svg_path()) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::warn!("theme '{name}' has an invalid SVG source: {e}");
                self.theme_state = ThemeState::None;
                return false;
            }
        };
        // Let in-flight jobs of the previous theme finish before the
        // pool is rebound; their results stay committed for reuse.
        self.drain_pending_jobs();
        self.pixmap_cache.clear();
        self.frame_count_cache.clear();
        self.bounds_cache.clear();
        self.pool
            .set_source(Some(theme.svg_path().to_path_buf()), Some(seed));
        self.disk_cache = if self.use_disk_cache() {
            self.open_disk_cache(theme.name())
        } else {
            None
        };
        self.theme_state = ThemeState::Active(theme);
        true
    }

    /// The persistent cache is namespaced by theme: entries of other
    /// themes become unreachable, not deleted.
    fn open_disk_cache(&self, theme_name: &str) -> Option<DiskCache> {
        let root = self.cache_root.as_ref()?.join(theme_name);
        match DiskCache::open(&root, self.cache_size_bytes) {
            Ok(cache) => Some(cache),
            Err(e) => {
                log::warn!("cannot open disk cache at {root:?}: {e}");
                None
            }
        }
    }

    /// Lazily load the default theme. Returns whether a theme is active.
    fn ensure_theme(&mut self) -> bool {
        if matches!(self.theme_state, ThemeState::Active(_)) {
            return true;
        }
        let default = self.default_theme.clone();
        self.set_theme(&default);
        matches!(self.theme_state, ThemeState::Active(_))
    }

    pub(crate) fn set_strategy_enabled(&mut self, strategy: Strategies, enabled: bool) {
        let was_enabled = self.strategies.contains(strategy);
        self.strategies.set(strategy, enabled);
        if strategy == Strategies::USE_DISK_CACHE && was_enabled != enabled {
            // Reload the theme so the new strategy takes effect.
            if let ThemeState::Active(theme) = &self.theme_state {
                let name = theme.name().to_string();
                // Reset first, or set_theme would return immediately.
                self.theme_state = ThemeState::None;
                self.set_theme(&name);
            }
        }
    }

    // -- sprite keys ------------------------------------------------------

    /// Element key for a frame without normalization.
    fn frame_key_raw(&self, key: &str, frame: i32) -> String {
        let suffix = self.frame_suffix.replacen("{}", &frame.to_string(), 1);
        format!("{key}{suffix}")
    }

    /// Element key for a sprite frame, normalizing the frame number into
    /// `[frame_base_index, frame_base_index + frame_count)`.
    pub(crate) fn sprite_frame_key(&mut self, key: &str, frame: i32) -> String {
        // Fast path for non-animated sprites.
        if frame < 0 {
            return key.to_string();
        }
        let count = self.frame_count(key);
        if count <= 0 {
            return key.to_string();
        }
        let frame = (frame - self.frame_base_index).rem_euclid(count) + self.frame_base_index;
        self.frame_key_raw(key, frame)
    }

    // -- queries ----------------------------------------------------------

    pub(crate) fn frame_count(&mut self, key: &str) -> i32 {
        if !self.ensure_theme() {
            return -1;
        }
        if let Some(count) = self.frame_count_cache.get(key) {
            return *count;
        }
        let cache_key = format!("fc-{key}");
        // Disk lookup only while an idle renderer exists; note the
        // inverse gate in bounds_on_sprite.
        let mut count = None;
        if self.pool.has_available() && self.use_disk_cache() {
            if let Some(cache) = &self.disk_cache {
                count = cache
                    .find(&cache_key)
                    .and_then(|buf| String::from_utf8(buf).ok())
                    .and_then(|s| s.trim().parse::<i32>().ok());
            }
        }
        let count = match count {
            Some(count) => count,
            None => {
                let count = self.probe_frame_count(key);
                if self.use_disk_cache() {
                    if let Some(cache) = &mut self.disk_cache {
                        cache.insert(&cache_key, count.to_string().as_bytes());
                    }
                }
                count
            }
        };
        self.frame_count_cache.insert(key.to_string(), count);
        count
    }

    /// Determine the frame count from the SVG source: count successive
    /// frame-suffixed elements; zero of those but a bare element present
    /// means a non-animated sprite, nothing at all means -1.
    fn probe_frame_count(&mut self, key: &str) -> i32 {
        let Some(renderer) = self.pool.acquire() else {
            return -1;
        };
        let mut index = self.frame_base_index;
        while renderer.element_exists(&self.frame_key_raw(key, index)) {
            index += 1;
        }
        let mut count = index - self.frame_base_index;
        if count == 0 && !renderer.element_exists(key) {
            count = -1;
        }
        self.pool.release(&renderer);
        count
    }

    pub(crate) fn bounds_on_sprite(&mut self, key: &str, frame: i32) -> Bounds {
        if !self.ensure_theme() {
            return Bounds::default();
        }
        let element_key = self.sprite_frame_key(key, frame);
        if let Some(bounds) = self.bounds_cache.get(&element_key) {
            return *bounds;
        }
        let cache_key = format!("br-{element_key}");
        // Inverse renderer-idle gate from frame_count; see there.
        let mut bounds = None;
        if !self.pool.has_available() && self.use_disk_cache() {
            if let Some(cache) = &self.disk_cache {
                bounds = cache.find(&cache_key).and_then(|buf| {
                    bincode::decode_from_slice::<Bounds, _>(&buf, bincode::config::standard())
                        .map(|(bounds, _)| bounds)
                        .ok()
                });
            }
        }
        let bounds = match bounds {
            Some(bounds) => bounds,
            None => {
                let bounds = match self.pool.acquire() {
                    Some(renderer) => {
                        let bounds = renderer.bounds_on_element(&element_key);
                        self.pool.release(&renderer);
                        bounds
                    }
                    None => Bounds::default(),
                };
                if self.use_disk_cache() {
                    if let Some(cache) = &mut self.disk_cache {
                        if let Ok(bytes) =
                            bincode::encode_to_vec(bounds, bincode::config::standard())
                        {
                            cache.insert(&cache_key, &bytes);
                        }
                    }
                }
                bounds
            }
        };
        self.bounds_cache.insert(element_key, bounds);
        bounds
    }

    // -- the shared request path ------------------------------------------

    fn push_pixmap(&mut self, id: ClientId, pixmap: SpritePixmap) {
        if let Some(entry) = self.clients.get_mut(&id) {
            entry.pixmap = Some(pixmap.clone());
        }
        self.notifications.push(Notification::Pixmap(id, pixmap));
    }

    fn propagate(&mut self, pixmap: SpritePixmap, client: Option<ClientId>) -> Option<SpritePixmap> {
        match client {
            Some(id) => {
                self.push_pixmap(id, pixmap);
                None
            }
            None => Some(pixmap),
        }
    }

    /// The shared request path behind both the synchronous pixmap query
    /// (`client` is [`None`]; the result is returned directly) and all
    /// client-driven asynchronous requests (delivery happens through the
    /// notification queue).
    pub(crate) fn request_pixmap(
        &mut self,
        spec: &ClientSpec,
        client: Option<ClientId>,
    ) -> Option<SpritePixmap> {
        if spec.is_empty_size() {
            return self.propagate(SpritePixmap::empty(), client);
        }
        let element_key = self.sprite_frame_key(&spec.sprite_key, spec.frame);
        let mut cache_key = format!("{}-{}-{element_key}", spec.size.x, spec.size.y);
        for (src, dst) in &spec.custom_colors {
            cache_key.push_str(&format!("-{}-{}", src.as_u32(), dst.as_u32()));
        }
        // De-duplication contract: a client re-requesting its current
        // key is already satisfied or already in flight.
        if let Some(id) = client {
            match self.clients.get_mut(&id) {
                Some(entry) => {
                    if entry.cache_key == cache_key {
                        return None;
                    }
                    entry.cache_key = cache_key.clone();
                }
                None => return None,
            }
        }
        if !self.ensure_theme() {
            return client.is_none().then(SpritePixmap::empty);
        }
        // Tier 1: in-process pixmap cache.
        if let Some(pixmap) = self.pixmap_cache.get(&cache_key) {
            let pixmap = pixmap.clone();
            return self.propagate(pixmap, client);
        }
        // Tier 2: persistent store.
        if self.use_disk_cache() {
            if let Some(cache) = &self.disk_cache {
                if let Some(raw) = cache.find_image(&cache_key) {
                    let pixmap = SpritePixmap::from_raw(&raw);
                    self.pixmap_cache.insert(cache_key.clone(), pixmap.clone());
                    return self.propagate(pixmap, client);
                }
            }
        }
        // An identical asynchronous job may already be running; its
        // completion notifies every client recorded for this key.
        if client.is_some() && self.pending_requests.contains(&cache_key) {
            return None;
        }
        // Tier 3: render.
        let synchronous = client.is_none();
        if synchronous || !self.strategies.contains(Strategies::USE_RENDERING_THREADS) {
            let job = Job {
                element_key,
                cache_key: cache_key.clone(),
                spec: spec.clone(),
                synchronous: true,
            };
            let result = render_job(job, &self.pool, &self.render_count);
            self.finish_job(result);
            // If everything worked, the result is in tier 1 now.
            let pixmap = self
                .pixmap_cache
                .get(&cache_key)
                .cloned()
                .unwrap_or_else(SpritePixmap::empty);
            self.propagate(pixmap, client)
        } else {
            self.workers.submit(Job {
                element_key,
                cache_key: cache_key.clone(),
                spec: spec.clone(),
                synchronous: false,
            });
            self.pending_requests.insert(cache_key);
            None
        }
    }

    /// Commit a finished job. Runs on the control thread only.
    pub(crate) fn finish_job(&mut self, result: JobResult) {
        let cache_key = result.cache_key;
        self.pending_requests.remove(&cache_key);
        let requesters: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, entry)| entry.cache_key == cache_key)
            .map(|(id, _)| *id)
            .collect();
        let Some(raw) = result.image else {
            for id in requesters {
                self.push_pixmap(id, SpritePixmap::empty());
            }
            return;
        };
        if self.use_disk_cache() {
            if let Some(cache) = &mut self.disk_cache {
                cache.insert_image(&cache_key, &raw);
            }
            // Skip the display-format conversion when the result is no
            // longer wanted (e.g. superseded by a resize); the disk entry
            // keeps it reusable.
            if !result.synchronous && requesters.is_empty() {
                return;
            }
        }
        let pixmap = SpritePixmap::from_raw(&raw);
        self.pixmap_cache.insert(cache_key, pixmap.clone());
        for id in requesters {
            self.push_pixmap(id, pixmap.clone());
        }
    }

    /// Commit all results that have already arrived, without blocking.
    fn drain_results(&mut self) {
        let results = self.workers.results().clone();
        while let Ok(result) = results.try_recv() {
            self.finish_job(result);
        }
    }

    /// Block until no job is pending or the timeout elapses.
    fn wait_idle(&mut self, timeout: Duration) -> bool {
        let results = self.workers.results().clone();
        let deadline = Instant::now() + timeout;
        loop {
            while let Ok(result) = results.try_recv() {
                self.finish_job(result);
            }
            if self.pending_requests.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match results.recv_timeout(deadline - now) {
                Ok(result) => self.finish_job(result),
                Err(_) => return self.pending_requests.is_empty(),
            }
        }
    }

    fn drain_pending_jobs(&mut self) {
        if !self.wait_idle(DRAIN_TIMEOUT) {
            log::warn!(
                "{} render jobs still pending after {DRAIN_TIMEOUT:?}, dropping them",
                self.pending_requests.len()
            );
            self.pending_requests.clear();
        }
    }

    // -- client registry --------------------------------------------------

    pub(crate) fn register_client(&mut self, spec: ClientSpec) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(
            id,
            ClientEntry {
                cache_key: String::new(),
                spec,
                callback: None,
                pixmap: None,
            },
        );
        id
    }

    pub(crate) fn unregister_client(&mut self, id: ClientId) {
        self.clients.remove(&id);
    }
}

/// Dispatch queued notifications, releasing the inner borrow around each
/// callback so callbacks may call back into the engine.
pub(crate) fn dispatch(inner: &Rc<RefCell<EngineInner>>) {
    loop {
        let notification = {
            let mut inner = inner.borrow_mut();
            if inner.notifications.is_empty() {
                break;
            }
            inner.notifications.remove(0)
        };
        match notification {
            Notification::Pixmap(id, pixmap) => {
                let callback = inner
                    .borrow_mut()
                    .clients
                    .get_mut(&id)
                    .and_then(|entry| entry.callback.take());
                if let Some(mut callback) = callback {
                    callback(&pixmap);
                    if let Some(entry) = inner.borrow_mut().clients.get_mut(&id) {
                        if entry.callback.is_none() {
                            entry.callback = Some(callback);
                        }
                    }
                }
            }
            Notification::ThemeChanged(name) => {
                let mut callbacks = std::mem::take(&mut inner.borrow_mut().theme_callbacks);
                for callback in callbacks.iter_mut() {
                    callback(&name);
                }
                let mut borrowed = inner.borrow_mut();
                let mut registered_during = std::mem::take(&mut borrowed.theme_callbacks);
                callbacks.append(&mut registered_during);
                borrowed.theme_callbacks = callbacks;
            }
        }
    }
}

/// The sprite rendering and caching engine.
///
/// Owns the renderer pool, the worker threads, all cache tiers and the
/// client registry. Not `Send`: the creating thread becomes the control
/// thread. Asynchronous results are committed and delivered by [`pump`]
/// (or [`pump_until_idle`]), typically called once per frame or event
/// loop turn.
///
/// [`pump`]: RenderEngine::pump
/// [`pump_until_idle`]: RenderEngine::pump_until_idle
pub struct RenderEngine {
    inner: Rc<RefCell<EngineInner>>,
}

impl RenderEngine {
    /// Create an engine over a theme provider. No theme is loaded until
    /// [`set_theme`](Self::set_theme) is called or the first sprite query
    /// lazily loads the configured default theme.
    pub fn new(provider: Box<dyn ThemeProvider>, config: RenderConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EngineInner::new(provider, config))),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<RefCell<EngineInner>> {
        &self.inner
    }

    /// Name of the active theme, or an empty string while themeless.
    pub fn theme(&self) -> String {
        self.inner.borrow().theme_name().to_string()
    }

    /// Switch to the named theme.
    ///
    /// No-op when the theme is already active. Falls back to the default
    /// theme when loading fails; when that fails too, the engine becomes
    /// themeless and all sprite queries return "not found" sentinels.
    /// Registered clients are re-rendered automatically, and
    /// theme-changed callbacks fire only when the active theme actually
    /// changed.
    pub fn set_theme(&self, name: &str) {
        self.inner.borrow_mut().set_theme(name);
        dispatch(&self.inner);
    }

    /// The currently enabled strategies.
    pub fn strategies(&self) -> Strategies {
        self.inner.borrow().strategies
    }

    /// Enable or disable one strategy. Toggling
    /// [`Strategies::USE_DISK_CACHE`] reloads the active theme.
    pub fn set_strategy_enabled(&self, strategy: Strategies, enabled: bool) {
        self.inner.borrow_mut().set_strategy_enabled(strategy, enabled);
        dispatch(&self.inner);
    }

    /// First frame index of animated sprites.
    pub fn frame_base_index(&self) -> i32 {
        self.inner.borrow().frame_base_index
    }

    /// Set the first frame index of animated sprites.
    pub fn set_frame_base_index(&self, frame_base_index: i32) {
        self.inner.borrow_mut().frame_base_index = frame_base_index;
    }

    /// The frame suffix pattern.
    pub fn frame_suffix(&self) -> String {
        self.inner.borrow().frame_suffix.clone()
    }

    /// Set the frame suffix pattern. Patterns without a `{}` placeholder
    /// are replaced by the default pattern.
    pub fn set_frame_suffix(&self, suffix: &str) {
        self.inner.borrow_mut().frame_suffix = normalize_frame_suffix(suffix);
    }

    /// Number of frames of a sprite: positive for animated sprites, 0
    /// for a non-animated sprite, -1 for a sprite that does not exist.
    pub fn frame_count(&self, key: &str) -> i32 {
        let count = self.inner.borrow_mut().frame_count(key);
        dispatch(&self.inner);
        count
    }

    /// Whether the sprite exists in the active theme.
    pub fn sprite_exists(&self, key: &str) -> bool {
        self.frame_count(key) >= 0
    }

    /// Bounds of a sprite frame in the theme's coordinate system, or the
    /// empty sentinel when the sprite does not exist.
    pub fn bounds_on_sprite(&self, key: &str, frame: i32) -> Bounds {
        let bounds = self.inner.borrow_mut().bounds_on_sprite(key, frame);
        dispatch(&self.inner);
        bounds
    }

    /// Render a sprite synchronously. Blocks the calling thread; the job
    /// always runs inline, never through the worker pool.
    pub fn sprite_pixmap(
        &self,
        key: &str,
        size: Vector2<u32>,
        frame: i32,
        custom_colors: ColorMap,
    ) -> SpritePixmap {
        let spec = ClientSpec {
            sprite_key: key.to_string(),
            frame,
            size,
            custom_colors,
        };
        let pixmap = self
            .inner
            .borrow_mut()
            .request_pixmap(&spec, None)
            .unwrap_or_else(SpritePixmap::empty);
        dispatch(&self.inner);
        pixmap
    }

    /// Commit finished asynchronous jobs and deliver client callbacks.
    /// Never blocks.
    pub fn pump(&self) {
        self.inner.borrow_mut().drain_results();
        dispatch(&self.inner);
    }

    /// Like [`pump`](Self::pump), but waits until no job is pending.
    /// Returns false when the timeout elapsed first.
    pub fn pump_until_idle(&self, timeout: Duration) -> bool {
        let idle = self.inner.borrow_mut().wait_idle(timeout);
        dispatch(&self.inner);
        idle
    }

    /// Register a callback invoked whenever the active theme changes.
    pub fn on_theme_changed(&self, callback: impl FnMut(&str) + 'static) {
        self.inner
            .borrow_mut()
            .theme_callbacks
            .push(Box::new(callback));
    }

    /// Total number of rasterizations performed so far. Diagnostic.
    pub fn render_count(&self) -> usize {
        self.inner.borrow().render_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SpriteClient;
    use crate::types::{SpriteColor, NO_FRAME};
    use ludic_theme::DirectoryProvider;

    const DEFAULT_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <rect id="player" x="10" y="20" width="40" height="30" fill="#c80000"/>
  <circle id="coin_0" cx="70" cy="70" r="12" fill="#ffd700"/>
  <circle id="coin_1" cx="70" cy="70" r="10" fill="#ffd700"/>
  <circle id="coin_2" cx="70" cy="70" r="8" fill="#ffd700"/>
</svg>"##;

    const NIGHT_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <rect id="player" x="10" y="20" width="40" height="30" fill="#0000c8"/>
</svg>"##;

    struct Fixture {
        _dir: tempfile::TempDir,
        engine: RenderEngine,
    }

    fn fixture() -> Fixture {
        fixture_with(|config| config)
    }

    fn fixture_with(adjust: impl FnOnce(RenderConfig) -> RenderConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        write_themes(dir.path());
        let config = adjust(base_config(dir.path()));
        let engine = RenderEngine::new(
            Box::new(DirectoryProvider::new(dir.path().join("themes"))),
            config,
        );
        Fixture { _dir: dir, engine }
    }

    fn write_themes(root: &std::path::Path) {
        let themes = root.join("themes");
        std::fs::create_dir_all(&themes).unwrap();
        std::fs::write(themes.join("default.svg"), DEFAULT_SVG).unwrap();
        std::fs::write(themes.join("night.svg"), NIGHT_SVG).unwrap();
    }

    fn base_config(root: &std::path::Path) -> RenderConfig {
        RenderConfig {
            cache_dir: Some(root.join("cache")),
            worker_threads: 2,
            ..RenderConfig::new("default")
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_frame_count_variants() {
        let f = fixture();
        assert_eq!(f.engine.frame_count("coin"), 3);
        assert_eq!(f.engine.frame_count("player"), 0);
        assert_eq!(f.engine.frame_count("ghost"), -1);
        assert!(f.engine.sprite_exists("player"));
        assert!(!f.engine.sprite_exists("ghost"));
    }

    #[test]
    fn test_frame_key_normalization() {
        let f = fixture();
        let mut inner = f.engine.inner().borrow_mut();
        // coin has 3 frames with base index 0: frame 4 wraps to frame 1.
        assert_eq!(inner.sprite_frame_key("coin", 4), "coin_1");
        assert_eq!(
            inner.sprite_frame_key("coin", 4),
            inner.sprite_frame_key("coin", 1)
        );
        // Non-animated and absent sprites map to the bare key.
        assert_eq!(inner.sprite_frame_key("player", 7), "player");
        assert_eq!(inner.sprite_frame_key("ghost", 2), "ghost");
        assert_eq!(inner.sprite_frame_key("coin", NO_FRAME), "coin");
    }

    #[test]
    fn test_bounds_on_sprite() {
        let f = fixture();
        let bounds = f.engine.bounds_on_sprite("player", NO_FRAME);
        assert_eq!(bounds, Bounds::new(10.0, 20.0, 40.0, 30.0));
        assert!(f.engine.bounds_on_sprite("ghost", NO_FRAME).is_empty());
    }

    #[test]
    fn test_sync_pixmap_is_cached() {
        let f = fixture();
        let size = Vector2::new(24, 24);
        let first = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert!(first.has_content());
        assert_eq!(f.engine.render_count(), 1);

        let second = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert_eq!(first, second);
        // Served from tier 1, no re-rasterization.
        assert_eq!(f.engine.render_count(), 1);
    }

    #[test]
    fn test_zero_size_resolves_immediately() {
        let f = fixture();
        let pixmap = f
            .engine
            .sprite_pixmap("player", Vector2::new(0, 64), NO_FRAME, ColorMap::new());
        assert!(pixmap.is_empty());
        assert_eq!(f.engine.render_count(), 0);
        // Not even the theme was loaded for a degenerate request.
        assert_eq!(f.engine.theme(), "");
    }

    #[test]
    fn test_custom_colors_change_cache_key() {
        let f = fixture();
        let size = Vector2::new(16, 16);
        let plain = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());

        let mut colors = ColorMap::new();
        colors.insert(SpriteColor::rgb(200, 0, 0), SpriteColor::rgb(0, 200, 0));
        let recolored = f.engine.sprite_pixmap("player", size, NO_FRAME, colors);
        assert_ne!(plain, recolored);
        assert_eq!(f.engine.render_count(), 2);
    }

    #[test]
    fn test_async_dedup_and_fanout() {
        let f = fixture();
        let size = Vector2::new(20, 20);
        let a = SpriteClient::new(&f.engine, "player");
        let b = SpriteClient::new(&f.engine, "player");
        a.set_render_size(size);
        b.set_render_size(size);

        assert!(f.engine.pump_until_idle(TIMEOUT));
        // One job, two deliveries.
        assert_eq!(f.engine.render_count(), 1);
        let pix_a = a.pixmap().unwrap();
        let pix_b = b.pixmap().unwrap();
        assert!(pix_a.has_content());
        assert_eq!(pix_a, pix_b);
    }

    #[test]
    fn test_superseded_request_not_delivered() {
        let f = fixture();
        let client = SpriteClient::new(&f.engine, "player");
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let log = delivered.clone();
        client.on_pixmap(move |pixmap| {
            log.borrow_mut().push((pixmap.width(), pixmap.height()));
        });

        client.set_render_size(Vector2::new(16, 16));
        client.set_render_size(Vector2::new(32, 32));
        assert!(f.engine.pump_until_idle(TIMEOUT));

        // Only the latest request reaches the client...
        assert_eq!(delivered.borrow().as_slice(), &[(32, 32)]);
        assert_eq!(client.pixmap().unwrap().width(), 32);
        // ...but the superseded render is still cache-committed: asking
        // for it again rasterizes nothing new.
        let renders = f.engine.render_count();
        let pixmap =
            f.engine
                .sprite_pixmap("player", Vector2::new(16, 16), NO_FRAME, ColorMap::new());
        assert!(pixmap.has_content());
        assert_eq!(f.engine.render_count(), renders);
    }

    #[test]
    fn test_theme_switch_and_back() {
        let f = fixture();
        let size = Vector2::new(16, 16);
        let day = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert_eq!(f.engine.frame_count("coin"), 3);

        f.engine.set_theme("night");
        assert_eq!(f.engine.theme(), "night");
        let night = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert_ne!(day, night);
        // The coin only exists in the default theme.
        assert_eq!(f.engine.frame_count("coin"), -1);

        f.engine.set_theme("default");
        let again = f.engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert_eq!(day, again);
        assert_eq!(f.engine.frame_count("coin"), 3);
    }

    #[test]
    fn test_unknown_theme_falls_back_to_default() {
        let f = fixture();
        let changes = Rc::new(RefCell::new(Vec::<String>::new()));
        let log = changes.clone();
        f.engine.on_theme_changed(move |name| log.borrow_mut().push(name.to_string()));

        f.engine.set_theme("no-such-theme");
        assert_eq!(f.engine.theme(), "default");
        assert_eq!(changes.borrow().as_slice(), &["default".to_string()]);

        // Falling back onto the already-active theme changes nothing.
        f.engine.set_theme("still-missing");
        assert_eq!(f.engine.theme(), "default");
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_broken_default_theme_degrades_to_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let themes = dir.path().join("themes");
        std::fs::create_dir_all(&themes).unwrap();
        std::fs::write(themes.join("default.svg"), "not an svg document").unwrap();
        let engine = RenderEngine::new(
            Box::new(DirectoryProvider::new(&themes)),
            base_config(dir.path()),
        );

        assert_eq!(engine.frame_count("player"), -1);
        assert!(engine.bounds_on_sprite("player", NO_FRAME).is_empty());
        let pixmap =
            engine.sprite_pixmap("player", Vector2::new(8, 8), NO_FRAME, ColorMap::new());
        assert!(pixmap.is_empty());
        assert_eq!(engine.theme(), "");
    }

    #[test]
    fn test_broken_default_theme_with_registered_client() {
        let dir = tempfile::tempdir().unwrap();
        let themes = dir.path().join("themes");
        std::fs::create_dir_all(&themes).unwrap();
        std::fs::write(themes.join("default.svg"), "not an svg document").unwrap();
        let engine = RenderEngine::new(
            Box::new(DirectoryProvider::new(&themes)),
            base_config(dir.path()),
        );

        let client = SpriteClient::new(&engine, "player");
        // Each request attempts one theme load, fails, and settles on the
        // sentinel; the registered client must not keep the engine busy
        // retrying through its own refetch.
        client.set_render_size(Vector2::new(8, 8));
        assert!(client.pixmap().unwrap().is_empty());
        assert_eq!(engine.theme(), "");
        assert_eq!(engine.frame_count("player"), -1);
    }

    #[test]
    fn test_disk_cache_survives_engine_restart() {
        let dir = tempfile::tempdir().unwrap();
        write_themes(dir.path());
        let size = Vector2::new(40, 40);
        {
            let engine = RenderEngine::new(
                Box::new(DirectoryProvider::new(dir.path().join("themes"))),
                base_config(dir.path()),
            );
            let pixmap = engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
            assert!(pixmap.has_content());
            assert_eq!(engine.render_count(), 1);
        }
        // A fresh engine over the same cache directory serves the pixmap
        // from the persistent tier without rasterizing.
        let engine = RenderEngine::new(
            Box::new(DirectoryProvider::new(dir.path().join("themes"))),
            base_config(dir.path()),
        );
        let pixmap = engine.sprite_pixmap("player", size, NO_FRAME, ColorMap::new());
        assert!(pixmap.has_content());
        assert_eq!(engine.render_count(), 0);
    }

    #[test]
    fn test_disk_toggle_reloads_theme() {
        let f = fixture();
        f.engine.set_theme("default");
        let changes = Rc::new(RefCell::new(0));
        let log = changes.clone();
        f.engine.on_theme_changed(move |_| *log.borrow_mut() += 1);

        f.engine
            .set_strategy_enabled(Strategies::USE_DISK_CACHE, false);
        assert!(!f.engine.strategies().contains(Strategies::USE_DISK_CACHE));
        // The reload is observable as a theme-changed notification and a
        // working render path afterwards.
        assert_eq!(*changes.borrow(), 1);
        assert_eq!(f.engine.theme(), "default");
        let pixmap =
            f.engine
                .sprite_pixmap("player", Vector2::new(8, 8), NO_FRAME, ColorMap::new());
        assert!(pixmap.has_content());

        f.engine
            .set_strategy_enabled(Strategies::USE_DISK_CACHE, true);
        assert_eq!(*changes.borrow(), 2);
    }

    #[test]
    fn test_inline_rendering_without_threads() {
        let f = fixture_with(|mut config| {
            config.strategies = Strategies::USE_DISK_CACHE;
            config
        });
        let client = SpriteClient::new(&f.engine, "player");
        client.set_render_size(Vector2::new(10, 10));
        // No pump needed: the job ran inline on the calling thread.
        assert_eq!(f.engine.render_count(), 1);
        assert!(client.pixmap().unwrap().has_content());
    }

    #[test]
    fn test_clients_refetch_on_theme_change() {
        let f = fixture();
        let client = SpriteClient::new(&f.engine, "player");
        client.set_render_size(Vector2::new(12, 12));
        assert!(f.engine.pump_until_idle(TIMEOUT));
        let day = client.pixmap().unwrap();

        f.engine.set_theme("night");
        assert!(f.engine.pump_until_idle(TIMEOUT));
        let night = client.pixmap().unwrap();
        assert_eq!(night.width(), 12);
        assert_ne!(day, night);
    }

    #[test]
    fn test_end_to_end_player_scenario() {
        let f = fixture();
        assert_eq!(f.engine.frame_count("player"), 0);
        assert_eq!(
            f.engine.bounds_on_sprite("player", NO_FRAME),
            Bounds::new(10.0, 20.0, 40.0, 30.0)
        );
        let pixmap =
            f.engine
                .sprite_pixmap("player", Vector2::new(64, 64), NO_FRAME, ColorMap::new());
        assert_eq!((pixmap.width(), pixmap.height()), (64, 64));
        assert!(pixmap.has_content());
    }
}
