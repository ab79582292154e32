// SPDX-License-Identifier: LGPL-3.0-only

//! A checkout pool of renderer instances bound to one SVG source file.
//!
//! Renderer instances are never shared: `acquire` hands an instance to
//! exactly one holder at a time and `release` returns it. The pool grows
//! lazily under concurrent demand and caches whether the bound source
//! file is valid, so a broken theme file is probed at most once.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::svg::SvgRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    Unchecked,
    Valid,
    Invalid,
}

struct Slot {
    renderer: Arc<SvgRenderer>,
    /// Thread currently holding the instance. Diagnostic only; holders
    /// are not pinned to threads across acquire calls.
    holder: Option<ThreadId>,
}

struct PoolInner {
    source: Option<PathBuf>,
    validity: Validity,
    slots: Vec<Slot>,
}

/// Pool of [`SvgRenderer`] instances for one source file.
pub struct RendererPool {
    inner: Mutex<PoolInner>,
    idle: Condvar,
}

impl RendererPool {
    /// Create an empty pool with no bound source file.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                source: None,
                // Don't try to build renderers until given a source file.
                validity: Validity::Invalid,
                slots: Vec::new(),
            }),
            idle: Condvar::new(),
        }
    }

    /// Rebind the pool to a new source file.
    ///
    /// Blocks until every checked-out instance has been released, then
    /// destroys all pooled instances. A pre-validated `seed` instance may
    /// be passed to populate the pool and mark the source as known-good,
    /// skipping the next validity probe.
    pub fn set_source(&self, source: Option<PathBuf>, seed: Option<SvgRenderer>) {
        let mut inner = self.inner.lock();
        while inner.slots.iter().any(|s| s.holder.is_some()) {
            self.idle.wait(&mut inner);
        }
        inner.slots.clear();
        inner.source = source;
        match seed {
            Some(renderer) => {
                // Existence of an instance is evidence of source validity.
                inner.validity = Validity::Valid;
                inner.slots.push(Slot {
                    renderer: Arc::new(renderer),
                    holder: None,
                });
            }
            None => {
                inner.validity = if inner.source.is_some() {
                    Validity::Unchecked
                } else {
                    Validity::Invalid
                };
            }
        }
    }

    /// Whether at least one pooled instance is idle right now.
    ///
    /// An optimization hint only: callers use it to decide whether a
    /// render would be "free" compared to a disk-cache round trip.
    pub fn has_available(&self) -> bool {
        self.inner.lock().slots.iter().any(|s| s.holder.is_none())
    }

    /// Check out an instance, instantiating a new one when all pooled
    /// instances are busy and the source is not known to be invalid.
    pub fn acquire(&self) -> Option<Arc<SvgRenderer>> {
        let thread = std::thread::current().id();
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.iter_mut().find(|s| s.holder.is_none()) {
            slot.holder = Some(thread);
            return Some(slot.renderer.clone());
        }
        if inner.validity == Validity::Invalid {
            return None;
        }
        let Some(path) = inner.source.clone() else {
            inner.validity = Validity::Invalid;
            return None;
        };
        match SvgRenderer::from_file(&path) {
            Ok(renderer) => {
                inner.validity = Validity::Valid;
                let renderer = Arc::new(renderer);
                inner.slots.push(Slot {
                    renderer: renderer.clone(),
                    holder: Some(thread),
                });
                Some(renderer)
            }
            Err(e) => {
                log::warn!("failed to load SVG source {path:?}: {e}");
                inner.validity = Validity::Invalid;
                None
            }
        }
    }

    /// Return a checked-out instance to the pool.
    pub fn release(&self, renderer: &Arc<SvgRenderer>) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner
            .slots
            .iter_mut()
            .find(|s| Arc::ptr_eq(&s.renderer, renderer))
        {
            slot.holder = None;
        }
        drop(inner);
        self.idle.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn pooled_instances(&self) -> usize {
        self.inner.lock().slots.len()
    }
}

impl Default for RendererPool {
    fn default() -> Self {
        Self::new()
    }
}
