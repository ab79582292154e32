// SPDX-License-Identifier: LGPL-3.0-only

//! Render jobs and the worker thread pool.
//!
//! A [`Job`] is one rasterization: element key, target size, optional
//! color substitutions. Jobs either run inline on the control thread
//! (synchronous requests, or threaded rendering disabled) or on a worker
//! thread. Workers only touch the renderer pool and the job's immutable
//! inputs; finished results travel back to the control thread over a
//! channel and are committed to the caches there.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use resvg::tiny_skia;

use crate::pool::RendererPool;
use crate::types::{ClientSpec, ColorMap};

/// One unit of rasterization work.
pub(crate) struct Job {
    pub element_key: String,
    pub cache_key: String,
    pub spec: ClientSpec,
    pub synchronous: bool,
}

/// The outcome of a [`Job`], handed back to the control thread.
pub(crate) struct JobResult {
    pub cache_key: String,
    /// Raw premultiplied render result. [`None`] only when the pixmap
    /// could not be allocated.
    pub image: Option<tiny_skia::Pixmap>,
    pub synchronous: bool,
}

/// Execute one job: allocate a transparent target, rasterize the element
/// through a pooled renderer, then apply color substitutions.
///
/// The pooled renderer is held only across the rasterization call. An
/// element missing from the source leaves the target fully transparent;
/// that is not an error.
pub(crate) fn render_job(
    job: Job,
    pool: &RendererPool,
    render_count: &AtomicUsize,
) -> JobResult {
    let mut image = tiny_skia::Pixmap::new(job.spec.size.x, job.spec.size.y);
    if let Some(pixmap) = image.as_mut() {
        if let Some(renderer) = pool.acquire() {
            render_count.fetch_add(1, Ordering::Relaxed);
            renderer.render_element(&job.element_key, &mut pixmap.as_mut());
            pool.release(&renderer);
        }
        if !job.spec.custom_colors.is_empty() {
            remap_colors(pixmap, &job.spec.custom_colors);
        }
    }
    JobResult {
        cache_key: job.cache_key,
        image,
        synchronous: job.synchronous,
    }
}

/// Replace mapped colors in a rendered pixmap, leaving unmapped colors
/// untouched.
///
/// Matching is done on the demultiplied RGB of each pixel, so antialiased
/// edge pixels of a mapped color are remapped as well; the pixel's alpha
/// is preserved and the source color's alpha does not participate in the
/// match.
fn remap_colors(pixmap: &mut tiny_skia::Pixmap, colors: &ColorMap) {
    for pixel in pixmap.pixels_mut() {
        let alpha = pixel.alpha();
        if alpha == 0 {
            continue;
        }
        let c = pixel.demultiply();
        for (src, dst) in colors {
            if src.r == c.red() && src.g == c.green() && src.b == c.blue() {
                *pixel =
                    tiny_skia::ColorU8::from_rgba(dst.r, dst.g, dst.b, alpha).premultiply();
                break;
            }
        }
    }
}

/// A fixed set of worker threads executing render jobs.
pub(crate) struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    results: Receiver<JobResult>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (0 selects the available parallelism).
    pub fn new(
        threads: usize,
        pool: Arc<RendererPool>,
        render_count: Arc<AtomicUsize>,
    ) -> Self {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };
        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, results) = unbounded();
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let pool = pool.clone();
            let render_count = render_count.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("ludic-render-{i}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let result = render_job(job, &pool, &render_count);
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("failed to spawn render worker: {e}"),
            }
        }
        Self {
            job_tx: Some(job_tx),
            results,
            handles,
        }
    }

    /// Enqueue a job for asynchronous execution.
    pub fn submit(&self, job: Job) {
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(job);
        }
    }

    /// The channel finished jobs arrive on.
    pub fn results(&self) -> &Receiver<JobResult> {
        &self.results
    }

    /// Close the job queue and join all workers. In-flight jobs are
    /// allowed to complete.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
