//! Background page rasterization
//!
//! A [`RenderPipeline`] owns a small pool of worker threads pulling
//! [`RenderRequest`]s from a shared channel. Each request carries the page's
//! render generation and a [`CancellationToken`]; the session discards
//! completions whose generation is no longer current.

use inkseal_raster::{Bitmap, PageHandle, PageRasterizer, RenderError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cancellation token for cooperative render cancellation
///
/// Clones share the same state. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// One page to rasterize
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub page: usize,
    pub generation: u64,
    pub handle: PageHandle,
    pub scale: f32,
    pub token: CancellationToken,
}

/// Outcome of a render request
#[derive(Debug)]
pub struct RenderCompletion {
    pub page: usize,
    pub generation: u64,
    pub scale: f32,
    pub result: Result<Bitmap, RenderError>,
}

/// Worker pool rasterizing pages off the calling thread
pub struct RenderPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    requests: Option<Sender<RenderRequest>>,
    completions: Receiver<RenderCompletion>,
    completion_tx: Sender<RenderCompletion>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderPipeline {
    /// Start `workers` render threads. With zero workers every request is
    /// rendered on the calling thread inside [`submit`](Self::submit).
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, workers: usize) -> io::Result<Self> {
        let (completion_tx, completions) = mpsc::channel();
        let mut pipeline = Self {
            rasterizer,
            requests: None,
            completions,
            completion_tx,
            workers: Vec::with_capacity(workers),
        };

        if workers == 0 {
            return Ok(pipeline);
        }

        let (request_tx, request_rx) = mpsc::channel::<RenderRequest>();
        let request_rx = Arc::new(Mutex::new(request_rx));
        for id in 0..workers {
            let requests = Arc::clone(&request_rx);
            let completions = pipeline.completion_tx.clone();
            let rasterizer = Arc::clone(&pipeline.rasterizer);
            let handle = thread::Builder::new()
                .name(format!("inkseal-render-{id}"))
                .spawn(move || worker_loop(requests, completions, rasterizer))?;
            pipeline.workers.push(handle);
        }
        pipeline.requests = Some(request_tx);

        Ok(pipeline)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a render. Results arrive through [`try_recv`](Self::try_recv).
    pub fn submit(&self, request: RenderRequest) {
        match &self.requests {
            Some(requests) => {
                if let Err(mpsc::SendError(request)) = requests.send(request) {
                    tracing::warn!(page = request.page, "render workers gone, rendering inline");
                    render_one(self.rasterizer.as_ref(), request, &self.completion_tx);
                }
            }
            None => render_one(self.rasterizer.as_ref(), request, &self.completion_tx),
        }
    }

    pub fn try_recv(&self) -> Option<RenderCompletion> {
        self.completions.try_recv().ok()
    }

    /// Wait up to `timeout` for the next completion.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderCompletion> {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Some(completion),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        // Closing the request channel ends every worker loop.
        self.requests.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("render worker panicked");
            }
        }
    }
}

fn worker_loop(
    requests: Arc<Mutex<Receiver<RenderRequest>>>,
    completions: Sender<RenderCompletion>,
    rasterizer: Arc<dyn PageRasterizer>,
) {
    loop {
        let next = {
            let receiver = requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            receiver.recv()
        };
        let Ok(request) = next else {
            break;
        };
        render_one(rasterizer.as_ref(), request, &completions);
    }
}

fn render_one(
    rasterizer: &dyn PageRasterizer,
    request: RenderRequest,
    completions: &Sender<RenderCompletion>,
) {
    if request.token.is_cancelled() {
        tracing::trace!(page = request.page, generation = request.generation, "render cancelled before start");
        return;
    }

    let result = rasterizer.render(&request.handle, request.scale);
    if request.token.is_cancelled() {
        tracing::debug!(page = request.page, generation = request.generation, "dropping cancelled render");
        return;
    }

    // The receiver is gone once the session closed; nothing to deliver to.
    let _ = completions.send(RenderCompletion {
        page: request.page,
        generation: request.generation,
        scale: request.scale,
        result,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkseal_raster::{DocumentLoader, InMemoryBackend, OpenSource, PageSize};
    use std::path::Path;

    fn backend_and_pages(delay: Option<Duration>) -> (Arc<InMemoryBackend>, Vec<PageHandle>) {
        let mut backend = InMemoryBackend::new()
            .with_document("doc.pdf", vec![PageSize::new(100.0, 100.0), PageSize::new(50.0, 80.0)]);
        if let Some(delay) = delay {
            backend = backend.with_render_delay(delay);
        }
        let doc = backend.load(&OpenSource::from(Path::new("doc.pdf"))).expect("load should succeed");
        (Arc::new(backend), doc.pages)
    }

    fn request(page: usize, handle: PageHandle, generation: u64) -> RenderRequest {
        RenderRequest { page, generation, handle, scale: 1.0, token: CancellationToken::new() }
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_inline_pipeline_renders_on_submit() {
        let (backend, pages) = backend_and_pages(None);
        let pipeline = RenderPipeline::new(backend, 0).expect("pipeline");

        pipeline.submit(request(1, pages[1], 7));
        let completion = pipeline.try_recv().expect("inline render completes immediately");

        assert_eq!(completion.page, 1);
        assert_eq!(completion.generation, 7);
        assert_eq!(completion.result.expect("render ok").dimensions(), (50, 80));
        assert_eq!(pipeline.worker_count(), 0);
    }

    #[test]
    fn test_workers_render_every_request() {
        let (backend, pages) = backend_and_pages(None);
        let pipeline = RenderPipeline::new(backend, 2).expect("pipeline");

        pipeline.submit(request(0, pages[0], 1));
        pipeline.submit(request(1, pages[1], 1));

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let completion = pipeline
                .recv_timeout(Duration::from_secs(5))
                .expect("render should finish");
            seen.push(completion.page);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_cancelled_request_produces_nothing() {
        let (backend, pages) = backend_and_pages(None);
        let pipeline = RenderPipeline::new(backend, 0).expect("pipeline");

        let cancelled = request(0, pages[0], 1);
        cancelled.token.cancel();
        pipeline.submit(cancelled);

        assert!(pipeline.try_recv().is_none());
    }

    #[test]
    fn test_cancel_during_render_drops_result() {
        let (backend, pages) = backend_and_pages(Some(Duration::from_millis(100)));
        let pipeline = RenderPipeline::new(backend, 1).expect("pipeline");

        let slow = request(0, pages[0], 1);
        let token = slow.token.clone();
        pipeline.submit(slow);
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert!(pipeline.recv_timeout(Duration::from_millis(400)).is_none());
    }

    #[test]
    fn test_drop_joins_workers() {
        let (backend, pages) = backend_and_pages(Some(Duration::from_millis(10)));
        let pipeline = RenderPipeline::new(backend, 3).expect("pipeline");
        pipeline.submit(request(0, pages[0], 1));
        drop(pipeline);
    }
}
