//! Document editing session
//!
//! A [`DocumentEditorSession`] owns one [`Page`] per document page, the
//! shared tool state and the undo history. Pointer events are routed to the
//! page they land on; renders run on a [`RenderPipeline`] and are picked up
//! with [`poll_renders`](DocumentEditorSession::poll_renders).

use crate::config::EditorConfig;
use crate::controller::{ToolController, ToolOutcome};
use crate::error::{ExportError, ExportErrorKind, SaveError, SessionError};
use crate::geometry::PagePoint;
use crate::history::History;
use crate::object::{AnnotationObject, ObjectId, StampSource, TextStyle};
use crate::render::{CancellationToken, RenderCompletion, RenderPipeline, RenderRequest};
use crate::signature::SignatureAsset;
use crate::sink::{ExportSink, PageBitmap};
use crate::surface::{AnnotationSurface, SurfaceSnapshot};
use crate::tool::{Clock, SystemClock, Tool, ToolState};
use inkseal_raster::{
    clamp_scale, Bitmap, DocumentHandle, DocumentLoader, OpenSource, PageHandle, PageRasterizer,
    RenderError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Services a session is built on
#[derive(Clone)]
pub struct EditorBackends {
    pub loader: Arc<dyn DocumentLoader>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub clock: Arc<dyn Clock>,
}

impl EditorBackends {
    pub fn new(loader: Arc<dyn DocumentLoader>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { loader, rasterizer, clock: Arc::new(SystemClock) }
    }

    /// Use one backend for both loading and rasterizing.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DocumentLoader + PageRasterizer + 'static,
    {
        let loader: Arc<dyn DocumentLoader> = backend.clone();
        Self::new(loader, backend)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Latest raster of a page
#[derive(Debug, Clone, PartialEq)]
pub enum RasterState {
    Pending,
    Ready(Arc<Bitmap>),
    Failed(RenderError),
}

/// One page of an open document: raster plus annotation surface
#[derive(Debug)]
pub struct Page {
    index: usize,
    handle: PageHandle,
    scale: f32,
    viewport_width: f32,
    viewport_height: f32,
    surface: AnnotationSurface,
    raster: RasterState,
    generation: u64,
    inflight: Option<CancellationToken>,
}

impl Page {
    fn new(index: usize, handle: PageHandle, scale: f32) -> Self {
        Self {
            index,
            handle,
            scale,
            viewport_width: handle.size.width_pt * scale,
            viewport_height: handle.size.height_pt * scale,
            surface: AnnotationSurface::new(index as u32),
            raster: RasterState::Pending,
            generation: 0,
            inflight: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handle(&self) -> &PageHandle {
        &self.handle
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Page size in view pixels at the current scale
    pub fn viewport(&self) -> (f32, f32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn surface(&self) -> &AnnotationSurface {
        &self.surface
    }

    pub fn raster(&self) -> &RasterState {
        &self.raster
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// No render outstanding
    pub fn is_settled(&self) -> bool {
        !matches!(self.raster, RasterState::Pending)
    }

    /// Cancel any render in flight and drop the raster.
    pub fn close(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        self.raster = RasterState::Pending;
    }

    /// Start a new render generation at `scale`.
    fn begin_render(&mut self, scale: f32) -> RenderRequest {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        self.scale = scale;
        self.viewport_width = self.handle.size.width_pt * scale;
        self.viewport_height = self.handle.size.height_pt * scale;
        self.generation += 1;
        self.raster = RasterState::Pending;

        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        RenderRequest { page: self.index, generation: self.generation, handle: self.handle, scale, token }
    }

    fn apply(&mut self, completion: RenderCompletion) -> bool {
        if completion.generation != self.generation {
            tracing::debug!(
                page = self.index,
                generation = completion.generation,
                current = self.generation,
                scale = completion.scale,
                "discarding stale render"
            );
            return false;
        }

        self.inflight = None;
        self.raster = match completion.result {
            Ok(bitmap) => RasterState::Ready(Arc::new(bitmap)),
            Err(err) => {
                tracing::warn!(page = self.index, error = %err, "page render failed");
                RasterState::Failed(err)
            }
        };
        true
    }

    fn export(&self) -> Result<PageBitmap, ExportError> {
        let base = match &self.raster {
            RasterState::Ready(bitmap) => bitmap,
            RasterState::Failed(err) => {
                return Err(ExportError::new(self.index, ExportErrorKind::Render(err.clone())))
            }
            RasterState::Pending => return Err(ExportError::new(self.index, ExportErrorKind::NotRendered)),
        };
        let image = self
            .surface
            .flatten(base, self.scale)
            .map_err(|err| ExportError::new(self.index, ExportErrorKind::Composite(err)))?;
        Ok(PageBitmap { index: self.index, scale: self.scale, image })
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
    }
}

/// Editing state for one open document
pub struct DocumentEditorSession {
    document: DocumentHandle,
    title: Option<String>,
    loader: Arc<dyn DocumentLoader>,
    pipeline: RenderPipeline,
    pages: Vec<Page>,
    scale: f32,
    controller: ToolController,
    history: History,

    /// Surface state before the gesture in progress
    pending: Option<(usize, SurfaceSnapshot)>,

    config: EditorConfig,
    closed: bool,
}

impl DocumentEditorSession {
    /// Load `source` and start rendering every page.
    ///
    /// # Errors
    /// Fails if the config is invalid, the document cannot be loaded, or the
    /// render workers cannot be started.
    pub fn open(
        source: impl Into<OpenSource>,
        backends: EditorBackends,
        config: EditorConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let source = source.into();

        let loaded = backends.loader.load(&source).map_err(|err| {
            tracing::warn!(error = %err, "failed to load document");
            err
        })?;

        let pipeline = match RenderPipeline::new(backends.rasterizer, config.render_workers) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                backends.loader.close(loaded.handle);
                return Err(SessionError::Workers(err));
            }
        };

        let scale = clamp_scale(config.initial_scale).unwrap_or(1.0);
        let pages = loaded
            .pages
            .iter()
            .enumerate()
            .map(|(index, handle)| Page::new(index, *handle, scale))
            .collect();
        let controller =
            ToolController::new(config.tools.clone(), config.hit_tolerance, backends.clock);

        let mut session = Self {
            document: loaded.handle,
            title: loaded.title,
            loader: backends.loader,
            pipeline,
            pages,
            scale,
            controller,
            history: History::new(config.history_limit),
            pending: None,
            config,
            closed: false,
        };
        tracing::info!(pages = session.pages.len(), scale, "document opened");
        session.render_all();
        Ok(session)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn surface(&self, index: usize) -> Option<&AnnotationSurface> {
        self.pages.get(index).map(Page::surface)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn render_all(&mut self) {
        for page in &mut self.pages {
            let request = page.begin_render(self.scale);
            self.pipeline.submit(request);
        }
    }

    // Zoom

    /// Change the zoom scale, clamped to the supported range.
    ///
    /// NaN is ignored. Annotations keep their page coordinates; every page
    /// is re-rendered at the new scale. Returns the effective scale.
    pub fn set_scale(&mut self, scale: f32) -> f32 {
        if self.closed {
            return self.scale;
        }
        let Some(scale) = clamp_scale(scale) else {
            tracing::debug!("ignoring invalid scale");
            return self.scale;
        };
        if scale == self.scale {
            return scale;
        }

        tracing::debug!(from = self.scale, to = scale, "scale changed");
        self.scale = scale;
        self.render_all();
        scale
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_scale(self.scale + self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_scale(self.scale - self.config.zoom_step)
    }

    // Tools

    pub fn tool_state(&self) -> &ToolState {
        self.controller.state()
    }

    /// Switch the active tool.
    ///
    /// A gesture still in progress is committed under the tool it started
    /// with; its outcome is returned.
    pub fn set_tool(&mut self, tool: Tool) -> ToolOutcome {
        let outcome = self.settle_gesture();
        if self.controller.set_tool(tool) {
            for page in &mut self.pages {
                page.surface.set_selection(None);
            }
        }
        outcome
    }

    pub fn set_formatting(&mut self, formatting: TextStyle) {
        self.controller.set_formatting(formatting);
    }

    /// Object the gesture in progress would commit, with its page
    pub fn gesture_preview(&self) -> Option<(usize, AnnotationObject)> {
        self.controller.preview().map(|(page, object)| (page as usize, object))
    }

    // Pointer events, in view pixels of the target page

    pub fn pointer_down(&mut self, page: usize, x: f32, y: f32) -> ToolOutcome {
        if self.closed {
            return ToolOutcome::Idle;
        }
        if page >= self.pages.len() {
            tracing::debug!(page, "pointer down outside the document");
            return ToolOutcome::Idle;
        }
        self.settle_gesture();

        let Some(target) = self.pages.get_mut(page) else {
            return ToolOutcome::Idle;
        };
        let snapshot = target.surface.snapshot();
        let outcome = self.controller.pointer_down(&mut target.surface, target.scale, x, y);

        if self.controller.tool() == Tool::Select {
            self.clear_selections_except(page);
        }
        if self.controller.active_page().is_some() {
            self.pending = Some((page, snapshot));
        } else if outcome.is_mutation() {
            self.history.record(page, snapshot);
        }
        outcome
    }

    /// Pointer dragged; applies to the page the gesture started on.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> ToolOutcome {
        let Some(target) = self.gesture_page().and_then(|index| self.pages.get_mut(index)) else {
            return ToolOutcome::Idle;
        };
        self.controller.pointer_move(&mut target.surface, target.scale, x, y)
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) -> ToolOutcome {
        let Some(target) = self.gesture_page().and_then(|index| self.pages.get_mut(index)) else {
            return ToolOutcome::Idle;
        };
        let outcome = self.controller.pointer_up(&mut target.surface, target.scale, x, y);
        self.record_gesture(&outcome);
        outcome
    }

    fn gesture_page(&self) -> Option<usize> {
        if self.closed {
            return None;
        }
        self.controller.active_page().map(|page| page as usize)
    }

    /// Commit the gesture in progress, if any.
    fn settle_gesture(&mut self) -> ToolOutcome {
        let Some(page) = self.controller.active_page() else {
            return ToolOutcome::Idle;
        };
        let outcome = match self.pages.get_mut(page as usize) {
            Some(target) => self.controller.finish(&mut target.surface),
            None => {
                self.controller.cancel();
                ToolOutcome::Idle
            }
        };
        self.record_gesture(&outcome);
        outcome
    }

    fn record_gesture(&mut self, outcome: &ToolOutcome) {
        if let Some((page, snapshot)) = self.pending.take() {
            if outcome.is_mutation() {
                self.history.record(page, snapshot);
            }
        }
    }

    fn clear_selections_except(&mut self, keep: usize) {
        for page in self.pages.iter_mut().filter(|page| page.index != keep) {
            page.surface.set_selection(None);
        }
    }

    // Direct object API

    fn page_mut(&mut self, index: usize) -> Result<&mut Page, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.pages.get_mut(index).ok_or(SessionError::UnknownPage(index))
    }

    pub fn add_object(&mut self, page: usize, object: AnnotationObject) -> Result<ObjectId, SessionError> {
        self.settle_gesture();
        let target = self.page_mut(page)?;
        let snapshot = target.surface.snapshot();
        let id = target.surface.add_object(object);
        self.history.record(page, snapshot);
        Ok(id)
    }

    /// Remove an object. Unknown ids are a no-op and return `Ok(None)`.
    pub fn remove_object(&mut self, page: usize, id: ObjectId) -> Result<Option<AnnotationObject>, SessionError> {
        self.settle_gesture();
        let target = self.page_mut(page)?;
        if !target.surface.contains(id) {
            return Ok(None);
        }
        let snapshot = target.surface.snapshot();
        let removed = target.surface.remove_object(id);
        self.history.record(page, snapshot);
        Ok(removed)
    }

    /// Select an object on `page`, clearing selection everywhere else.
    pub fn set_selection(&mut self, page: usize, id: Option<ObjectId>) -> Result<Option<ObjectId>, SessionError> {
        let selected = self.page_mut(page)?.surface.set_selection(id);
        self.clear_selections_except(page);
        Ok(selected)
    }

    /// Current selection and its page
    pub fn selection(&self) -> Option<(usize, ObjectId)> {
        self.pages
            .iter()
            .find_map(|page| page.surface.selection().map(|id| (page.index, id)))
    }

    pub fn delete_selection(&mut self) -> Option<AnnotationObject> {
        let (page, id) = self.selection()?;
        self.remove_object(page, id).ok().flatten()
    }

    /// Replace the content of a text object. Returns false for other objects.
    pub fn edit_text(&mut self, page: usize, id: ObjectId, content: impl Into<String>) -> Result<bool, SessionError> {
        self.settle_gesture();
        let target = self.page_mut(page)?;
        if !matches!(target.surface.get(id), Some(AnnotationObject::Text { .. })) {
            return Ok(false);
        }
        let snapshot = target.surface.snapshot();
        let changed = target.surface.set_text(id, content);
        self.history.record(page, snapshot);
        Ok(changed)
    }

    /// Stamp a signature, centered on where the signature tool was last
    /// used, or on the first page when it was not.
    pub fn place_signature(&mut self, asset: &SignatureAsset) -> Result<(usize, ObjectId), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let (page, center) = match self.controller.signature_anchor() {
            Some((page, anchor)) => (page as usize, anchor),
            None => {
                let first = self.pages.first().ok_or(SessionError::UnknownPage(0))?;
                let size = first.handle.size;
                (0, PagePoint::new(size.width_pt / 2.0, size.height_pt / 2.0))
            }
        };

        let stamp_scale = self.config.tools.stamp_scale;
        let (width, height) = asset.preview.dimensions();
        let origin = PagePoint::new(
            center.x - width as f32 * stamp_scale / 2.0,
            center.y - height as f32 * stamp_scale / 2.0,
        );
        let source = StampSource::from_asset(asset.id, Arc::clone(&asset.preview));
        let id = self.add_object(page, AnnotationObject::stamp(origin, stamp_scale, source))?;
        self.controller.clear_signature_anchor();

        tracing::info!(page, asset = %asset.id, "signature placed");
        Ok((page, id))
    }

    // History

    /// Undo the last mutation. Returns the page it touched.
    pub fn undo(&mut self) -> Option<usize> {
        self.settle_gesture();
        let pages = &mut self.pages;
        self.history.undo(|page, snapshot| swap_surface(pages, page, snapshot))
    }

    pub fn redo(&mut self) -> Option<usize> {
        self.settle_gesture();
        let pages = &mut self.pages;
        self.history.redo(|page, snapshot| swap_surface(pages, page, snapshot))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // Renders

    /// Apply every finished render. Returns how many were applied.
    pub fn poll_renders(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.pipeline.try_recv() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_completion(&mut self, completion: RenderCompletion) -> bool {
        if self.closed {
            return false;
        }
        match self.pages.get_mut(completion.page) {
            Some(page) => page.apply(completion),
            None => false,
        }
    }

    /// Block until every page has a raster or a render error.
    ///
    /// Returns false if `timeout` passed first.
    pub fn wait_for_renders(&mut self, timeout: Duration) -> bool {
        if self.closed {
            return false;
        }
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.poll_renders();
            if self.pages.iter().all(Page::is_settled) {
                return true;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return false;
            }
            if let Some(completion) = self.pipeline.recv_timeout(remaining) {
                self.apply_completion(completion);
            }
        }
    }

    // Export

    /// Flatten every page onto its raster.
    ///
    /// Waits for outstanding renders first. A failing page does not stop
    /// the others; its error carries the page index. Only committed objects
    /// are exported.
    pub fn export(&mut self) -> Vec<Result<PageBitmap, ExportError>> {
        if self.closed {
            return (0..self.pages.len())
                .map(|index| Err(ExportError::new(index, ExportErrorKind::Closed)))
                .collect();
        }
        if !self.wait_for_renders(self.config.render_timeout()) {
            tracing::warn!("export timed out waiting for page renders");
        }
        self.pages.iter().map(Page::export).collect()
    }

    fn export_all(&mut self) -> Result<Vec<PageBitmap>, SaveError> {
        if self.closed {
            return Err(SaveError::Closed);
        }
        let pages = self.export().into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Export and hand every page to `sink`. Nothing reaches the sink if
    /// any page fails.
    pub fn save(&mut self, sink: &mut dyn ExportSink) -> Result<usize, SaveError> {
        let pages = self.export_all()?;
        sink.persist(&pages)?;
        tracing::info!(pages = pages.len(), "document saved");
        Ok(pages.len())
    }

    pub fn download(&mut self, sink: &mut dyn ExportSink, filename: &str) -> Result<usize, SaveError> {
        let pages = self.export_all()?;
        sink.download_as_file(&pages, filename)?;
        tracing::info!(pages = pages.len(), filename, "document downloaded");
        Ok(pages.len())
    }

    /// Cancel renders, release every page and close the document.
    ///
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.controller.cancel();
        self.pending = None;
        for page in &mut self.pages {
            page.close();
        }
        self.loader.close(self.document);
        self.closed = true;
        tracing::info!("document closed");
    }
}

impl Drop for DocumentEditorSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn swap_surface(pages: &mut [Page], page: usize, snapshot: SurfaceSnapshot) -> Option<SurfaceSnapshot> {
    let surface = &mut pages.get_mut(page)?.surface;
    let current = surface.snapshot();
    surface.restore(snapshot);
    Some(current)
}
