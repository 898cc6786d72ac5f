use crate::{
    check_request, paper_bitmap, Bitmap, DocumentHandle, DocumentLoader, LoadError,
    LoadedDocument, OpenSource, PageHandle, PageRasterizer, PageSize, RenderError,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Blueprint {
    sizes: Vec<PageSize>,
    failing_pages: HashSet<u32>,
}

/// Loader and rasterizer for documents described only by their page sizes.
///
/// Documents are registered under a path and opened with
/// [`OpenSource::Path`]. Pages can be marked as failing and renders can be
/// slowed down, which makes this backend useful for exercising the render
/// pipeline without real files.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    blueprints: RwLock<HashMap<PathBuf, Blueprint>>,
    open: RwLock<HashMap<DocumentHandle, Blueprint>>,
    next_handle: AtomicU64,
    render_delay: Option<Duration>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every render call.
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    /// Register a document under `path`.
    pub fn with_document(self, path: impl Into<PathBuf>, sizes: Vec<PageSize>) -> Self {
        self.register(path, sizes);
        self
    }

    pub fn register(&self, path: impl Into<PathBuf>, sizes: Vec<PageSize>) {
        let mut blueprints = self.blueprints.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        blueprints.insert(path.into(), Blueprint { sizes, failing_pages: HashSet::new() });
    }

    /// Make every render of `page` in documents opened from `path` fail.
    pub fn fail_page(&self, path: impl AsRef<Path>, page: u32) {
        let mut blueprints = self.blueprints.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(blueprint) = blueprints.get_mut(path.as_ref()) {
            blueprint.failing_pages.insert(page);
        }
    }

    pub fn open_documents(&self) -> usize {
        self.open.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

impl DocumentLoader for InMemoryBackend {
    fn load(&self, source: &OpenSource) -> Result<LoadedDocument, LoadError> {
        let path = match source {
            OpenSource::Path(path) => path,
            OpenSource::Bytes(_) => {
                return Err(LoadError::Decode("in-memory backend cannot decode bytes".to_owned()))
            }
        };

        let blueprint = {
            let blueprints = self.blueprints.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            blueprints.get(path).cloned().ok_or_else(|| LoadError::NotFound(path.clone()))?
        };
        if blueprint.sizes.is_empty() {
            return Err(LoadError::Empty);
        }

        let handle = DocumentHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let pages = blueprint
            .sizes
            .iter()
            .enumerate()
            .map(|(index, size)| PageHandle { document: handle, index: index as u32, size: *size })
            .collect();

        let title = path.file_stem().map(|stem| stem.to_string_lossy().into_owned());
        let mut open = self.open.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        open.insert(handle, blueprint);

        Ok(LoadedDocument { handle, title, pages })
    }

    fn close(&self, handle: DocumentHandle) {
        let mut open = self.open.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        open.remove(&handle);
    }
}

impl PageRasterizer for InMemoryBackend {
    fn render(&self, page: &PageHandle, scale: f32) -> Result<Bitmap, RenderError> {
        let (page_count, failing) = {
            let open = self.open.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            let blueprint =
                open.get(&page.document).ok_or(RenderError::UnknownDocument(page.document.raw()))?;
            (blueprint.sizes.len(), blueprint.failing_pages.contains(&page.index))
        };
        check_request(page, page_count, scale)?;

        if let Some(delay) = self.render_delay {
            std::thread::sleep(delay);
        }

        if failing {
            return Err(RenderError::Decode {
                page: page.index,
                reason: "page marked as failing".to_owned(),
            });
        }

        Ok(paper_bitmap(page.size, scale))
    }
}
