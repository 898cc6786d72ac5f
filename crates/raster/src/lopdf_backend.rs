use crate::{
    check_request, paper_bitmap, Bitmap, DocumentHandle, DocumentLoader, LoadError,
    LoadedDocument, OpenSource, PageHandle, PageRasterizer, PageSize, RenderError,
    DEFAULT_PAGE_SIZE,
};
use lopdf::{Dictionary, Document, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Page tree depth after which MediaBox inheritance gives up.
const MAX_INHERIT_DEPTH: usize = 32;

/// PDF backend built on lopdf.
///
/// lopdf parses the document structure but does not interpret content
/// streams, so pages are rendered as blank paper of the right size.
#[derive(Debug, Default)]
pub struct LopdfBackend {
    next_handle: AtomicU64,
    docs: RwLock<HashMap<DocumentHandle, Vec<PageSize>>>,
}

impl LopdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<(Option<String>, Vec<PageSize>), LoadError> {
        let doc = Document::load_mem(bytes).map_err(|err| LoadError::Decode(err.to_string()))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(LoadError::EncryptedUnsupported);
        }
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let size = media_box(&doc, object_id).unwrap_or(DEFAULT_PAGE_SIZE);
            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(LoadError::Empty);
        }

        Ok((document_title(&doc), sizes))
    }

    fn page_count(&self, handle: DocumentHandle) -> Option<usize> {
        let docs = self.docs.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.get(&handle).map(Vec::len)
    }
}

impl DocumentLoader for LopdfBackend {
    fn load(&self, source: &OpenSource) -> Result<LoadedDocument, LoadError> {
        let bytes = match source {
            OpenSource::Path(path) => {
                if !path.exists() {
                    return Err(LoadError::NotFound(path.clone()));
                }
                fs::read(path)?
            }
            OpenSource::Bytes(bytes) => bytes.clone(),
        };

        let (title, sizes) = Self::parse(&bytes)?;
        let handle = DocumentHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);

        let pages = sizes
            .iter()
            .enumerate()
            .map(|(index, size)| PageHandle { document: handle, index: index as u32, size: *size })
            .collect();

        let mut docs = self.docs.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.insert(handle, sizes);

        tracing::debug!(handle = handle.raw(), "loaded document with lopdf");
        Ok(LoadedDocument { handle, title, pages })
    }

    fn close(&self, handle: DocumentHandle) {
        let mut docs = self.docs.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.remove(&handle);
    }
}

impl PageRasterizer for LopdfBackend {
    fn render(&self, page: &PageHandle, scale: f32) -> Result<Bitmap, RenderError> {
        let page_count =
            self.page_count(page.document).ok_or(RenderError::UnknownDocument(page.document.raw()))?;
        check_request(page, page_count, scale)?;
        Ok(paper_bitmap(page.size, scale))
    }
}

/// Resolve the MediaBox of a page, following `/Parent` for inherited boxes.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut dict = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERIT_DEPTH {
        if let Some(size) = read_media_box(dict) {
            return Some(size);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn read_media_box(dict: &Dictionary) -> Option<PageSize> {
    let array = dict.get(b"MediaBox").ok()?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

fn document_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let title = doc.get_dictionary(info).ok()?.get(b"Title").ok()?.as_str().ok()?;
    let title = String::from_utf8_lossy(title).trim().to_owned();
    (!title.is_empty()).then_some(title)
}
