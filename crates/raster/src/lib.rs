//! Page rasterization and document loading for the annotation surface.
//!
//! A [`DocumentLoader`] turns a source (file path or bytes) into a
//! [`LoadedDocument`]: an opaque handle plus one [`PageHandle`] per page.
//! A [`PageRasterizer`] turns a page handle and a zoom scale into an RGBA
//! [`Bitmap`]. Rasterizers keep no per-call resources, so a page can be
//! re-rendered whenever the zoom changes.

mod lopdf_backend;
mod memory;

use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};

pub use lopdf_backend::LopdfBackend;
pub use memory::InMemoryBackend;

/// RGBA8 page bitmap, row-major, straight alpha.
pub type Bitmap = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Smallest zoom scale a rasterizer accepts.
pub const MIN_SCALE: f32 = 0.5;

/// Largest zoom scale a rasterizer accepts.
pub const MAX_SCALE: f32 = 3.0;

/// US Letter, used when a page carries no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAPER_EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Clamp a requested zoom into `[MIN_SCALE, MAX_SCALE]`.
///
/// Returns `None` for NaN, which callers treat as "no change".
pub fn clamp_scale(scale: f32) -> Option<f32> {
    if scale.is_nan() {
        return None;
    }
    Some(scale.clamp(MIN_SCALE, MAX_SCALE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in points (unscaled page space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }

    /// Pixel dimensions of this page rendered at `scale`.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        let width = (self.width_pt * scale).round().max(1.0) as u32;
        let height = (self.height_pt * scale).round().max(1.0) as u32;
        (width, height)
    }

    fn is_degenerate(&self) -> bool {
        !(self.width_pt.is_finite() && self.height_pt.is_finite())
            || self.width_pt <= 0.0
            || self.height_pt <= 0.0
    }
}

/// Opaque reference to one page of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    pub document: DocumentHandle,
    pub index: u32,
    pub size: PageSize,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub handle: DocumentHandle,
    pub title: Option<String>,
    pub pages: Vec<PageHandle>,
}

impl LoadedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&PageHandle> {
        self.pages.get(index)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode document: {0}")]
    Decode(String),
    #[error("document has no pages")]
    Empty,
    #[error("encrypted documents are not supported")]
    EncryptedUnsupported,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("unknown document handle {0}")]
    UnknownDocument(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("scale {0} outside supported range [0.5, 3.0]")]
    ScaleOutOfRange(f32),
    #[error("page {page} has a degenerate size")]
    DegeneratePage { page: u32 },
    #[error("failed to decode page {page}: {reason}")]
    Decode { page: u32, reason: String },
}

/// Source of page handles.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, source: &OpenSource) -> Result<LoadedDocument, LoadError>;

    /// Release backend state for a document. Unknown handles are ignored.
    fn close(&self, _handle: DocumentHandle) {}
}

/// Decodes one page into a bitmap.
///
/// Implementations must be callable from worker threads and must not keep
/// anything from one call to the next.
pub trait PageRasterizer: Send + Sync {
    fn render(&self, page: &PageHandle, scale: f32) -> Result<Bitmap, RenderError>;
}

/// Shared argument checks for rasterizer backends.
pub(crate) fn check_request(
    page: &PageHandle,
    page_count: usize,
    scale: f32,
) -> Result<(), RenderError> {
    if page.index as usize >= page_count {
        return Err(RenderError::PageOutOfRange {
            page: page.index,
            page_count: page_count as u32,
        });
    }
    if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
        return Err(RenderError::ScaleOutOfRange(scale));
    }
    if page.size.is_degenerate() {
        return Err(RenderError::DegeneratePage { page: page.index });
    }
    Ok(())
}

/// Blank paper with a light edge, sized to the page at `scale`.
pub(crate) fn paper_bitmap(size: PageSize, scale: f32) -> Bitmap {
    let (width, height) = size.pixel_size(scale);
    let mut image = Bitmap::from_pixel(width, height, PAPER);

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, PAPER_EDGE);
            image.put_pixel(x, height - 1, PAPER_EDGE);
        }
        for y in 0..height {
            image.put_pixel(0, y, PAPER_EDGE);
            image.put_pixel(width - 1, y, PAPER_EDGE);
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_scale_bounds() {
        assert_eq!(clamp_scale(0.1), Some(MIN_SCALE));
        assert_eq!(clamp_scale(10.0), Some(MAX_SCALE));
        assert_eq!(clamp_scale(1.25), Some(1.25));
        assert_eq!(clamp_scale(f32::INFINITY), Some(MAX_SCALE));
        assert_eq!(clamp_scale(f32::NAN), None);
    }

    #[test]
    fn pixel_size_rounds_and_never_collapses() {
        let size = PageSize::new(200.0, 100.0);
        assert_eq!(size.pixel_size(1.5), (300, 150));
        assert_eq!(PageSize::new(0.2, 0.2).pixel_size(0.5), (1, 1));
    }

    #[test]
    fn paper_has_light_edge_and_white_interior() {
        let image = paper_bitmap(PageSize::new(20.0, 10.0), 1.0);
        assert_eq!(image.dimensions(), (20, 10));
        assert_eq!(*image.get_pixel(0, 0), PAPER_EDGE);
        assert_eq!(*image.get_pixel(10, 5), PAPER);
    }

    #[test]
    fn request_checks_reject_bad_scale_and_index() {
        let page = PageHandle {
            document: DocumentHandle::new(1),
            index: 2,
            size: PageSize::new(100.0, 100.0),
        };
        assert_eq!(
            check_request(&page, 2, 1.0),
            Err(RenderError::PageOutOfRange { page: 2, page_count: 2 })
        );
        assert_eq!(check_request(&page, 3, 3.5), Err(RenderError::ScaleOutOfRange(3.5)));
        assert!(check_request(&page, 3, 3.0).is_ok());
    }
}
