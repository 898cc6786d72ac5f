use crate::StorageError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use inkseal_core::{validate_filename, ExportSink, PageBitmap, SinkError};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Encode flattened pages as a PDF with one full-page image per page.
///
/// Each page's MediaBox is its bitmap size divided by the render scale, so
/// the output keeps the source document's page size. Transparent pixels
/// are composited over white.
pub fn encode_pdf(pages: &[PageBitmap]) -> Result<Vec<u8>, StorageError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let (width, height) = page.image.dimensions();
        let scale = if page.scale > 0.0 { page.scale } else { 1.0 };
        let width_pt = width as f32 / scale;
        let height_pt = height as f32 / scale;

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&rgb_over_white(page))?,
        );
        let image_id = doc.add_object(image);

        let content = format!("q {width_pt} 0 0 {height_pt} 0 0 cm /Im0 Do Q");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width_pt), Object::Real(height_pt)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn rgb_over_white(page: &PageBitmap) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(page.image.as_raw().len() / 4 * 3);
    for pixel in page.image.pixels() {
        let alpha = u16::from(pixel[3]);
        for channel in &pixel.0[..3] {
            let blended = (u16::from(*channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Writes all pages into a single PDF file
///
/// `persist` writes to the configured path; `download_as_file` writes the
/// named file next to it.
#[derive(Debug, Clone)]
pub struct PdfSink {
    path: PathBuf,
    last_written: Option<PathBuf>,
}

impl PdfSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), last_written: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }

    fn write(&mut self, pages: &[PageBitmap], path: PathBuf) -> Result<(), SinkError> {
        if pages.is_empty() {
            return Err(SinkError::NoPages);
        }
        let bytes = encode_pdf(pages)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), pages = pages.len(), "PDF written");
        self.last_written = Some(path);
        Ok(())
    }
}

impl ExportSink for PdfSink {
    fn persist(&mut self, pages: &[PageBitmap]) -> Result<(), SinkError> {
        let path = self.path.clone();
        self.write(pages, path)
    }

    fn download_as_file(&mut self, pages: &[PageBitmap], filename: &str) -> Result<(), SinkError> {
        let filename = validate_filename(filename)?;
        let path = match self.path.parent() {
            Some(parent) => parent.join(filename),
            None => PathBuf::from(filename),
        };
        self.write(pages, path)
    }
}
