//! Export destinations for flattened pages

use inkseal_raster::Bitmap;
use std::io;

/// One flattened page, ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct PageBitmap {
    pub index: usize,
    /// Scale the page was rendered at, pixels per page point
    pub scale: f32,
    pub image: Bitmap,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode output: {0}")]
    Encode(String),
    #[error("invalid file name {0:?}")]
    InvalidFilename(String),
    #[error("nothing to export")]
    NoPages,
}

/// Where exported pages go
///
/// Sinks receive either every page of a document or nothing: the session
/// never calls a sink after a page failed to export.
pub trait ExportSink {
    /// Store the pages at the sink's own location.
    fn persist(&mut self, pages: &[PageBitmap]) -> Result<(), SinkError>;

    /// Write the pages as a single named file.
    fn download_as_file(&mut self, pages: &[PageBitmap], filename: &str) -> Result<(), SinkError>;
}

/// Check that `filename` names a file, not a path.
pub fn validate_filename(filename: &str) -> Result<&str, SinkError> {
    let trimmed = filename.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control);
    if invalid {
        return Err(SinkError::InvalidFilename(filename.to_owned()));
    }
    Ok(trimmed)
}

/// Sink keeping everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub persisted: Vec<Vec<PageBitmap>>,
    pub downloads: Vec<(String, Vec<PageBitmap>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the sink was written to.
    pub fn calls(&self) -> usize {
        self.persisted.len() + self.downloads.len()
    }
}

impl ExportSink for MemorySink {
    fn persist(&mut self, pages: &[PageBitmap]) -> Result<(), SinkError> {
        if pages.is_empty() {
            return Err(SinkError::NoPages);
        }
        self.persisted.push(pages.to_vec());
        Ok(())
    }

    fn download_as_file(&mut self, pages: &[PageBitmap], filename: &str) -> Result<(), SinkError> {
        let filename = validate_filename(filename)?;
        if pages.is_empty() {
            return Err(SinkError::NoPages);
        }
        self.downloads.push((filename.to_owned(), pages.to_vec()));
        Ok(())
    }
}
