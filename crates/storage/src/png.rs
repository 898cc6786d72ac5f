use crate::StorageError;
use inkseal_core::{validate_filename, ExportSink, PageBitmap, SinkError};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one PNG per page into a directory
///
/// `persist` names files `<stem>-001.png`, `<stem>-002.png` and so on.
/// `download_as_file` uses the given file name as the stem, or the exact
/// name when there is a single page.
#[derive(Debug, Clone)]
pub struct PngDirectorySink {
    dir: PathBuf,
    stem: String,
    written: Vec<PathBuf>,
}

impl PngDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), stem: "page".to_owned(), written: Vec::new() }
    }

    pub fn with_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = stem.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written by the last call
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_pages(&mut self, pages: &[PageBitmap], stem: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut written = Vec::with_capacity(pages.len());
        for page in pages {
            let path = self.dir.join(format!("{stem}-{:03}.png", page.index + 1));
            page.image.save(&path)?;
            written.push(path);
        }
        self.written = written;
        Ok(())
    }
}

impl ExportSink for PngDirectorySink {
    fn persist(&mut self, pages: &[PageBitmap]) -> Result<(), SinkError> {
        if pages.is_empty() {
            return Err(SinkError::NoPages);
        }
        let stem = self.stem.clone();
        self.write_pages(pages, &stem)?;
        tracing::info!(dir = %self.dir.display(), pages = pages.len(), "pages written as PNG");
        Ok(())
    }

    fn download_as_file(&mut self, pages: &[PageBitmap], filename: &str) -> Result<(), SinkError> {
        let filename = validate_filename(filename)?;
        match pages {
            [] => Err(SinkError::NoPages),
            [page] => {
                fs::create_dir_all(&self.dir)?;
                let path = self.dir.join(filename);
                page.image.save(&path).map_err(StorageError::from)?;
                tracing::info!(path = %path.display(), "page written as PNG");
                self.written = vec![path];
                Ok(())
            }
            _ => {
                let stem = Path::new(filename)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.stem.clone());
                self.write_pages(pages, &stem)?;
                Ok(())
            }
        }
    }
}
