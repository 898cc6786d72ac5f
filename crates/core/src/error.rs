//! Session error types

use crate::config::ConfigError;
use crate::flatten::CompositeError;
use crate::sink::SinkError;
use inkseal_raster::{LoadError, RenderError};
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load document: {0}")]
    Load(#[from] LoadError),
    #[error("invalid editor config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to start render workers: {0}")]
    Workers(#[from] io::Error),
    #[error("page {0} does not exist")]
    UnknownPage(usize),
    #[error("session is closed")]
    Closed,
}

/// Export failure for one page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to export page {page}: {kind}")]
pub struct ExportError {
    pub page: usize,
    #[source]
    pub kind: ExportErrorKind,
}

impl ExportError {
    pub fn new(page: usize, kind: ExportErrorKind) -> Self {
        Self { page, kind }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportErrorKind {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("page was not rendered in time")]
    NotRendered,
    #[error("flatten failed: {0}")]
    Composite(#[from] CompositeError),
    #[error("session is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("export sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("session is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_names_page() {
        let err = ExportError::new(3, ExportErrorKind::Render(RenderError::DegeneratePage { page: 3 }));
        let message = err.to_string();
        assert!(message.contains("page 3"), "{message}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_save_error_is_transparent_for_export() {
        let err = SaveError::from(ExportError::new(1, ExportErrorKind::NotRendered));
        assert_eq!(err.to_string(), "failed to export page 1: page was not rendered in time");
    }
}
