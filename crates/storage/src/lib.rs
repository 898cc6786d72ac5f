//! On-disk persistence for Inkseal: the signature library and the PNG and
//! PDF export sinks.

mod pdf;
mod png;
mod signatures;

use inkseal_core::{SinkError, StoreError};

pub use pdf::{encode_pdf, PdfSink};
pub use png::PngDirectorySink;
pub use signatures::FileSignatureStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("unsupported signature index version {0}")]
    UnsupportedVersion(u32),
    #[error("signature index entry points outside the store: {0}")]
    InvalidEntry(String),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(err) => StoreError::Io(err),
            StorageError::Image(err) => StoreError::Encode(err.to_string()),
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}

impl From<StorageError> for SinkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(err) => SinkError::Io(err),
            other => SinkError::Encode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_errors_keep_their_kind() {
        let err = StorageError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(matches!(SinkError::from(err), SinkError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn version_mismatch_reads_as_corrupt_store() {
        let err = StoreError::from(StorageError::UnsupportedVersion(9));
        assert!(matches!(err, StoreError::Corrupt(message) if message.contains('9')));
    }
}
