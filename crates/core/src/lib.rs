//! Inkseal Core Library
//!
//! Annotation model and editing session for signing and marking up
//! documents. Pages are rasterized by an `inkseal-raster` backend; each page
//! carries an [`AnnotationSurface`] of vector objects in unscaled page
//! coordinates, which is flattened onto the page raster on export.

pub mod config;
pub mod controller;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod glyphs;
pub mod history;
pub mod object;
pub mod render;
pub mod session;
pub mod signature;
pub mod sink;
pub mod surface;
pub mod tool;

pub use config::{ConfigError, EditorConfig, SignatureCaptureConfig, ToolDefaults};
pub use controller::{behavior_for, GestureKind, ToolBehavior, ToolContext, ToolController, ToolOutcome};
pub use error::{ExportError, ExportErrorKind, SaveError, SessionError};
pub use flatten::{CompositeError, Compositor, SkiaCompositor};
pub use geometry::{Color, PagePoint, PageRect, ParseColorError};
pub use history::{History, HistoryEntry};
pub use object::{AnnotationObject, ObjectId, ShapeKind, StampSource, TextStyle};
pub use render::{CancellationToken, RenderCompletion, RenderPipeline, RenderRequest};
pub use session::{DocumentEditorSession, EditorBackends, Page, RasterState};
pub use signature::{
    typed_signature, CaptureError, CaptureMode, InMemorySignatureStore, SignatureAsset,
    SignatureCapture, SignatureMethod, SignatureStore, StoreError,
};
pub use sink::{validate_filename, ExportSink, MemorySink, PageBitmap, SinkError};
pub use surface::{AnnotationSurface, SurfaceSnapshot};
pub use tool::{Clock, DateFormat, FixedClock, ParseToolError, SystemClock, Tool, ToolState};

pub use inkseal_raster::Bitmap;
