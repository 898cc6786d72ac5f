//! Signature capture and the signature library
//!
//! A [`SignatureCapture`] is a small drawing (or typing) canvas that turns
//! user input into a [`SignatureAsset`]. Finishing or cancelling consumes
//! the capture, so its canvas is released on every exit path.

use crate::config::{SignatureCaptureConfig, ToolDefaults};
use crate::controller::ToolController;
use crate::flatten::CompositeError;
use crate::geometry::PagePoint;
use crate::glyphs;
use crate::object::{AnnotationObject, TextStyle};
use crate::surface::AnnotationSurface;
use crate::tool::{Clock, SystemClock, Tool};
use chrono::{DateTime, Utc};
use image::Rgba;
use inkseal_raster::Bitmap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

/// Font family recorded on typed signatures
const TYPED_FONT_FAMILY: &str = "Dancing Script";

/// How the user is entering a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Draw,
    Type,
}

/// How a stored signature was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMethod {
    Drawn,
    Typed,
}

impl From<CaptureMode> for SignatureMethod {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Draw => SignatureMethod::Drawn,
            CaptureMode::Type => SignatureMethod::Typed,
        }
    }
}

/// Finished signature image
///
/// Placed on pages as image stamps, which share the preview bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureAsset {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub preview: Arc<Bitmap>,
    pub method: SignatureMethod,
}

impl SignatureAsset {
    pub fn new(preview: Bitmap, method: SignatureMethod, created_at: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(), created_at, preview: Arc::new(preview), method }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("signature store I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode signature: {0}")]
    Encode(String),
    #[error("signature store is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("nothing was drawn or typed")]
    Empty,
    #[error("failed to render signature: {0}")]
    Composite(#[from] CompositeError),
    #[error("failed to store signature: {0}")]
    Store(#[from] StoreError),
}

/// Library of saved signatures
pub trait SignatureStore {
    /// Saved signatures, oldest first
    fn list(&self) -> Result<Vec<SignatureAsset>, StoreError>;

    fn save(&mut self, preview: Bitmap, method: SignatureMethod) -> Result<SignatureAsset, StoreError>;

    /// Remove a signature. Returns false when the id was not stored.
    fn delete(&mut self, id: Uuid) -> Result<bool, StoreError>;
}

/// Signature library that lives as long as the process
pub struct InMemorySignatureStore {
    assets: HashMap<Uuid, SignatureAsset>,
    order: Vec<Uuid>,
    clock: Arc<dyn Clock>,
}

impl InMemorySignatureStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { assets: HashMap::new(), order: Vec::new(), clock }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for InMemorySignatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureStore for InMemorySignatureStore {
    fn list(&self) -> Result<Vec<SignatureAsset>, StoreError> {
        Ok(self.order.iter().filter_map(|id| self.assets.get(id).cloned()).collect())
    }

    fn save(&mut self, preview: Bitmap, method: SignatureMethod) -> Result<SignatureAsset, StoreError> {
        let asset = SignatureAsset::new(preview, method, self.clock.now());
        self.order.push(asset.id);
        self.assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool, StoreError> {
        if self.assets.remove(&id).is_none() {
            return Ok(false);
        }
        self.order.retain(|existing| *existing != id);
        Ok(true)
    }
}

/// Transient canvas for drawing or typing a signature
pub struct SignatureCapture {
    mode: CaptureMode,
    config: SignatureCaptureConfig,
    surface: AnnotationSurface,
    controller: ToolController,
    typed: String,
    clock: Arc<dyn Clock>,
}

impl SignatureCapture {
    pub fn new(mode: CaptureMode, config: SignatureCaptureConfig) -> Self {
        Self::with_clock(mode, config, Arc::new(SystemClock))
    }

    pub fn with_clock(mode: CaptureMode, config: SignatureCaptureConfig, clock: Arc<dyn Clock>) -> Self {
        let defaults = ToolDefaults {
            ink_color: config.color,
            ink_width: config.ink_width,
            ..ToolDefaults::default()
        };
        let mut controller = ToolController::new(defaults, 0.0, Arc::clone(&clock));
        controller.set_tool(Tool::Draw);

        Self {
            mode,
            config,
            surface: AnnotationSurface::new(0),
            controller,
            typed: String::new(),
            clock,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Canvas size in pixels
    pub fn canvas_size(&self) -> (u32, u32) {
        match self.mode {
            CaptureMode::Draw => (self.config.draw_width, self.config.draw_height),
            CaptureMode::Type => (self.config.type_width, self.config.type_height),
        }
    }

    /// Start a stroke at canvas pixel `(x, y)`. Ignored in type mode.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.mode == CaptureMode::Draw {
            self.controller.pointer_down(&mut self.surface, 1.0, x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.mode == CaptureMode::Draw {
            self.controller.pointer_move(&mut self.surface, 1.0, x, y);
        }
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) {
        if self.mode == CaptureMode::Draw {
            self.controller.pointer_up(&mut self.surface, 1.0, x, y);
        }
    }

    /// Set the typed name. Ignored in draw mode.
    pub fn set_name(&mut self, name: impl Into<String>) {
        if self.mode == CaptureMode::Type {
            self.typed = name.into();
        }
    }

    pub fn name(&self) -> &str {
        &self.typed
    }

    pub fn clear(&mut self) {
        self.controller.cancel();
        self.surface.clear();
        self.typed.clear();
    }

    pub fn is_empty(&self) -> bool {
        match self.mode {
            CaptureMode::Draw => self.surface.is_empty() && self.controller.preview().is_none(),
            CaptureMode::Type => !self.typed.chars().any(glyphs::is_drawable),
        }
    }

    /// Render the current canvas, including a stroke still being drawn.
    pub fn preview(&self) -> Result<Bitmap, CaptureError> {
        let (width, height) = self.canvas_size();
        let canvas = Bitmap::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        let mut surface = self.surface.clone();
        match self.mode {
            CaptureMode::Draw => {
                if let Some((_, stroke)) = self.controller.preview() {
                    surface.add_object(stroke);
                }
            }
            CaptureMode::Type => {
                if let Some(text) = self.typed_object() {
                    surface.add_object(text);
                }
            }
        }

        Ok(surface.flatten(&canvas, 1.0)?)
    }

    /// Name centered on the canvas in italic
    fn typed_object(&self) -> Option<AnnotationObject> {
        let name = self.typed.trim();
        if name.is_empty() {
            return None;
        }

        let style = TextStyle {
            color: self.config.color,
            font_family: TYPED_FONT_FAMILY.to_owned(),
            font_size: self.config.type_font_size,
            bold: false,
            italic: true,
            underline: false,
        };
        let metrics = style.metrics();
        let (width, height) = self.canvas_size();
        let origin = PagePoint::new(
            (width as f32 - metrics.measure(name)) / 2.0,
            (height as f32 - metrics.line_height) / 2.0,
        );
        Some(AnnotationObject::text(origin, name, style, 0.0))
    }

    /// Finish without storing the result.
    pub fn finish(mut self) -> Result<SignatureAsset, CaptureError> {
        self.controller.finish(&mut self.surface);
        if self.is_empty() {
            return Err(CaptureError::Empty);
        }
        let preview = self.preview()?;
        Ok(SignatureAsset::new(preview, self.mode.into(), self.clock.now()))
    }

    /// Finish and save the result into `store`.
    pub fn finish_into(mut self, store: &mut dyn SignatureStore) -> Result<SignatureAsset, CaptureError> {
        self.controller.finish(&mut self.surface);
        if self.is_empty() {
            return Err(CaptureError::Empty);
        }
        let preview = self.preview()?;
        let asset = store.save(preview, self.mode.into())?;
        tracing::info!(id = %asset.id, method = ?asset.method, "signature saved");
        Ok(asset)
    }

    /// Discard the capture.
    pub fn cancel(self) {
        tracing::debug!(mode = ?self.mode, "signature capture cancelled");
    }
}

/// Typed signature in one call, as used by scripted sessions
pub fn typed_signature(name: &str, config: &SignatureCaptureConfig) -> Result<SignatureAsset, CaptureError> {
    let mut capture = SignatureCapture::new(CaptureMode::Type, config.clone());
    capture.set_name(name);
    capture.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FixedClock;
    use chrono::TimeZone;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).single().expect("valid instant")))
    }

    fn is_inked(pixel: &Rgba<u8>) -> bool {
        pixel[0] != 255 || pixel[1] != 255 || pixel[2] != 255
    }

    fn inked_pixels(bitmap: &Bitmap) -> usize {
        bitmap.pixels().filter(|pixel| is_inked(pixel)).count()
    }

    #[test]
    fn test_empty_capture_refuses_to_finish() {
        let capture = SignatureCapture::new(CaptureMode::Draw, SignatureCaptureConfig::default());
        assert!(capture.is_empty());
        assert!(matches!(capture.finish(), Err(CaptureError::Empty)));

        let mut typed = SignatureCapture::new(CaptureMode::Type, SignatureCaptureConfig::default());
        typed.set_name("   ");
        let mut store = InMemorySignatureStore::new();
        assert!(matches!(typed.finish_into(&mut store), Err(CaptureError::Empty)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_drawn_signature_has_canvas_size_and_ink() {
        let mut capture =
            SignatureCapture::with_clock(CaptureMode::Draw, SignatureCaptureConfig::default(), clock());
        capture.pointer_down(50.0, 100.0);
        capture.pointer_move(150.0, 60.0);
        capture.pointer_up(300.0, 120.0);
        assert!(!capture.is_empty());

        let asset = capture.finish().expect("finish");
        assert_eq!(asset.preview.dimensions(), (400, 200));
        assert_eq!(asset.method, SignatureMethod::Drawn);
        assert_eq!(asset.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap());
        assert!(inked_pixels(&asset.preview) > 100);
    }

    #[test]
    fn test_unfinished_stroke_counts_as_content() {
        let mut capture = SignatureCapture::new(CaptureMode::Draw, SignatureCaptureConfig::default());
        capture.pointer_down(10.0, 10.0);
        capture.pointer_move(60.0, 40.0);

        assert!(!capture.is_empty());
        assert!(inked_pixels(&capture.preview().expect("preview")) > 0);
        assert!(capture.finish().is_ok());
    }

    #[test]
    fn test_typed_signature_is_centered() {
        let mut capture = SignatureCapture::new(CaptureMode::Type, SignatureCaptureConfig::default());
        capture.pointer_down(1.0, 1.0);
        capture.set_name("Jane Roe");
        let preview = capture.preview().expect("preview");

        assert_eq!(preview.dimensions(), (400, 100));
        let inked: Vec<u32> = preview
            .enumerate_pixels()
            .filter(|(_, _, pixel)| is_inked(pixel))
            .map(|(x, _, _)| x)
            .collect();
        let min = inked.iter().copied().min().expect("some ink");
        let max = inked.iter().copied().max().expect("some ink");
        let left_margin = min as i64;
        let right_margin = 399 - max as i64;
        assert!((left_margin - right_margin).abs() < 40, "margins {left_margin} / {right_margin}");
    }

    #[test]
    fn test_clear_discards_input() {
        let mut capture = SignatureCapture::new(CaptureMode::Draw, SignatureCaptureConfig::default());
        capture.pointer_down(10.0, 10.0);
        capture.pointer_up(40.0, 40.0);
        capture.clear();
        assert!(capture.is_empty());
        capture.cancel();
    }

    #[test]
    fn test_finish_into_saves_in_store() {
        let mut store = InMemorySignatureStore::with_clock(clock());
        let mut capture = SignatureCapture::new(CaptureMode::Type, SignatureCaptureConfig::default());
        capture.set_name("J. Doe");

        let asset = capture.finish_into(&mut store).expect("finish");
        let listed = store.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, asset.id);
        assert_eq!(listed[0].method, SignatureMethod::Typed);
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let mut store = InMemorySignatureStore::new();
        let first = store.save(Bitmap::new(2, 2), SignatureMethod::Drawn).expect("save");
        let second = store.save(Bitmap::new(2, 2), SignatureMethod::Typed).expect("save");

        assert!(store.delete(first.id).expect("delete"));
        assert!(!store.delete(first.id).expect("delete"));
        let ids: Vec<Uuid> = store.list().expect("list").iter().map(|asset| asset.id).collect();
        assert_eq!(ids, vec![second.id]);
    }

    #[test]
    fn test_name_without_drawable_glyphs_is_empty() {
        let mut store = InMemorySignatureStore::new();
        let mut capture = SignatureCapture::new(CaptureMode::Type, SignatureCaptureConfig::default());
        capture.set_name("王小明");

        assert!(capture.is_empty());
        assert!(matches!(capture.finish_into(&mut store), Err(CaptureError::Empty)));
        assert!(store.is_empty());
        assert!(matches!(
            typed_signature("王小明", &SignatureCaptureConfig::default()),
            Err(CaptureError::Empty)
        ));
    }

    #[test]
    fn test_typed_signature_helper() {
        let asset = typed_signature("Ada", &SignatureCaptureConfig::default()).expect("signature");
        assert_eq!(asset.method, SignatureMethod::Typed);
        assert!(matches!(
            typed_signature("", &SignatureCaptureConfig::default()),
            Err(CaptureError::Empty)
        ));
    }
}
