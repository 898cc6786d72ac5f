//! Editor configuration
//!
//! Every field has a default, so a configuration file only needs to list
//! the values it changes. Configuration can be loaded from a JSON file or
//! built programmatically with the `with_*` methods.

use crate::geometry::Color;
use crate::tool::DateFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Settings for a [`DocumentEditorSession`](crate::DocumentEditorSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Zoom scale pages are first rendered at
    pub initial_scale: f32,
    /// Scale change applied by zoom in / zoom out
    pub zoom_step: f32,
    /// Render worker threads; 0 renders on the calling thread
    pub render_workers: usize,
    /// Undo steps kept per session
    pub history_limit: usize,
    /// Hit-test slack around objects, in page units
    pub hit_tolerance: f32,
    /// How long export waits for outstanding page renders
    pub render_timeout_ms: u64,
    pub tools: ToolDefaults,
    pub signature: SignatureCaptureConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_scale: 1.5,
            zoom_step: 0.2,
            render_workers: 2,
            history_limit: 100,
            hit_tolerance: 4.0,
            render_timeout_ms: 30_000,
            tools: ToolDefaults::default(),
            signature: SignatureCaptureConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the editor unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_scale.is_finite() && self.initial_scale > 0.0) {
            return Err(ConfigError::InvalidValue("initial_scale".to_owned()));
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            return Err(ConfigError::InvalidValue("zoom_step".to_owned()));
        }
        if !(self.hit_tolerance.is_finite() && self.hit_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue("hit_tolerance".to_owned()));
        }
        if self.signature.draw_width == 0
            || self.signature.draw_height == 0
            || self.signature.type_width == 0
            || self.signature.type_height == 0
        {
            return Err(ConfigError::InvalidValue("signature".to_owned()));
        }
        Ok(())
    }

    pub fn with_initial_scale(mut self, scale: f32) -> Self {
        self.initial_scale = scale;
        self
    }

    pub fn with_render_workers(mut self, workers: usize) -> Self {
        self.render_workers = workers;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_hit_tolerance(mut self, tolerance: f32) -> Self {
        self.hit_tolerance = tolerance;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn with_tools(mut self, tools: ToolDefaults) -> Self {
        self.tools = tools;
        self
    }
}

/// Sizes and colors used when a tool creates an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub ink_color: Color,
    pub ink_width: f32,
    pub highlight_color: Color,
    pub redact_color: Color,
    /// Initial width and height of highlight and redact boxes
    pub marker_size: (f32, f32),
    pub placeholder_text: String,
    pub text_width: f32,
    /// Initial width and height of text boxes
    pub textbox_size: (f32, f32),
    pub textbox_padding: f32,
    pub textbox_fill: Color,
    pub textbox_border: Color,
    pub textbox_border_width: f32,
    pub date_format: DateFormat,
    /// Scale applied to signature images when they are placed
    pub stamp_scale: f32,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            ink_color: Color::BLACK,
            ink_width: 2.0,
            highlight_color: Color::HIGHLIGHT,
            redact_color: Color::BLACK,
            marker_size: (100.0, 20.0),
            placeholder_text: "Add text here".to_owned(),
            text_width: 200.0,
            textbox_size: (200.0, 50.0),
            textbox_padding: 6.0,
            textbox_fill: Color::TRANSPARENT,
            textbox_border: Color::SLATE,
            textbox_border_width: 1.0,
            date_format: DateFormat::UsLocale,
            stamp_scale: 0.5,
        }
    }
}

/// Canvas geometry for signature capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureCaptureConfig {
    pub draw_width: u32,
    pub draw_height: u32,
    pub ink_width: f32,
    pub type_width: u32,
    pub type_height: u32,
    pub type_font_size: f32,
    pub color: Color,
}

impl Default for SignatureCaptureConfig {
    fn default() -> Self {
        Self {
            draw_width: 400,
            draw_height: 200,
            ink_width: 2.0,
            type_width: 400,
            type_height: 100,
            type_font_size: 36.0,
            color: Color::BLACK,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for {0}")]
    InvalidValue(String),
}
