//! JSON editing scripts for `inkseal annotate`
//!
//! A script is a JSON array of steps, each tagged with `"op"`. Pointer
//! coordinates are view pixels at the session's current scale, exactly as
//! a pointer device would report them; pages are 1-based.

use anyhow::{Context, Result};
use inkseal_core::{typed_signature, DocumentEditorSession, TextStyle, Tool};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    Tool { tool: Tool },
    Format { style: TextStyle },
    Down { page: usize, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Scale { value: f32 },
    ZoomIn,
    ZoomOut,
    SignTyped { name: String },
    Undo,
    Redo,
    Delete,
}

pub fn load(path: &Path) -> Result<Vec<ScriptStep>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid script {}", path.display()))
}

pub fn parse(contents: &str) -> Result<Vec<ScriptStep>> {
    Ok(serde_json::from_str(contents)?)
}

/// Run every step against `session`, stopping at the first failure.
pub fn run(session: &mut DocumentEditorSession, steps: &[ScriptStep]) -> Result<()> {
    for (number, step) in steps.iter().enumerate() {
        apply(session, step).with_context(|| format!("script step {} failed", number + 1))?;
    }
    Ok(())
}

fn apply(session: &mut DocumentEditorSession, step: &ScriptStep) -> Result<()> {
    tracing::debug!(?step, "script step");
    match step {
        ScriptStep::Tool { tool } => {
            session.set_tool(*tool);
        }
        ScriptStep::Format { style } => session.set_formatting(style.clone()),
        ScriptStep::Down { page, x, y } => {
            let index = page
                .checked_sub(1)
                .filter(|index| *index < session.page_count())
                .with_context(|| format!("page {page} does not exist"))?;
            session.pointer_down(index, *x, *y);
        }
        ScriptStep::Move { x, y } => {
            session.pointer_move(*x, *y);
        }
        ScriptStep::Up { x, y } => {
            session.pointer_up(*x, *y);
        }
        ScriptStep::Scale { value } => {
            session.set_scale(*value);
        }
        ScriptStep::ZoomIn => {
            session.zoom_in();
        }
        ScriptStep::ZoomOut => {
            session.zoom_out();
        }
        ScriptStep::SignTyped { name } => {
            let asset = typed_signature(name, &session.config().signature)
                .context("failed to create typed signature")?;
            session.place_signature(&asset)?;
        }
        ScriptStep::Undo => {
            session.undo();
        }
        ScriptStep::Redo => {
            session.redo();
        }
        ScriptStep::Delete => {
            session.delete_selection();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_steps() {
        let steps = parse(
            r##"[
                { "op": "tool", "tool": "redact" },
                { "op": "down", "page": 1, "x": 10, "y": 20 },
                { "op": "up", "x": 40, "y": 60 },
                { "op": "format", "style": { "bold": true, "color": "#dc2626" } },
                { "op": "zoom_in" },
                { "op": "sign_typed", "name": "Ada" }
            ]"##,
        )
        .expect("script should parse");

        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0], ScriptStep::Tool { tool: Tool::Redact });
        assert_eq!(steps[1], ScriptStep::Down { page: 1, x: 10.0, y: 20.0 });
        assert!(matches!(&steps[3], ScriptStep::Format { style } if style.bold && style.font_size == 14.0));
        assert_eq!(steps[5], ScriptStep::SignTyped { name: "Ada".to_owned() });
    }

    #[test]
    fn rejects_unknown_ops() {
        assert!(parse(r#"[{ "op": "explode" }]"#).is_err());
        assert!(parse(r#"[{ "op": "tool", "tool": "laser" }]"#).is_err());
    }
}
