//! Pointer gesture handling for the editing tools
//!
//! The [`ToolController`] turns pointer events into surface mutations. Each
//! tool is a [`ToolBehavior`] found through [`behavior_for`]; a gesture
//! remembers the tool and page it started on, so switching tools mid-drag
//! or moving the pointer over another page never mixes behaviors.

use crate::config::ToolDefaults;
use crate::geometry::{PagePoint, PageRect};
use crate::object::{AnnotationObject, ObjectId, ShapeKind, TextStyle};
use crate::surface::AnnotationSurface;
use crate::tool::{Clock, Tool, ToolState};
use std::sync::Arc;

/// Result of feeding one pointer event to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Nothing changed
    Idle,
    /// A gesture started; it commits on pointer up
    Started,
    /// Selection changed
    Selected(Option<ObjectId>),
    /// New objects were added to the surface, bottom first
    Committed(Vec<ObjectId>),
    /// An existing object was moved or resized
    Transformed(ObjectId),
    /// The caller should open signature capture for this spot
    SignatureRequested { page: u32, anchor: PagePoint },
}

impl ToolOutcome {
    /// Whether the surface content changed.
    pub fn is_mutation(&self) -> bool {
        matches!(self, ToolOutcome::Committed(_) | ToolOutcome::Transformed(_))
    }
}

/// In-progress work of a gesture
#[derive(Debug, Clone, PartialEq)]
pub enum GestureKind {
    Move { id: ObjectId, last: PagePoint, moved: bool },
    Resize { id: ObjectId, anchor: PagePoint },
    Ink { points: Vec<PagePoint> },
    Shape { kind: ShapeKind, anchor: PagePoint, rect: PageRect },
    TextBox { anchor: PagePoint, rect: PageRect },
    Place { object: AnnotationObject },
}

#[derive(Debug, Clone, PartialEq)]
struct Gesture {
    page: u32,
    tool: Tool,
    kind: GestureKind,
}

/// What a behavior can see and change while handling an event
pub struct ToolContext<'a> {
    pub surface: &'a mut AnnotationSurface,
    pub formatting: &'a TextStyle,
    pub defaults: &'a ToolDefaults,
    pub tolerance: f32,
    pub clock: &'a dyn Clock,
}

/// Pointer handling for one tool
pub trait ToolBehavior: Sync {
    /// Pointer pressed. Returns the gesture to track, if any.
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome);

    /// Pointer dragged while pressed.
    fn on_move(&self, ctx: &mut ToolContext<'_>, gesture: &mut GestureKind, point: PagePoint) -> ToolOutcome {
        drag(ctx, gesture, point)
    }

    /// Pointer released, or the gesture was interrupted. Commits the work.
    fn on_up(&self, ctx: &mut ToolContext<'_>, gesture: GestureKind) -> ToolOutcome {
        commit(ctx, gesture)
    }
}

struct SelectBehavior;
struct DrawBehavior;
struct MarkerBehavior(ShapeKind);
struct TextBehavior;
struct TextBoxBehavior;
struct DateBehavior;
struct SignatureBehavior;

static SELECT: SelectBehavior = SelectBehavior;
static DRAW: DrawBehavior = DrawBehavior;
static HIGHLIGHT: MarkerBehavior = MarkerBehavior(ShapeKind::Highlight);
static REDACT: MarkerBehavior = MarkerBehavior(ShapeKind::Redact);
static TEXT: TextBehavior = TextBehavior;
static TEXTBOX: TextBoxBehavior = TextBoxBehavior;
static DATE: DateBehavior = DateBehavior;
static SIGNATURE: SignatureBehavior = SignatureBehavior;

/// Behavior table lookup
pub fn behavior_for(tool: Tool) -> &'static dyn ToolBehavior {
    match tool {
        Tool::Select => &SELECT,
        Tool::Draw => &DRAW,
        Tool::Highlight => &HIGHLIGHT,
        Tool::Redact => &REDACT,
        Tool::Text => &TEXT,
        Tool::Textbox => &TEXTBOX,
        Tool::Date => &DATE,
        Tool::Signature => &SIGNATURE,
    }
}

impl ToolBehavior for SelectBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        if let Some(id) = ctx.surface.selection() {
            if let Some(AnnotationObject::Shape { rect, .. }) = ctx.surface.get(id) {
                if point.distance_to(&rect.bottom_right()) <= ctx.tolerance {
                    let anchor = PagePoint::new(rect.x, rect.y);
                    return (Some(GestureKind::Resize { id, anchor }), ToolOutcome::Selected(Some(id)));
                }
            }
        }

        match ctx.surface.hit_test(&point, ctx.tolerance) {
            Some(id) => {
                ctx.surface.set_selection(Some(id));
                let gesture = GestureKind::Move { id, last: point, moved: false };
                (Some(gesture), ToolOutcome::Selected(Some(id)))
            }
            None => {
                ctx.surface.set_selection(None);
                (None, ToolOutcome::Selected(None))
            }
        }
    }
}

impl ToolBehavior for DrawBehavior {
    fn on_down(&self, _ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        (Some(GestureKind::Ink { points: vec![point] }), ToolOutcome::Started)
    }
}

impl ToolBehavior for MarkerBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        let (width, height) = ctx.defaults.marker_size;
        let rect = PageRect::new(point.x, point.y, width, height);
        (Some(GestureKind::Shape { kind: self.0, anchor: point, rect }), ToolOutcome::Started)
    }
}

impl ToolBehavior for TextBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        let object = AnnotationObject::text(
            point,
            ctx.defaults.placeholder_text.clone(),
            ctx.formatting.clone(),
            ctx.defaults.text_width,
        );
        (Some(GestureKind::Place { object }), ToolOutcome::Started)
    }

    fn on_move(&self, _ctx: &mut ToolContext<'_>, _gesture: &mut GestureKind, _point: PagePoint) -> ToolOutcome {
        ToolOutcome::Idle
    }
}

impl ToolBehavior for DateBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        let today = ctx.defaults.date_format.format(ctx.clock.today());
        let object = AnnotationObject::text(point, today, ctx.formatting.clone(), ctx.defaults.text_width);
        (Some(GestureKind::Place { object }), ToolOutcome::Started)
    }

    fn on_move(&self, _ctx: &mut ToolContext<'_>, _gesture: &mut GestureKind, _point: PagePoint) -> ToolOutcome {
        ToolOutcome::Idle
    }
}

impl ToolBehavior for TextBoxBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        let (width, height) = ctx.defaults.textbox_size;
        let rect = PageRect::new(point.x, point.y, width, height);
        (Some(GestureKind::TextBox { anchor: point, rect }), ToolOutcome::Started)
    }
}

impl ToolBehavior for SignatureBehavior {
    fn on_down(&self, ctx: &mut ToolContext<'_>, point: PagePoint) -> (Option<GestureKind>, ToolOutcome) {
        let page = ctx.surface.page();
        (None, ToolOutcome::SignatureRequested { page, anchor: point })
    }
}

/// Shared drag handling, keyed on the gesture rather than the tool
fn drag(ctx: &mut ToolContext<'_>, gesture: &mut GestureKind, point: PagePoint) -> ToolOutcome {
    match gesture {
        GestureKind::Move { id, last, moved } => {
            let (dx, dy) = (point.x - last.x, point.y - last.y);
            if dx == 0.0 && dy == 0.0 {
                return ToolOutcome::Idle;
            }
            if !ctx.surface.translate_object(*id, dx, dy) {
                return ToolOutcome::Idle;
            }
            *last = point;
            *moved = true;
            ToolOutcome::Transformed(*id)
        }
        GestureKind::Resize { id, anchor } => {
            if ctx.surface.resize_object(*id, PageRect::from_corners(*anchor, point)) {
                ToolOutcome::Transformed(*id)
            } else {
                ToolOutcome::Idle
            }
        }
        GestureKind::Ink { points } => {
            if points.last().is_some_and(|last| last.distance_to(&point) < f32::EPSILON) {
                return ToolOutcome::Idle;
            }
            points.push(point);
            ToolOutcome::Started
        }
        GestureKind::Shape { anchor, rect, .. } | GestureKind::TextBox { anchor, rect } => {
            // A release on the anchor is a click: keep the default size.
            if anchor.distance_to(&point) < f32::EPSILON {
                return ToolOutcome::Idle;
            }
            *rect = PageRect::from_corners(*anchor, point);
            ToolOutcome::Started
        }
        GestureKind::Place { .. } => ToolOutcome::Idle,
    }
}

/// Shared commit handling
fn commit(ctx: &mut ToolContext<'_>, gesture: GestureKind) -> ToolOutcome {
    let defaults = ctx.defaults;
    match gesture {
        GestureKind::Move { id, moved, .. } => {
            if moved {
                ToolOutcome::Transformed(id)
            } else {
                ToolOutcome::Selected(Some(id))
            }
        }
        GestureKind::Resize { id, .. } => ToolOutcome::Transformed(id),
        GestureKind::Ink { points } => {
            let ink = AnnotationObject::ink(points, defaults.ink_color, defaults.ink_width);
            ToolOutcome::Committed(vec![ctx.surface.add_object(ink)])
        }
        GestureKind::Shape { rect, .. } | GestureKind::TextBox { rect, .. } if rect.is_empty() => {
            tracing::debug!(?rect, "dropping zero-area shape");
            ToolOutcome::Idle
        }
        GestureKind::Shape { kind, rect, .. } => {
            let fill = match kind {
                ShapeKind::Highlight => defaults.highlight_color,
                ShapeKind::Redact => defaults.redact_color,
                ShapeKind::Box => defaults.textbox_fill,
            };
            let shape = AnnotationObject::shape(kind, rect, fill);
            ToolOutcome::Committed(vec![ctx.surface.add_object(shape)])
        }
        GestureKind::TextBox { rect, .. } => {
            let frame = AnnotationObject::bordered_box(
                rect,
                defaults.textbox_fill,
                defaults.textbox_border,
                defaults.textbox_border_width,
            );
            let padding = defaults.textbox_padding;
            let text = AnnotationObject::text(
                PagePoint::new(rect.x + padding, rect.y + padding),
                defaults.placeholder_text.clone(),
                ctx.formatting.clone(),
                (rect.width - padding * 2.0).max(0.0),
            );
            let frame_id = ctx.surface.add_object(frame);
            let text_id = ctx.surface.add_object(text);
            ToolOutcome::Committed(vec![frame_id, text_id])
        }
        GestureKind::Place { object } => ToolOutcome::Committed(vec![ctx.surface.add_object(object)]),
    }
}

/// State machine mapping the active tool to pointer behavior
pub struct ToolController {
    state: ToolState,
    defaults: ToolDefaults,
    tolerance: f32,
    clock: Arc<dyn Clock>,
    gesture: Option<Gesture>,
    signature_anchor: Option<(u32, PagePoint)>,
}

impl ToolController {
    pub fn new(defaults: ToolDefaults, tolerance: f32, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ToolState::default(),
            defaults,
            tolerance,
            clock,
            gesture: None,
            signature_anchor: None,
        }
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    pub fn tool(&self) -> Tool {
        self.state.active_tool
    }

    pub fn defaults(&self) -> &ToolDefaults {
        &self.defaults
    }

    pub fn set_formatting(&mut self, formatting: TextStyle) {
        self.state.formatting = formatting;
    }

    /// Switch tools. Returns true when the select tool was left.
    ///
    /// Callers finish any active gesture first with [`finish`](Self::finish);
    /// a gesture still active here is dropped.
    pub fn set_tool(&mut self, tool: Tool) -> bool {
        if let Some(gesture) = self.gesture.take() {
            tracing::warn!(tool = %gesture.tool, page = gesture.page, "dropping unfinished gesture");
        }
        let previous = std::mem::replace(&mut self.state.active_tool, tool);
        tracing::debug!(from = %previous, to = %tool, "tool changed");
        previous == Tool::Select && tool != Tool::Select
    }

    /// Page of the gesture in progress
    pub fn active_page(&self) -> Option<u32> {
        self.gesture.as_ref().map(|gesture| gesture.page)
    }

    /// Last spot the signature tool was used on
    pub fn signature_anchor(&self) -> Option<(u32, PagePoint)> {
        self.signature_anchor
    }

    pub fn clear_signature_anchor(&mut self) {
        self.signature_anchor = None;
    }

    /// Object a gesture would commit right now, for live preview
    pub fn preview(&self) -> Option<(u32, AnnotationObject)> {
        let gesture = self.gesture.as_ref()?;
        let object = match &gesture.kind {
            GestureKind::Ink { points } => {
                AnnotationObject::ink(points.clone(), self.defaults.ink_color, self.defaults.ink_width)
            }
            GestureKind::Shape { kind, rect, .. } => {
                let fill = match kind {
                    ShapeKind::Highlight => self.defaults.highlight_color,
                    ShapeKind::Redact => self.defaults.redact_color,
                    ShapeKind::Box => self.defaults.textbox_fill,
                };
                AnnotationObject::shape(*kind, *rect, fill)
            }
            GestureKind::TextBox { rect, .. } => AnnotationObject::bordered_box(
                *rect,
                self.defaults.textbox_fill,
                self.defaults.textbox_border,
                self.defaults.textbox_border_width,
            ),
            GestureKind::Place { object } => object.clone(),
            GestureKind::Move { .. } | GestureKind::Resize { .. } => return None,
        };
        Some((gesture.page, object))
    }

    /// Pointer pressed at view coordinates `(x, y)` on `surface`'s page.
    ///
    /// A press while a gesture is still active first commits that gesture.
    pub fn pointer_down(&mut self, surface: &mut AnnotationSurface, scale: f32, x: f32, y: f32) -> ToolOutcome {
        if self.gesture.is_some() && self.active_page() == Some(surface.page()) {
            self.finish(surface);
        }

        let point = PagePoint::from_view(x, y, scale);
        let tool = self.state.active_tool;
        let page = surface.page();
        let mut ctx = ToolContext {
            surface,
            formatting: &self.state.formatting,
            defaults: &self.defaults,
            tolerance: self.tolerance,
            clock: self.clock.as_ref(),
        };

        let (gesture, outcome) = behavior_for(tool).on_down(&mut ctx, point);
        if let ToolOutcome::SignatureRequested { page, anchor } = outcome {
            self.signature_anchor = Some((page, anchor));
        }
        self.gesture = gesture.map(|kind| Gesture { page, tool, kind });
        outcome
    }

    /// Pointer dragged. `surface` must be the page the gesture started on.
    pub fn pointer_move(&mut self, surface: &mut AnnotationSurface, scale: f32, x: f32, y: f32) -> ToolOutcome {
        let Some(gesture) = self.gesture.as_mut() else {
            return ToolOutcome::Idle;
        };
        if gesture.page != surface.page() {
            return ToolOutcome::Idle;
        }

        let point = PagePoint::from_view(x, y, scale);
        let mut ctx = ToolContext {
            surface,
            formatting: &self.state.formatting,
            defaults: &self.defaults,
            tolerance: self.tolerance,
            clock: self.clock.as_ref(),
        };
        behavior_for(gesture.tool).on_move(&mut ctx, &mut gesture.kind, point)
    }

    /// Pointer released. Applies the final position, then commits.
    pub fn pointer_up(&mut self, surface: &mut AnnotationSurface, scale: f32, x: f32, y: f32) -> ToolOutcome {
        match self.active_page() {
            Some(page) if page == surface.page() => {}
            _ => return ToolOutcome::Idle,
        }
        self.pointer_move(surface, scale, x, y);
        self.finish(surface)
    }

    /// Commit the active gesture under the tool it started with.
    pub fn finish(&mut self, surface: &mut AnnotationSurface) -> ToolOutcome {
        let Some(gesture) = self.gesture.take() else {
            return ToolOutcome::Idle;
        };
        if gesture.page != surface.page() {
            tracing::warn!(page = gesture.page, surface = surface.page(), "gesture finished on wrong page");
            self.gesture = Some(gesture);
            return ToolOutcome::Idle;
        }

        let mut ctx = ToolContext {
            surface,
            formatting: &self.state.formatting,
            defaults: &self.defaults,
            tolerance: self.tolerance,
            clock: self.clock.as_ref(),
        };
        let outcome = behavior_for(gesture.tool).on_up(&mut ctx, gesture.kind);
        tracing::debug!(tool = %gesture.tool, page = gesture.page, ?outcome, "gesture finished");
        outcome
    }

    /// Drop the active gesture without committing it.
    pub fn cancel(&mut self) {
        self.gesture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Color;
    use crate::tool::{DateFormat, FixedClock};
    use chrono::{TimeZone, Utc};

    fn controller() -> ToolController {
        let instant = Utc.with_ymd_and_hms(2024, 12, 25, 9, 0, 0).single().expect("valid instant");
        ToolController::new(ToolDefaults::default(), 4.0, Arc::new(FixedClock(instant)))
    }

    fn only_object(surface: &AnnotationSurface) -> &AnnotationObject {
        assert_eq!(surface.len(), 1, "expected exactly one object");
        surface.objects().next().map(|(_, object)| object).expect("one object")
    }

    #[test]
    fn test_draw_gesture_commits_ink_in_page_space() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Draw);

        controller.pointer_down(&mut surface, 1.5, 15.0, 15.0);
        controller.pointer_move(&mut surface, 1.5, 30.0, 30.0);
        assert!(surface.is_empty(), "ink is not committed before pointer up");
        let outcome = controller.pointer_up(&mut surface, 1.5, 45.0, 15.0);

        assert!(matches!(outcome, ToolOutcome::Committed(ref ids) if ids.len() == 1));
        match only_object(&surface) {
            AnnotationObject::Ink { points, stroke_color, stroke_width } => {
                assert_eq!(
                    points,
                    &vec![PagePoint::new(10.0, 10.0), PagePoint::new(20.0, 20.0), PagePoint::new(30.0, 10.0)]
                );
                assert_eq!(*stroke_color, Color::BLACK);
                assert_eq!(*stroke_width, 2.0);
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_redact_drag_sets_rect_from_anchor() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Redact);

        controller.pointer_down(&mut surface, 1.0, 50.0, 50.0);
        controller.pointer_move(&mut surface, 1.0, 150.0, 80.0);
        controller.pointer_up(&mut surface, 1.0, 150.0, 80.0);

        match only_object(&surface) {
            AnnotationObject::Shape { kind, rect, fill_color, .. } => {
                assert_eq!(*kind, ShapeKind::Redact);
                assert_eq!(*rect, PageRect::new(50.0, 50.0, 100.0, 30.0));
                assert_eq!(*fill_color, Color::BLACK);
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_highlight_click_uses_default_size() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Highlight);

        controller.pointer_down(&mut surface, 2.0, 20.0, 40.0);
        controller.pointer_up(&mut surface, 2.0, 20.0, 40.0);

        match only_object(&surface) {
            AnnotationObject::Shape { kind, rect, fill_color, .. } => {
                assert_eq!(*kind, ShapeKind::Highlight);
                assert_eq!(*rect, PageRect::new(10.0, 20.0, 100.0, 20.0));
                assert_eq!(*fill_color, Color::HIGHLIGHT);
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_single_axis_drag_commits_nothing() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);

        for tool in [Tool::Highlight, Tool::Redact, Tool::Textbox] {
            controller.set_tool(tool);
            controller.pointer_down(&mut surface, 1.5, 30.0, 30.0);
            controller.pointer_move(&mut surface, 1.5, 120.0, 30.0);
            let outcome = controller.pointer_up(&mut surface, 1.5, 120.0, 30.0);

            assert_eq!(outcome, ToolOutcome::Idle, "{tool} committed a flat shape");
        }
        assert!(surface.is_empty());
    }

    #[test]
    fn test_text_tool_places_placeholder_with_formatting() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Text);
        controller.set_formatting(TextStyle { bold: true, font_size: 20.0, ..TextStyle::default() });

        controller.pointer_down(&mut surface, 1.0, 5.0, 5.0);
        controller.pointer_move(&mut surface, 1.0, 80.0, 80.0);
        controller.pointer_up(&mut surface, 1.0, 80.0, 80.0);

        match only_object(&surface) {
            AnnotationObject::Text { origin, content, style, width } => {
                assert_eq!(*origin, PagePoint::new(5.0, 5.0));
                assert_eq!(content, "Add text here");
                assert!(style.bold);
                assert_eq!(style.font_size, 20.0);
                assert_eq!(*width, 200.0);
            }
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_date_tool_uses_clock_and_format() {
        let mut defaults = ToolDefaults::default();
        defaults.date_format = DateFormat::Iso;
        let instant = Utc.with_ymd_and_hms(2024, 12, 25, 9, 0, 0).single().expect("valid instant");
        let mut controller = ToolController::new(defaults, 4.0, Arc::new(FixedClock(instant)));
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Date);

        controller.pointer_down(&mut surface, 1.0, 5.0, 5.0);
        controller.pointer_up(&mut surface, 1.0, 5.0, 5.0);

        match only_object(&surface) {
            AnnotationObject::Text { content, .. } => assert_eq!(content, "2024-12-25"),
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn test_textbox_commits_frame_and_padded_text() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Textbox);

        controller.pointer_down(&mut surface, 1.0, 10.0, 10.0);
        controller.pointer_move(&mut surface, 1.0, 110.0, 60.0);
        let outcome = controller.pointer_up(&mut surface, 1.0, 110.0, 60.0);

        let ToolOutcome::Committed(ids) = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(ids.len(), 2);
        assert_eq!(surface.ids(), ids.as_slice());
        match (surface.get(ids[0]), surface.get(ids[1])) {
            (
                Some(AnnotationObject::Shape { kind: ShapeKind::Box, rect, stroke_color, .. }),
                Some(AnnotationObject::Text { origin, width, .. }),
            ) => {
                assert_eq!(*rect, PageRect::new(10.0, 10.0, 100.0, 50.0));
                assert!(stroke_color.is_some());
                assert_eq!(*origin, PagePoint::new(16.0, 16.0));
                assert_eq!(*width, 88.0);
            }
            other => panic!("unexpected objects {other:?}"),
        }
    }

    #[test]
    fn test_select_moves_topmost_hit_without_reordering() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        let bottom = surface.add_object(AnnotationObject::shape(
            ShapeKind::Highlight,
            PageRect::new(0.0, 0.0, 50.0, 50.0),
            Color::HIGHLIGHT,
        ));
        let top = surface.add_object(AnnotationObject::shape(
            ShapeKind::Redact,
            PageRect::new(20.0, 20.0, 50.0, 50.0),
            Color::BLACK,
        ));

        let outcome = controller.pointer_down(&mut surface, 1.0, 30.0, 30.0);
        assert_eq!(outcome, ToolOutcome::Selected(Some(top)));
        controller.pointer_move(&mut surface, 1.0, 40.0, 35.0);
        let outcome = controller.pointer_up(&mut surface, 1.0, 40.0, 35.0);

        assert_eq!(outcome, ToolOutcome::Transformed(top));
        assert_eq!(surface.ids(), &[bottom, top]);
        assert_eq!(
            surface.get(top).and_then(AnnotationObject::bounds),
            Some(PageRect::new(30.0, 25.0, 50.0, 50.0))
        );
    }

    #[test]
    fn test_select_miss_clears_selection() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        let id = surface.add_object(AnnotationObject::shape(
            ShapeKind::Redact,
            PageRect::new(0.0, 0.0, 10.0, 10.0),
            Color::BLACK,
        ));
        surface.set_selection(Some(id));

        assert_eq!(controller.pointer_down(&mut surface, 1.0, 200.0, 200.0), ToolOutcome::Selected(None));
        assert_eq!(surface.selection(), None);
        assert_eq!(controller.active_page(), None);
    }

    #[test]
    fn test_select_resizes_from_bottom_right_handle() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        let id = surface.add_object(AnnotationObject::shape(
            ShapeKind::Highlight,
            PageRect::new(10.0, 10.0, 100.0, 20.0),
            Color::HIGHLIGHT,
        ));
        surface.set_selection(Some(id));

        controller.pointer_down(&mut surface, 1.0, 110.0, 30.0);
        let outcome = controller.pointer_up(&mut surface, 1.0, 150.0, 70.0);

        assert_eq!(outcome, ToolOutcome::Transformed(id));
        assert_eq!(
            surface.get(id).and_then(AnnotationObject::bounds),
            Some(PageRect::new(10.0, 10.0, 140.0, 60.0))
        );
    }

    #[test]
    fn test_signature_tool_requests_capture() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(2);
        controller.set_tool(Tool::Signature);

        let outcome = controller.pointer_down(&mut surface, 2.0, 100.0, 50.0);
        assert_eq!(
            outcome,
            ToolOutcome::SignatureRequested { page: 2, anchor: PagePoint::new(50.0, 25.0) }
        );
        assert_eq!(controller.signature_anchor(), Some((2, PagePoint::new(50.0, 25.0))));
        assert!(surface.is_empty());
        assert_eq!(controller.pointer_up(&mut surface, 2.0, 100.0, 50.0), ToolOutcome::Idle);
    }

    #[test]
    fn test_finish_commits_under_starting_tool() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Draw);
        controller.pointer_down(&mut surface, 1.0, 1.0, 1.0);
        controller.pointer_move(&mut surface, 1.0, 9.0, 9.0);

        let outcome = controller.finish(&mut surface);
        controller.set_tool(Tool::Redact);
        let late_up = controller.pointer_up(&mut surface, 1.0, 50.0, 50.0);

        assert!(matches!(outcome, ToolOutcome::Committed(_)));
        assert_eq!(late_up, ToolOutcome::Idle);
        assert_eq!(only_object(&surface).kind_name(), "ink");
    }

    #[test]
    fn test_move_on_other_page_is_ignored() {
        let mut controller = controller();
        let mut first = AnnotationSurface::new(0);
        let mut second = AnnotationSurface::new(1);
        controller.set_tool(Tool::Draw);

        controller.pointer_down(&mut first, 1.0, 1.0, 1.0);
        assert_eq!(controller.pointer_move(&mut second, 1.0, 5.0, 5.0), ToolOutcome::Idle);
        assert_eq!(controller.pointer_up(&mut second, 1.0, 5.0, 5.0), ToolOutcome::Idle);
        assert_eq!(controller.active_page(), Some(0));
    }

    #[test]
    fn test_leaving_select_is_reported() {
        let mut controller = controller();
        assert!(controller.set_tool(Tool::Draw));
        assert!(!controller.set_tool(Tool::Text));
        assert!(!controller.set_tool(Tool::Select));
    }

    #[test]
    fn test_preview_shows_in_progress_object() {
        let mut controller = controller();
        let mut surface = AnnotationSurface::new(0);
        controller.set_tool(Tool::Highlight);
        assert!(controller.preview().is_none());

        controller.pointer_down(&mut surface, 1.0, 0.0, 0.0);
        let (page, object) = controller.preview().expect("preview while dragging");
        assert_eq!(page, 0);
        assert_eq!(object.kind_name(), "highlight");
    }
}
