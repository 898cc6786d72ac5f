//! Bounded undo/redo of surface snapshots

use crate::surface::SurfaceSnapshot;
use std::collections::VecDeque;

/// Surface state of one page before a mutation
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub page: usize,
    pub snapshot: SurfaceSnapshot,
}

/// Undo and redo stacks shared by all pages of a session
///
/// Recording a new step clears the redo stack. The oldest steps are
/// dropped once `limit` is reached; a limit of zero disables history.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), limit }
    }

    /// Remember `snapshot` as the state of `page` before a mutation.
    pub fn record(&mut self, page: usize, snapshot: SurfaceSnapshot) {
        self.redo.clear();
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(HistoryEntry { page, snapshot });
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Step back one mutation.
    ///
    /// `swap` installs the given snapshot on a page and returns the state it
    /// replaced, or `None` if the page is gone. Returns the page touched.
    pub fn undo<F>(&mut self, swap: F) -> Option<usize>
    where
        F: FnOnce(usize, SurfaceSnapshot) -> Option<SurfaceSnapshot>,
    {
        let entry = self.undo.pop_back()?;
        let page = entry.page;
        let current = swap(page, entry.snapshot)?;
        self.redo.push(HistoryEntry { page, snapshot: current });
        Some(page)
    }

    /// Reapply the last undone mutation.
    pub fn redo<F>(&mut self, swap: F) -> Option<usize>
    where
        F: FnOnce(usize, SurfaceSnapshot) -> Option<SurfaceSnapshot>,
    {
        let entry = self.redo.pop()?;
        let page = entry.page;
        let current = swap(page, entry.snapshot)?;
        self.undo.push_back(HistoryEntry { page, snapshot: current });
        Some(page)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, PageRect};
    use crate::object::{AnnotationObject, ShapeKind};
    use crate::surface::AnnotationSurface;

    fn shape() -> AnnotationObject {
        AnnotationObject::shape(ShapeKind::Redact, PageRect::new(0.0, 0.0, 5.0, 5.0), Color::BLACK)
    }

    fn swap_into(surface: &mut AnnotationSurface) -> impl FnMut(usize, SurfaceSnapshot) -> Option<SurfaceSnapshot> + '_ {
        move |_, snapshot| {
            let current = surface.snapshot();
            surface.restore(snapshot);
            Some(current)
        }
    }

    #[test]
    fn test_undo_then_redo_restores_surface() {
        let mut surface = AnnotationSurface::new(0);
        let mut history = History::new(10);

        history.record(0, surface.snapshot());
        let id = surface.add_object(shape());

        assert_eq!(history.undo(swap_into(&mut surface)), Some(0));
        assert!(surface.is_empty());
        assert!(history.can_redo());

        assert_eq!(history.redo(swap_into(&mut surface)), Some(0));
        assert_eq!(surface.ids(), &[id]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut surface = AnnotationSurface::new(0);
        let mut history = History::new(10);

        history.record(0, surface.snapshot());
        surface.add_object(shape());
        history.undo(swap_into(&mut surface));
        assert!(history.can_redo());

        history.record(0, surface.snapshot());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let surface = AnnotationSurface::new(0);
        let mut history = History::new(2);
        for _ in 0..5 {
            history.record(0, surface.snapshot());
        }
        assert_eq!(history.undo_len(), 2);

        let mut disabled = History::new(0);
        disabled.record(0, surface.snapshot());
        assert!(!disabled.can_undo());
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut surface = AnnotationSurface::new(0);
        let mut history = History::new(3);
        assert_eq!(history.undo(swap_into(&mut surface)), None);
        assert_eq!(history.redo(swap_into(&mut surface)), None);
    }
}
