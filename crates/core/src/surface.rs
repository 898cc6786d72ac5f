//! Per-page annotation layer
//!
//! An [`AnnotationSurface`] owns every object drawn on one page. Objects are
//! indexed by id; stacking order is insertion order and never changes when
//! an object is moved or edited.

use crate::flatten::{CompositeError, Compositor, SkiaCompositor};
use crate::geometry::{PagePoint, PageRect};
use crate::object::{AnnotationObject, ObjectId};
use inkseal_raster::Bitmap;
use std::collections::HashMap;

/// Vector layer for a single page
#[derive(Debug, Clone, Default)]
pub struct AnnotationSurface {
    page: u32,

    /// All objects indexed by id
    objects: HashMap<ObjectId, AnnotationObject>,

    /// Z-order, bottom first
    order: Vec<ObjectId>,

    selection: Option<ObjectId>,
}

/// Frozen copy of a surface, used for undo
#[derive(Debug, Clone)]
pub struct SurfaceSnapshot {
    objects: HashMap<ObjectId, AnnotationObject>,
    order: Vec<ObjectId>,
    selection: Option<ObjectId>,
}

impl AnnotationSurface {
    pub fn new(page: u32) -> Self {
        Self { page, ..Self::default() }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add an object on top of the stack and return its new id.
    pub fn add_object(&mut self, object: AnnotationObject) -> ObjectId {
        let id = ObjectId::new_v4();
        tracing::trace!(page = self.page, %id, kind = object.kind_name(), "object added");
        self.objects.insert(id, object);
        self.order.push(id);
        id
    }

    /// Remove an object. Unknown ids are a no-op.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<AnnotationObject> {
        let object = self.objects.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        if self.selection == Some(id) {
            self.selection = None;
        }
        Some(object)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&AnnotationObject> {
        self.objects.get(&id)
    }

    /// Objects in z-order, bottom first
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &AnnotationObject)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.objects.get(id).map(|object| (*id, object)))
    }

    /// Ids in z-order, bottom first
    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Select an object, or clear the selection with `None`.
    ///
    /// Selecting an id that is not on this surface clears the selection.
    /// Returns the selection that is now in effect.
    pub fn set_selection(&mut self, id: Option<ObjectId>) -> Option<ObjectId> {
        self.selection = id.filter(|id| self.objects.contains_key(id));
        self.selection
    }

    pub fn selection(&self) -> Option<ObjectId> {
        self.selection
    }

    /// Topmost object under `point`
    pub fn hit_test(&self, point: &PagePoint, tolerance: f32) -> Option<ObjectId> {
        self.order
            .iter()
            .rev()
            .find(|id| {
                self.objects
                    .get(id)
                    .is_some_and(|object| object.hit_test(point, tolerance))
            })
            .copied()
    }

    /// Move an object by `(dx, dy)` page units. Z-order is unchanged.
    pub fn translate_object(&mut self, id: ObjectId, dx: f32, dy: f32) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) => {
                object.translate(dx, dy);
                true
            }
            None => false,
        }
    }

    /// Fit an object into `rect`.
    ///
    /// Shapes take the rect as is, text takes its origin and wrap width and
    /// stamps are rescaled to cover it. Ink cannot be resized.
    pub fn resize_object(&mut self, id: ObjectId, rect: PageRect) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };

        match object {
            AnnotationObject::Shape { rect: current, .. } => {
                *current = rect;
                true
            }
            AnnotationObject::Text { origin, width, .. } => {
                *origin = PagePoint::new(rect.x, rect.y);
                *width = rect.width.max(0.0);
                true
            }
            AnnotationObject::ImageStamp { origin, scale_x, scale_y, source } => {
                let (image_width, image_height) = source.image.dimensions();
                if image_width == 0 || image_height == 0 {
                    return false;
                }
                *origin = PagePoint::new(rect.x, rect.y);
                *scale_x = rect.width.max(0.0) / image_width as f32;
                *scale_y = rect.height.max(0.0) / image_height as f32;
                true
            }
            AnnotationObject::Ink { .. } => false,
        }
    }

    /// Replace the content of a text object.
    pub fn set_text(&mut self, id: ObjectId, content: impl Into<String>) -> bool {
        match self.objects.get_mut(&id) {
            Some(AnnotationObject::Text { content: current, .. }) => {
                *current = content.into();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.order.clear();
        self.selection = None;
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            objects: self.objects.clone(),
            order: self.order.clone(),
            selection: self.selection,
        }
    }

    pub fn restore(&mut self, snapshot: SurfaceSnapshot) {
        self.objects = snapshot.objects;
        self.order = snapshot.order;
        self.selection = snapshot.selection;
    }

    /// Composite every object onto a copy of `base` rendered at `scale`.
    pub fn flatten(&self, base: &Bitmap, scale: f32) -> Result<Bitmap, CompositeError> {
        self.flatten_with(&SkiaCompositor, base, scale)
    }

    pub fn flatten_with(
        &self,
        compositor: &dyn Compositor,
        base: &Bitmap,
        scale: f32,
    ) -> Result<Bitmap, CompositeError> {
        let objects: Vec<&AnnotationObject> = self.objects().map(|(_, object)| object).collect();
        compositor.composite(base, &objects, scale)
    }
}
