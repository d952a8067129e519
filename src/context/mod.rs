//! Live document state: elements, the spatial index and the stroke state machine.
//!
//! The context is mutated from a single document thread. Every mutation that
//! must reach durable storage is queued as an [`ElementChange`] which the
//! owner drains with [`GraphicContext::take_changes`].

mod history;

pub use history::MAX_HISTORY;

use crate::element::{
    Element, ElementError, ElementId, PenStyle, Photo, PhotoRef, Stroke, StrokeKind,
};
use crate::geometry::{BoundingBox, GeometryError, Point};
use crate::index::RTree;
use crate::stroke::{GeneratorConfig, MovingAverage, StrokeGenerator};
use chrono::Utc;
use history::{Edit, History};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Which render path the next frame needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderType {
    /// Nothing in flight; the cached layers are complete.
    #[default]
    Finished,
    /// A stroke is being drawn and is previewed every frame.
    InProgress,
    /// A stroke just finished and must be baked into the ink layer once.
    NewlyFinished,
}

/// Identifies the stroke started by [`GraphicContext::begin_stroke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeHandle {
    pub id: ElementId,
    pub kind: StrokeKind,
}

/// Identifies a photo placed by [`GraphicContext::insert_photo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoHandle {
    pub id: ElementId,
}

/// A change that must be forwarded to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementChange {
    Saved(ElementId),
    Deleted(ElementId),
}

#[derive(Debug)]
struct ActiveStroke {
    stroke: Stroke,
    generator: StrokeGenerator,
    smoothing: Option<MovingAverage>,
}

impl ActiveStroke {
    fn key_point(&mut self, point: Point) -> Point {
        match self.smoothing.as_mut() {
            Some(average) => average.push(point),
            None => point,
        }
    }
}

/// Owns the elements of one open document and the in-progress stroke.
#[derive(Debug)]
pub struct GraphicContext {
    elements: HashMap<ElementId, Element>,
    index: RTree<ElementId>,
    current: Option<ActiveStroke>,
    previous_stroke: Option<ElementId>,
    render_type: RenderType,
    generator: GeneratorConfig,
    smoothing: bool,
    next_id: u64,
    history: History,
    changes: Vec<ElementChange>,
    invalidated: bool,
}

impl Default for GraphicContext {
    fn default() -> Self {
        Self::new(GeneratorConfig::default(), true)
    }
}

impl GraphicContext {
    pub fn new(generator: GeneratorConfig, smoothing: bool) -> Self {
        Self {
            elements: HashMap::new(),
            index: RTree::new(),
            current: None,
            previous_stroke: None,
            render_type: RenderType::Finished,
            generator,
            smoothing,
            next_id: 1,
            history: History::default(),
            changes: Vec::new(),
            invalidated: false,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Number of finished elements in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Union of all element bounds; empty for an empty document.
    pub fn bounds(&self) -> BoundingBox {
        self.index.bounds()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.current.as_ref().map(|active| &active.stroke)
    }

    /// The just-finished stroke still waiting to be baked.
    pub fn previous_stroke(&self) -> Option<&Stroke> {
        self.previous_stroke
            .and_then(|id| self.elements.get(&id))
            .and_then(Element::as_stroke)
    }

    pub fn previous_stroke_id(&self) -> Option<ElementId> {
        self.previous_stroke
    }

    /// Marks the previous stroke as baked. Returns its id the first time only.
    pub fn take_previous_stroke(&mut self) -> Option<ElementId> {
        let taken = self.previous_stroke.take();
        if taken.is_some() {
            self.render_type = if self.current.is_some() {
                RenderType::InProgress
            } else {
                RenderType::Finished
            };
        }
        taken
    }

    /// Elements whose bounds intersect `range`, in creation order.
    pub fn visible_elements(&self, range: &BoundingBox) -> Vec<&Element> {
        let mut visible: Vec<&Element> = self
            .index
            .search(range)
            .into_iter()
            .filter_map(|id| self.elements.get(&id))
            .collect();
        visible.sort();
        visible
    }

    /// Every element in creation order, visited through a full index traversal.
    pub fn elements_in_creation_order(&self) -> Vec<&Element> {
        let mut all: Vec<&Element> = self
            .index
            .traverse()
            .filter_map(|id| self.elements.get(&id))
            .collect();
        all.sort();
        all
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Drains the changes that must be persisted.
    pub fn take_changes(&mut self) -> Vec<ElementChange> {
        std::mem::take(&mut self.changes)
    }

    /// Whether cached ink must be fully redrawn. Resets the flag.
    pub fn take_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    // ------------------------------------------------------------------
    // Stroke state machine
    // ------------------------------------------------------------------

    fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Starts a stroke at `point`. A stroke already in progress is cancelled.
    pub fn begin_stroke(
        &mut self,
        point: Point,
        style: &PenStyle,
    ) -> Result<StrokeHandle, ElementError> {
        style.validate()?;
        if let Some(active) = self.current.as_ref() {
            warn!(
                "Stroke {} still in progress when a new one began; cancelling it",
                active.stroke.id
            );
            self.cancel_stroke();
        }

        let id = self.allocate_id();
        let config = GeneratorConfig {
            seed: self.generator.seed ^ id.0,
            ..self.generator
        };
        let mut active = ActiveStroke {
            stroke: Stroke::new(id, style, Utc::now()),
            generator: StrokeGenerator::new(config, style.thickness, style.shape, style.color),
            smoothing: self.smoothing.then(MovingAverage::default),
        };
        let key = active.key_point(point);
        active.generator.begin(key, &mut active.stroke);
        debug!("Began {} stroke {}", style.kind, id);

        self.current = Some(active);
        self.render_type = RenderType::InProgress;
        Ok(StrokeHandle {
            id,
            kind: style.kind,
        })
    }

    /// Feeds a pointer sample into the current stroke. Returns `false` when
    /// no stroke is in progress.
    pub fn append_stroke(&mut self, point: Point) -> bool {
        let Some(active) = self.current.as_mut() else {
            debug!("Ignoring stroke sample without an active stroke");
            return false;
        };
        let key = active.key_point(point);
        active.generator.append(key, &mut active.stroke);
        true
    }

    /// Finishes the current stroke and inserts it into the document.
    pub fn end_stroke(&mut self, point: Point) -> Option<StrokeHandle> {
        let Some(mut active) = self.current.take() else {
            debug!("Ignoring stroke end without an active stroke");
            return None;
        };
        let key = active.key_point(point);
        active.generator.finish(key, &mut active.stroke);
        let stroke = active.stroke;
        let handle = StrokeHandle {
            id: stroke.id,
            kind: stroke.kind,
        };

        let erased = if stroke.kind == StrokeKind::Eraser {
            self.erase_under(&stroke)
        } else {
            Vec::new()
        };

        if let Some(unbaked) = self.previous_stroke.replace(stroke.id) {
            // Two strokes finished between frames; the older one is picked
            // up by a full redraw.
            debug!("Stroke {} finished before it was baked", unbaked);
            self.invalidated = true;
        }
        debug!(
            "Finished stroke {} with {} quads",
            stroke.id,
            stroke.quads().len()
        );
        let element = Element::Stroke(stroke);
        self.attach(element.clone());
        self.changes.push(ElementChange::Saved(handle.id));
        self.changes
            .extend(erased.iter().copied().map(ElementChange::Saved));
        self.history.record(Edit::Insert { element, erased });
        self.render_type = RenderType::NewlyFinished;
        Some(handle)
    }

    /// Discards the current stroke without inserting it.
    pub fn cancel_stroke(&mut self) -> bool {
        let Some(mut active) = self.current.take() else {
            return false;
        };
        active.generator.cancel();
        debug!("Cancelled stroke {}", active.stroke.id);
        self.render_type = if self.previous_stroke.is_some() {
            RenderType::NewlyFinished
        } else {
            RenderType::Finished
        };
        true
    }

    /// Registers `eraser` on every earlier marker stroke it overlaps.
    fn erase_under(&mut self, eraser: &Stroke) -> Vec<ElementId> {
        let mut erased = Vec::new();
        for id in self.index.search(&eraser.bounds()) {
            if let Some(Element::Stroke(marker)) = self.elements.get_mut(&id)
                && marker.kind == StrokeKind::Marker
                && (marker.created_at, marker.id) < (eraser.created_at, eraser.id)
            {
                marker.erasers.insert(eraser.id);
                erased.push(id);
            }
        }
        erased.sort();
        erased
    }

    /// Removes `eraser` from every marker that recorded it.
    fn strip_eraser(&mut self, eraser: ElementId) -> Vec<ElementId> {
        let mut stripped: Vec<ElementId> = self
            .elements
            .values_mut()
            .filter_map(|element| match element {
                Element::Stroke(marker) => marker.erasers.remove(&eraser).then_some(marker.id),
                _ => None,
            })
            .collect();
        stripped.sort();
        stripped
    }

    fn restore_eraser(&mut self, eraser: ElementId, markers: &[ElementId]) {
        for id in markers {
            if let Some(Element::Stroke(marker)) = self.elements.get_mut(id) {
                marker.erasers.insert(eraser);
            }
        }
    }

    // ------------------------------------------------------------------
    // Element edits
    // ------------------------------------------------------------------

    fn attach(&mut self, mut element: Element) {
        if let Element::Stroke(stroke) = &mut element {
            stroke
                .erasers
                .retain(|eraser| self.elements.contains_key(eraser));
        }
        let id = element.id();
        self.index.insert(id, element.bounds());
        self.elements.insert(id, element);
        self.next_id = self.next_id.max(id.0 + 1);
    }

    fn detach(&mut self, id: ElementId) -> Option<Element> {
        let element = self.elements.remove(&id)?;
        if !self.index.remove(id, &element.bounds()) {
            warn!("Element {} was missing from the spatial index", id);
        }
        if self.previous_stroke == Some(id) {
            self.take_previous_stroke();
        }
        Some(element)
    }

    /// Places a photo with its top-left corner at `origin`.
    pub fn insert_photo(
        &mut self,
        origin: Point,
        size: (f64, f64),
        image: PhotoRef,
    ) -> Result<PhotoHandle, GeometryError> {
        let id = self.allocate_id();
        let photo = Photo::new(id, origin, size, image, Utc::now())?;
        debug!("Inserted photo {} ({})", id, photo.image.key);
        let element = Element::Photo(photo);
        self.attach(element.clone());
        self.history.record(Edit::Insert {
            element,
            erased: Vec::new(),
        });
        self.changes.push(ElementChange::Saved(id));
        self.invalidated = true;
        Ok(PhotoHandle { id })
    }

    /// Deletes an element. Markers lose a deleted eraser.
    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        let element = self.detach(id)?;
        let erased = self.strip_eraser(id);
        self.changes.push(ElementChange::Deleted(id));
        self.changes
            .extend(erased.iter().copied().map(ElementChange::Saved));
        self.history.record(Edit::Remove {
            element: element.clone(),
            erased,
        });
        self.invalidated = true;
        Some(element)
    }

    /// Inserts loaded elements, skipping ids that are already present or
    /// repeated within the batch, and elements without finite bounds.
    /// Returns how many were inserted.
    pub fn load_elements<I>(&mut self, elements: I) -> usize
    where
        I: IntoIterator<Item = Element>,
    {
        let mut seen = HashSet::new();
        let fresh: Vec<Element> = elements
            .into_iter()
            .filter(|element| {
                let bounds = element.bounds();
                if bounds.is_empty() || !bounds.is_finite() {
                    warn!("Skipping element {} without finite bounds", element.id());
                    return false;
                }
                !self.elements.contains_key(&element.id()) && seen.insert(element.id())
            })
            .collect();
        let count = fresh.len();
        if count == 0 {
            return 0;
        }
        if self.index.is_empty() {
            let items = fresh.iter().map(|e| (e.id(), e.bounds())).collect();
            self.index.bulk_load(items);
            for element in fresh {
                self.next_id = self.next_id.max(element.id().0 + 1);
                self.elements.insert(element.id(), element);
            }
        } else {
            for element in fresh {
                self.attach(element);
            }
        }
        info!("Loaded {} elements into the document", count);
        self.invalidated = true;
        count
    }

    /// Removes every element and forgets history.
    pub fn clear(&mut self) {
        self.cancel_stroke();
        let mut ids: Vec<ElementId> = self.elements.keys().copied().collect();
        ids.sort();
        self.changes
            .extend(ids.into_iter().map(ElementChange::Deleted));
        self.elements.clear();
        self.index.clear();
        self.previous_stroke = None;
        self.render_type = RenderType::Finished;
        self.history.clear();
        self.invalidated = true;
    }

    /// Reverts the most recent edit. Returns `false` when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(edit) = self.history.pop_undo() else {
            return false;
        };
        match &edit {
            Edit::Insert { element, erased } => {
                let id = element.id();
                self.detach(id);
                for marker in erased {
                    if let Some(Element::Stroke(stroke)) = self.elements.get_mut(marker) {
                        stroke.erasers.remove(&id);
                    }
                }
                self.changes.push(ElementChange::Deleted(id));
                self.changes
                    .extend(erased.iter().copied().map(ElementChange::Saved));
            }
            Edit::Remove { element, erased } => {
                self.attach(element.clone());
                self.restore_eraser(element.id(), erased);
                self.changes.push(ElementChange::Saved(element.id()));
                self.changes
                    .extend(erased.iter().copied().map(ElementChange::Saved));
            }
        }
        self.history.push_redo(edit);
        self.invalidated = true;
        true
    }

    /// Re-applies the most recently undone edit.
    pub fn redo(&mut self) -> bool {
        let Some(edit) = self.history.pop_redo() else {
            return false;
        };
        match &edit {
            Edit::Insert { element, erased } => {
                self.attach(element.clone());
                self.restore_eraser(element.id(), erased);
                self.changes.push(ElementChange::Saved(element.id()));
                self.changes
                    .extend(erased.iter().copied().map(ElementChange::Saved));
            }
            Edit::Remove { element, erased } => {
                let id = element.id();
                self.detach(id);
                for marker in erased {
                    if let Some(Element::Stroke(stroke)) = self.elements.get_mut(marker) {
                        stroke.erasers.remove(&id);
                    }
                }
                self.changes.push(ElementChange::Deleted(id));
                self.changes
                    .extend(erased.iter().copied().map(ElementChange::Saved));
            }
        }
        self.history.push_undo(edit);
        self.invalidated = true;
        true
    }
}
