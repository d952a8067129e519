use super::{Element, ElementId, ElementKind};
use crate::geometry::BoundingBox;
use std::collections::BTreeSet;

/// A run of consecutive same-kind elements drawn as one batch.
#[derive(Debug, Clone)]
pub struct ElementGroup<'a> {
    pub kind: ElementKind,
    /// Eraser strokes already baked into every member.
    pub erasers: BTreeSet<ElementId>,
    pub elements: Vec<&'a Element>,
    pub bounds: BoundingBox,
}

impl<'a> ElementGroup<'a> {
    fn start(element: &'a Element) -> Self {
        Self {
            kind: element.kind(),
            erasers: element.erasers().cloned().unwrap_or_default(),
            elements: vec![element],
            bounds: element.bounds(),
        }
    }

    /// Whether `element` continues this group: same kind, and its erasers are
    /// a superset of (or equal to) the group's.
    pub fn accepts(&self, element: &Element) -> bool {
        if element.kind() != self.kind {
            return false;
        }
        match element.erasers() {
            Some(erasers) => erasers.is_superset(&self.erasers),
            None => self.erasers.is_empty(),
        }
    }

    fn push(&mut self, element: &'a Element) {
        self.bounds.enlarge(&element.bounds());
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Splits an ordered element sequence into consecutive groups.
pub fn group_elements<'a, I>(elements: I) -> Vec<ElementGroup<'a>>
where
    I: IntoIterator<Item = &'a Element>,
{
    let mut groups: Vec<ElementGroup<'a>> = Vec::new();
    for element in elements {
        match groups.last_mut() {
            Some(group) if group.accepts(element) => group.push(element),
            _ => groups.push(ElementGroup::start(element)),
        }
    }
    groups
}
