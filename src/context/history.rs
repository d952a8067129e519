use crate::element::{Element, ElementId};
use std::collections::VecDeque;

/// Edits kept for undo; older entries are dropped first.
pub const MAX_HISTORY: usize = 256;

/// A reversible document edit.
#[derive(Debug, Clone)]
pub(crate) enum Edit {
    /// An element was added. `erased` lists markers that gained this eraser.
    Insert {
        element: Element,
        erased: Vec<ElementId>,
    },
    /// An element was deleted. `erased` lists markers that lost this eraser.
    Remove {
        element: Element,
        erased: Vec<ElementId>,
    },
}

/// Undo/redo stacks of whole-element edits.
#[derive(Debug, Default)]
pub(crate) struct History {
    undo: VecDeque<Edit>,
    redo: Vec<Edit>,
}

impl History {
    /// Records a fresh edit, invalidating the redo stack.
    pub fn record(&mut self, edit: Edit) {
        self.redo.clear();
        self.push_undo(edit);
    }

    pub fn push_undo(&mut self, edit: Edit) {
        if self.undo.len() == MAX_HISTORY {
            self.undo.pop_front();
        }
        self.undo.push_back(edit);
    }

    pub fn pop_undo(&mut self) -> Option<Edit> {
        self.undo.pop_back()
    }

    pub fn push_redo(&mut self, edit: Edit) {
        self.redo.push(edit);
    }

    pub fn pop_redo(&mut self) -> Option<Edit> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
