//! Arena-backed R-tree over element keys.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]; parents are tracked with an
//! explicit path stack during insertion and removal instead of back-pointers.
//! Leaves hold exactly one key and its box (height 0); internal nodes hold the
//! union of their children's boxes and a height one greater than their children.

use crate::geometry::BoundingBox;
use log::debug;
use std::cmp::Ordering;
use std::fmt::Debug;

/// Maximum fan-out of an internal node before it splits.
pub const MAX_ENTRIES: usize = 9;
/// Minimum number of children on each side of a split.
pub const MIN_ENTRIES: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Clone, Debug)]
enum NodeKind<K> {
    Leaf(K),
    Internal(Vec<NodeId>),
}

#[derive(Clone, Debug)]
struct Node<K> {
    bounds: BoundingBox,
    height: usize,
    kind: NodeKind<K>,
}

impl<K> Node<K> {
    fn empty_internal(height: usize) -> Self {
        Self {
            bounds: BoundingBox::infinity(),
            height,
            kind: NodeKind::Internal(Vec::new()),
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Balanced bounding-box tree. The tree owns its nodes; keys are plain handles
/// into storage owned elsewhere.
#[derive(Clone)]
pub struct RTree<K> {
    nodes: Vec<Node<K>>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
}

impl<K: Copy + PartialEq + Debug> Default for RTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + PartialEq + Debug> RTree<K> {
    /// Creates an empty tree whose root is an empty internal node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty_internal(1)],
            free: Vec::new(),
            root: NodeId(0),
            len: 0,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the root; 1 while every leaf hangs directly off the root.
    pub fn height(&self) -> usize {
        self.node(self.root).height
    }

    /// Union of every stored box (the infinity sentinel when empty).
    pub fn bounds(&self) -> BoundingBox {
        self.node(self.root).bounds
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Inserts `key` with `bounds`, splitting overflowing nodes on the way back up.
    pub fn insert(&mut self, key: K, bounds: BoundingBox) {
        debug_assert!(!bounds.is_empty(), "inserted box must be well formed");
        let leaf = self.alloc(Node {
            bounds,
            height: 0,
            kind: NodeKind::Leaf(key),
        });

        let mut path = vec![self.root];
        let mut current = self.root;
        while self.node(current).height > 1 {
            current = self.choose_subtree(current, &bounds);
            path.push(current);
        }

        if let NodeKind::Internal(children) = &mut self.node_mut(current).kind {
            children.push(leaf);
        }
        for &id in &path {
            self.node_mut(id).bounds.enlarge(&bounds);
        }
        self.len += 1;

        for level in (0..path.len()).rev() {
            let id = path[level];
            if self.children(id).len() <= MAX_ENTRIES {
                break;
            }
            let sibling = self.split(id);
            if level == 0 {
                self.grow_root(id, sibling);
            } else if let NodeKind::Internal(children) = &mut self.node_mut(path[level - 1]).kind
            {
                children.push(sibling);
            }
        }
    }

    /// Removes the entry `key` previously inserted with `bounds`.
    ///
    /// Returns `false` when no such entry exists. Emptied nodes are dropped and
    /// ancestor boxes recomputed.
    pub fn remove(&mut self, key: K, bounds: &BoundingBox) -> bool {
        let mut path = Vec::new();
        let Some(leaf) = self.find_leaf(self.root, key, bounds, &mut path) else {
            return false;
        };

        if let Some(&parent) = path.last()
            && let NodeKind::Internal(children) = &mut self.node_mut(parent).kind
        {
            children.retain(|&child| child != leaf);
        }
        self.release(leaf);
        self.len -= 1;

        for level in (0..path.len()).rev() {
            let id = path[level];
            if level > 0 && self.children(id).is_empty() {
                if let NodeKind::Internal(children) = &mut self.node_mut(path[level - 1]).kind {
                    children.retain(|&child| child != id);
                }
                self.release(id);
            } else {
                self.update_box(id);
            }
        }

        self.shrink_root();
        true
    }

    /// Keys whose boxes intersect `range`. Subtrees whose box misses `range` are pruned.
    pub fn search(&self, range: &BoundingBox) -> Vec<K> {
        let mut found = Vec::new();
        if self.is_empty() {
            return found;
        }
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if !node.bounds.intersects(range) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(key) => found.push(*key),
                NodeKind::Internal(children) => stack.extend(children.iter().rev()),
            }
        }
        found
    }

    /// Lazy pre-order walk over every stored key. Calling it again restarts the walk.
    pub fn traverse(&self) -> Traverse<'_, K> {
        let stack = if self.is_empty() {
            Vec::new()
        } else {
            vec![self.root]
        };
        Traverse { tree: self, stack }
    }

    /// Loads many entries at once.
    ///
    /// An empty tree is packed with sort-tile-recursive grouping; a populated tree
    /// falls back to one insertion per entry.
    pub fn bulk_load(&mut self, mut items: Vec<(K, BoundingBox)>) {
        if items.is_empty() {
            return;
        }
        if !self.is_empty() || items.len() < MIN_ENTRIES {
            for (key, bounds) in items {
                self.insert(key, bounds);
            }
            return;
        }

        self.clear();
        let count = items.len();
        let mut level: Vec<NodeId> = Vec::with_capacity(count);
        sort_tiles(&mut items, |item| item.1);
        for (key, bounds) in items {
            level.push(self.alloc(Node {
                bounds,
                height: 0,
                kind: NodeKind::Leaf(key),
            }));
        }

        let mut height = 1;
        while level.len() > MAX_ENTRIES {
            let mut groups: Vec<(NodeId, BoundingBox)> = level
                .iter()
                .map(|&id| (id, self.node(id).bounds))
                .collect();
            sort_tiles(&mut groups, |group| group.1);
            let mut next = Vec::with_capacity(groups.len().div_ceil(MAX_ENTRIES));
            for chunk in groups.chunks(MAX_ENTRIES) {
                let children: Vec<NodeId> = chunk.iter().map(|(id, _)| *id).collect();
                let parent = self.alloc(Node {
                    bounds: BoundingBox::infinity(),
                    height,
                    kind: NodeKind::Internal(children),
                });
                self.update_box(parent);
                next.push(parent);
            }
            level = next;
            height += 1;
        }

        let root = self.root;
        {
            let node = self.node_mut(root);
            node.height = height;
            node.kind = NodeKind::Internal(level);
        }
        self.update_box(root);
        self.len = count;
        debug!(
            "bulk loaded {} entries into r-tree of height {}",
            count, height
        );
    }

    fn node(&self, id: NodeId) -> &Node<K> {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K> {
        &mut self.nodes[id.0]
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Internal(children) => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    fn alloc(&mut self, node: Node<K>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                *self.node_mut(id) = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        *self.node_mut(id) = Node::empty_internal(0);
        self.free.push(id);
    }

    /// Recomputes a node's box as the union of its children.
    fn update_box(&mut self, id: NodeId) {
        let bounds = self
            .children(id)
            .iter()
            .fold(BoundingBox::infinity(), |acc, &child| {
                acc.union(&self.node(child).bounds)
            });
        if matches!(self.node(id).kind, NodeKind::Internal(_)) {
            self.node_mut(id).bounds = bounds;
        }
    }

    /// Child whose box grows least when enlarged by `bounds`; ties go to the smaller box.
    fn choose_subtree(&self, id: NodeId, bounds: &BoundingBox) -> NodeId {
        let mut best = None;
        let mut best_enlargement = f64::INFINITY;
        let mut best_area = f64::INFINITY;
        for &child in self.children(id) {
            let child_box = self.node(child).bounds;
            let area = child_box.area();
            let enlargement = child_box.enlarged_area(bounds) - area;
            if enlargement < best_enlargement
                || (enlargement == best_enlargement && area < best_area)
            {
                best_enlargement = enlargement;
                best_area = area;
                best = Some(child);
            }
        }
        best.unwrap_or(id)
    }

    /// Splits an overflowing node, returning the new sibling holding the upper half.
    fn split(&mut self, id: NodeId) -> NodeId {
        let mut children = match &mut self.node_mut(id).kind {
            NodeKind::Internal(children) => std::mem::take(children),
            NodeKind::Leaf(_) => Vec::new(),
        };
        let axis = self.choose_split_axis(&mut children);
        self.sort_along(&mut children, axis);
        let at = self.choose_split_index(&children);
        let upper = children.split_off(at);

        let height = self.node(id).height;
        self.node_mut(id).kind = NodeKind::Internal(children);
        self.update_box(id);
        let sibling = self.alloc(Node {
            bounds: BoundingBox::infinity(),
            height,
            kind: NodeKind::Internal(upper),
        });
        self.update_box(sibling);
        sibling
    }

    /// Axis whose legal distributions have the smallest summed margin.
    fn choose_split_axis(&self, children: &mut [NodeId]) -> Axis {
        self.sort_along(children, Axis::X);
        let x_margin = self.distribution_margin(children);
        self.sort_along(children, Axis::Y);
        let y_margin = self.distribution_margin(children);
        if x_margin < y_margin { Axis::X } else { Axis::Y }
    }

    fn distribution_margin(&self, children: &[NodeId]) -> f64 {
        let n = children.len();
        (MIN_ENTRIES..=n - MIN_ENTRIES)
            .map(|k| {
                self.union_of(&children[..k]).margin() + self.union_of(&children[k..]).margin()
            })
            .sum()
    }

    /// Distribution with the least overlap, ties broken by least total area.
    fn choose_split_index(&self, children: &[NodeId]) -> usize {
        let n = children.len();
        let mut best_index = n - MIN_ENTRIES;
        let mut best_overlap = f64::INFINITY;
        let mut best_area = f64::INFINITY;
        for k in MIN_ENTRIES..=n - MIN_ENTRIES {
            let lower = self.union_of(&children[..k]);
            let upper = self.union_of(&children[k..]);
            let overlap = lower.intersection_area(&upper);
            let area = lower.area() + upper.area();
            if overlap < best_overlap || (overlap == best_overlap && area < best_area) {
                best_overlap = overlap;
                best_area = area;
                best_index = k;
            }
        }
        best_index
    }

    fn sort_along(&self, children: &mut [NodeId], axis: Axis) {
        children.sort_by(|&a, &b| {
            let (a, b) = (self.node(a).bounds, self.node(b).bounds);
            let (a_key, b_key) = match axis {
                Axis::X => ((a.min_x, a.max_x), (b.min_x, b.max_x)),
                Axis::Y => ((a.min_y, a.max_y), (b.min_y, b.max_y)),
            };
            a_key.partial_cmp(&b_key).unwrap_or(Ordering::Equal)
        });
    }

    fn union_of(&self, ids: &[NodeId]) -> BoundingBox {
        ids.iter().fold(BoundingBox::infinity(), |acc, &id| {
            acc.union(&self.node(id).bounds)
        })
    }

    fn grow_root(&mut self, old_root: NodeId, sibling: NodeId) {
        let height = self.node(old_root).height + 1;
        let root = self.alloc(Node {
            bounds: BoundingBox::infinity(),
            height,
            kind: NodeKind::Internal(vec![old_root, sibling]),
        });
        self.update_box(root);
        self.root = root;
        debug!("r-tree grew to height {}", height);
    }

    /// Collapses single-child roots left behind by removals.
    fn shrink_root(&mut self) {
        loop {
            let root = self.root;
            if self.node(root).height <= 1 {
                break;
            }
            match self.children(root) {
                [only] => {
                    let only = *only;
                    self.release(root);
                    self.root = only;
                }
                _ => break,
            }
        }
        if self.is_empty() {
            self.clear();
        }
    }

    /// Finds the leaf holding `key`, recording its ancestors in `path`.
    fn find_leaf(
        &self,
        id: NodeId,
        key: K,
        bounds: &BoundingBox,
        path: &mut Vec<NodeId>,
    ) -> Option<NodeId> {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Leaf(stored) => (*stored == key).then_some(id),
            NodeKind::Internal(children) => {
                if !node.bounds.contains(bounds) {
                    return None;
                }
                path.push(id);
                for &child in children {
                    if let Some(found) = self.find_leaf(child, key, bounds, path) {
                        return Some(found);
                    }
                }
                path.pop();
                None
            }
        }
    }

    /// Checks every structural invariant, panicking with a description on failure.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        fn walk<K: Copy + PartialEq + Debug>(tree: &RTree<K>, id: NodeId, is_root: bool) -> usize {
            let node = tree.node(id);
            match &node.kind {
                NodeKind::Leaf(_) => {
                    assert_eq!(node.height, 0, "leaf height");
                    1
                }
                NodeKind::Internal(children) => {
                    assert!(children.len() <= MAX_ENTRIES, "fan-out exceeds maximum");
                    assert!(is_root || !children.is_empty(), "empty non-root node");
                    let union = tree.union_of(children);
                    assert_eq!(node.bounds, union, "node box is not the union of its children");
                    children
                        .iter()
                        .map(|&child| {
                            assert_eq!(tree.node(child).height + 1, node.height, "uneven heights");
                            walk(tree, child, false)
                        })
                        .sum()
                }
            }
        }
        assert_eq!(walk(self, self.root, true), self.len, "leaf count");
    }
}

impl<K> Debug for RTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTree")
            .field("len", &self.len)
            .field("arena_nodes", &self.nodes.len())
            .field("free_nodes", &self.free.len())
            .finish_non_exhaustive()
    }
}

/// Pre-order iterator returned by [`RTree::traverse`].
pub struct Traverse<'a, K> {
    tree: &'a RTree<K>,
    stack: Vec<NodeId>,
}

impl<K: Copy + PartialEq + Debug> Iterator for Traverse<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        while let Some(id) = self.stack.pop() {
            match &self.tree.node(id).kind {
                NodeKind::Leaf(key) => return Some(*key),
                NodeKind::Internal(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

/// Sort-tile-recursive ordering: vertical slices by centre x, each slice by centre y.
fn sort_tiles<T>(items: &mut [T], bounds_of: impl Fn(&T) -> BoundingBox) {
    let center_cmp = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    items.sort_by(|a, b| center_cmp(bounds_of(a).center().x, bounds_of(b).center().x));
    let parents = items.len().div_ceil(MAX_ENTRIES);
    let slices = (parents as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = (slices * MAX_ENTRIES).max(1);
    for slice in items.chunks_mut(slice_len) {
        slice.sort_by(|a, b| center_cmp(bounds_of(a).center().y, bounds_of(b).center().y));
    }
}
