use super::*;
use crate::geometry::BoundingBox;
use std::collections::HashSet;

fn bx(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
    BoundingBox::new(min_x, min_y, max_x, max_y).unwrap()
}

/// Deterministic scatter of small boxes over a 1000x1000 area.
fn scattered_boxes(count: usize) -> Vec<BoundingBox> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f64 / 10.0
    };
    (0..count)
        .map(|_| {
            let x = next();
            let y = next();
            let w = next() / 20.0;
            let h = next() / 20.0;
            bx(x, y, x + w, y + h)
        })
        .collect()
}

#[test]
fn empty_tree_search_returns_nothing() {
    let tree: RTree<u32> = RTree::new();
    assert!(tree.search(&bx(-1e9, -1e9, 1e9, 1e9)).is_empty());
    assert_eq!(tree.traverse().count(), 0);
    assert_eq!(tree.height(), 1);
    tree.assert_invariants();
}

#[test]
fn search_returns_only_intersecting_elements() {
    let mut tree = RTree::new();
    tree.insert(1, bx(0.0, 0.0, 1.0, 1.0));
    tree.insert(2, bx(5.0, 5.0, 6.0, 6.0));
    tree.insert(3, bx(0.5, 0.5, 2.0, 2.0));

    let mut hits = tree.search(&bx(0.0, 0.0, 1.5, 1.5));
    hits.sort_unstable();
    assert_eq!(hits, vec![1, 3]);
}

#[test]
fn containment_invariant_holds_while_growing() {
    let mut tree = RTree::new();
    for (key, bounds) in scattered_boxes(500).into_iter().enumerate() {
        tree.insert(key, bounds);
        if key % 37 == 0 {
            tree.assert_invariants();
        }
    }
    tree.assert_invariants();
    assert_eq!(tree.len(), 500);
    assert!(tree.height() >= 3, "500 entries need several levels");
}

#[test]
fn search_matches_brute_force() {
    let boxes = scattered_boxes(400);
    let mut tree = RTree::new();
    for (key, bounds) in boxes.iter().enumerate() {
        tree.insert(key, *bounds);
    }

    let queries = [
        bx(0.0, 0.0, 100.0, 100.0),
        bx(250.0, 400.0, 600.0, 420.0),
        bx(999.0, 999.0, 2000.0, 2000.0),
        bx(-50.0, -50.0, -1.0, -1.0),
    ];
    for query in queries {
        let found: HashSet<usize> = tree.search(&query).into_iter().collect();
        let expected: HashSet<usize> = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&query))
            .map(|(key, _)| key)
            .collect();
        assert_eq!(found, expected, "query {:?}", query);
    }
}

#[test]
fn traversal_yields_each_key_once_and_restarts() {
    let mut tree = RTree::new();
    for (key, bounds) in scattered_boxes(123).into_iter().enumerate() {
        tree.insert(key, bounds);
    }
    let first: Vec<usize> = tree.traverse().collect();
    assert_eq!(first.len(), 123);
    let unique: HashSet<usize> = first.iter().copied().collect();
    assert_eq!(unique.len(), 123);

    let second: Vec<usize> = tree.traverse().collect();
    assert_eq!(first, second);
}

#[test]
fn remove_condenses_and_keeps_invariants() {
    let boxes = scattered_boxes(200);
    let mut tree = RTree::new();
    for (key, bounds) in boxes.iter().enumerate() {
        tree.insert(key, *bounds);
    }

    for (key, bounds) in boxes.iter().enumerate().filter(|(key, _)| key % 2 == 0) {
        assert!(tree.remove(key, bounds));
    }
    tree.assert_invariants();
    assert_eq!(tree.len(), 100);
    assert!(!tree.remove(0, &boxes[0]), "already removed");

    let remaining: HashSet<usize> = tree.traverse().collect();
    assert!(remaining.iter().all(|key| key % 2 == 1));

    for (key, bounds) in boxes.iter().enumerate().filter(|(key, _)| key % 2 == 1) {
        assert!(tree.remove(key, bounds));
    }
    assert!(tree.is_empty());
    assert!(tree.bounds().is_empty());
    tree.assert_invariants();
}

#[test]
fn removed_slots_are_reused() {
    let mut tree = RTree::new();
    tree.insert(1u8, bx(0.0, 0.0, 1.0, 1.0));
    tree.insert(2u8, bx(2.0, 2.0, 3.0, 3.0));
    assert!(tree.remove(1, &bx(0.0, 0.0, 1.0, 1.0)));
    tree.insert(3u8, bx(4.0, 4.0, 5.0, 5.0));
    tree.assert_invariants();
    assert_eq!(tree.bounds(), bx(2.0, 2.0, 5.0, 5.0));
}

#[test]
fn bulk_load_packs_a_valid_tree() {
    let boxes = scattered_boxes(1000);
    let mut tree = RTree::new();
    tree.bulk_load(boxes.iter().copied().enumerate().collect());
    tree.assert_invariants();
    assert_eq!(tree.len(), 1000);

    let query = bx(100.0, 100.0, 300.0, 300.0);
    let found: HashSet<usize> = tree.search(&query).into_iter().collect();
    let expected: HashSet<usize> = boxes
        .iter()
        .enumerate()
        .filter(|(_, b)| b.intersects(&query))
        .map(|(key, _)| key)
        .collect();
    assert_eq!(found, expected);

    // Loading into a populated tree inserts one by one.
    tree.bulk_load(vec![(5000, bx(0.0, 0.0, 1.0, 1.0))]);
    tree.assert_invariants();
    assert_eq!(tree.len(), 1001);
}
