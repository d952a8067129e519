//! Spatial index used to cull elements against the visible world rectangle.

pub mod rtree;

pub use rtree::{MAX_ENTRIES, MIN_ENTRIES, RTree, Traverse};

#[cfg(test)]
mod tests;
