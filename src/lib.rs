//! Library exports for the strokeboard ink engine.
//!
//! The subsystems are layered bottom-up: geometry and the spatial index, the
//! stroke generator and element model, the live document context, the GPU
//! device abstraction with the render passes on top, background persistence,
//! and the [`canvas::Canvas`] facade tying them to one view.

pub mod canvas;
pub mod color;
pub mod config;
pub mod context;
pub mod element;
#[cfg(feature = "png")]
pub mod export;
pub mod geometry;
pub mod gpu;
pub mod index;
pub mod persistence;
pub mod render;
pub mod stroke;
pub mod util;

pub use canvas::{Canvas, Document};
pub use config::Config;
