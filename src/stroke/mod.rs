//! Stroke geometry: quads, pointer smoothing and the incremental generator.

pub mod generator;
pub mod quad;
pub mod smoothing;

pub use generator::{
    GeneratorConfig, Granularity, QuadSink, RotationPolicy, StrokeGenerator, sample_count,
};
pub use quad::{Quad, QuadShape};
pub use smoothing::{MovingAverage, SMOOTHING_WINDOW};
