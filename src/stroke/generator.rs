//! Incremental tessellation of pointer samples into quads.
//!
//! Key points arrive one at a time. Each new point emits a straight quadratic
//! segment to it. From the fourth point on, the previously emitted tail is
//! removed again and re-emitted as a smoothed curve through a corrected key
//! point, so corners never become visible while the user keeps drawing.

use super::quad::{Quad, QuadShape};
use crate::color::Color;
use crate::geometry::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Density policy for Bézier sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// `min(5, 50 / thickness)` samples per world unit.
    #[default]
    Automatic,
    /// `1 / (thickness * step_rate)` samples per world unit.
    Fixed,
    /// `50 / thickness` samples per world unit, uncapped.
    None,
}

impl Granularity {
    /// Samples emitted per unit of curve length.
    pub fn factor(self, thickness: f64, step_rate: f64) -> f64 {
        match self {
            Granularity::Automatic => (1.0 / (thickness / 50.0)).min(5.0),
            Granularity::Fixed => 1.0 / (thickness * step_rate),
            Granularity::None => 1.0 / (thickness * 10.0 / 500.0),
        }
    }
}

/// How each emitted quad is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Every quad has rotation 0.
    #[default]
    Fixed,
    /// Rotation drawn from a seeded sequence in `[0, 2π)`.
    Random,
}

/// Tunables shared by every stroke drawn with the same settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    pub granularity: Granularity,
    pub step_rate: f64,
    pub rotation: RotationPolicy,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Automatic,
            step_rate: 0.1,
            rotation: RotationPolicy::Fixed,
            seed: 0,
        }
    }
}

/// Destination of generated quads. The generator only ever truncates quads it
/// emitted itself.
pub trait QuadSink {
    fn push_quad(&mut self, quad: Quad);
    /// Drops every quad at position `from` and after.
    fn remove_quads(&mut self, from: usize);
    fn quad_count(&self) -> usize;
}

impl QuadSink for Vec<Quad> {
    fn push_quad(&mut self, quad: Quad) {
        self.push(quad);
    }

    fn remove_quads(&mut self, from: usize) {
        self.truncate(from);
    }

    fn quad_count(&self) -> usize {
        self.len()
    }
}

/// Output `index` of a SplitMix64 sequence seeded with `seed`.
fn splitmix64(seed: u64, index: u64) -> u64 {
    const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut z = seed
        .wrapping_add(index.wrapping_mul(GOLDEN))
        .wrapping_add(GOLDEN);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Number of samples for a curve whose end points are `distance` apart.
pub fn sample_count(distance: f64, factor: f64) -> usize {
    let raw = distance * factor;
    if raw.is_finite() && raw >= 1.0 {
        raw.floor() as usize
    } else {
        1
    }
}

/// Stateful stroke tessellator.
#[derive(Debug, Clone)]
pub struct StrokeGenerator {
    config: GeneratorConfig,
    thickness: f64,
    shape: QuadShape,
    color: Color,
    key_points: Vec<Point>,
    /// First quad of the most recent (re-computable) tail segment.
    segment_start: usize,
    /// Where the re-computable tail begins.
    tail_anchor: Point,
    emitted: u64,
}

impl StrokeGenerator {
    pub fn new(config: GeneratorConfig, thickness: f64, shape: QuadShape, color: Color) -> Self {
        Self {
            config,
            thickness,
            shape,
            color,
            key_points: Vec::new(),
            segment_start: 0,
            tail_anchor: Point::default(),
            emitted: 0,
        }
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn key_points(&self) -> &[Point] {
        &self.key_points
    }

    pub fn is_active(&self) -> bool {
        !self.key_points.is_empty()
    }

    fn factor(&self) -> f64 {
        self.config
            .granularity
            .factor(self.thickness, self.config.step_rate)
    }

    fn next_rotation(&mut self) -> f64 {
        match self.config.rotation {
            RotationPolicy::Fixed => 0.0,
            RotationPolicy::Random => {
                let bits = splitmix64(self.config.seed, self.emitted);
                self.emitted += 1;
                // Top 53 bits as a fraction in [0, 1).
                (bits >> 11) as f64 / (1u64 << 53) as f64 * TAU
            }
        }
    }

    fn emit(&mut self, origin: Point, sink: &mut dyn QuadSink) {
        let rotation = self.next_rotation();
        sink.push_quad(Quad::new(
            origin,
            self.thickness,
            rotation,
            self.shape,
            self.color,
        ));
    }

    /// Sample points of the curve `start -> end` with `control`, excluding
    /// `start` and including `end`. Pure.
    pub fn curve_points(&self, start: Point, control: Point, end: Point) -> Vec<Point> {
        let count = sample_count(start.distance(end), self.factor());
        (1..=count)
            .map(|i| Point::quadratic(start, control, end, i as f64 / count as f64))
            .collect()
    }

    /// Emits one quad per sample of the curve `start -> end`.
    pub fn generate_curve(
        &mut self,
        start: Point,
        control: Point,
        end: Point,
        sink: &mut dyn QuadSink,
    ) {
        for point in self.curve_points(start, control, end) {
            self.emit(point, sink);
        }
    }

    /// Starts a stroke at `point` with a single quad.
    pub fn begin(&mut self, point: Point, sink: &mut dyn QuadSink) {
        self.key_points.clear();
        self.key_points.push(point);
        self.segment_start = sink.quad_count();
        self.tail_anchor = point;
        self.emit(point, sink);
    }

    /// Adds a key point and (re)emits the tail of the stroke.
    pub fn append(&mut self, point: Point, sink: &mut dyn QuadSink) {
        if self.key_points.is_empty() {
            self.begin(point, sink);
            return;
        }
        self.key_points.push(point);
        let n = self.key_points.len();

        if n < 4 {
            let previous = self.key_points[n - 2];
            self.segment_start = sink.quad_count();
            self.tail_anchor = previous;
            self.generate_curve(previous, previous.middle(point), point, sink);
            return;
        }

        sink.remove_quads(self.segment_start);

        let before = self.key_points[n - 3];
        let corrected = before.middle(point).middle(self.key_points[n - 2]);
        self.key_points[n - 2] = corrected;
        let joint = corrected.middle(point);

        let anchor = self.tail_anchor;
        self.generate_curve(anchor, corrected, joint, sink);

        self.segment_start = sink.quad_count();
        self.tail_anchor = joint;
        self.generate_curve(joint, joint.middle(point), point, sink);
    }

    /// Adds the terminal point, emits the closing curve and clears the key points.
    pub fn finish(&mut self, point: Point, sink: &mut dyn QuadSink) {
        self.append(point, sink);
        self.key_points.clear();
    }

    /// Forgets the key points without touching already emitted quads.
    pub fn cancel(&mut self) {
        self.key_points.clear();
        self.segment_start = 0;
    }
}
