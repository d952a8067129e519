//! Configuration type definitions.

use super::enums::{ColorSpec, RgbaSpec};
use crate::persistence::CompressionMode;
use crate::render::GridMode;
use crate::stroke::{Granularity, RotationPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Drawing-related settings.
///
/// Controls the pen a new canvas starts with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DrawingConfig {
    /// Default pen color - either a named color (red, green, blue, yellow, orange, pink, white, black)
    /// or an RGB array like `[255, 0, 0]` for red
    #[serde(default = "default_color")]
    pub default_color: ColorSpec,

    /// Default marker thickness in world units (valid range: 1.0 - 100.0)
    #[serde(default = "default_thickness")]
    pub default_thickness: f64,

    /// Default eraser thickness in world units (valid range: 1.0 - 200.0)
    #[serde(default = "default_eraser_thickness")]
    pub eraser_thickness: f64,

    /// Average the last three pointer samples before they become key points
    #[serde(default)]
    pub smoothing: bool,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            default_color: default_color(),
            default_thickness: default_thickness(),
            eraser_thickness: default_eraser_thickness(),
            smoothing: false,
        }
    }
}

/// Stroke tessellation settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StrokeConfig {
    /// Sampling density: automatic, fixed or none
    #[serde(default)]
    pub granularity: Granularity,

    /// Spacing factor used by the `fixed` granularity (valid range: 0.01 - 10.0)
    #[serde(default = "default_step_rate")]
    pub step_rate: f64,

    /// Quad rotation: fixed (always 0) or random
    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Seed of the random rotation sequence
    #[serde(default)]
    pub seed: u64,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            step_rate: default_step_rate(),
            rotation: RotationPolicy::default(),
            seed: 0,
        }
    }
}

/// Canvas appearance and preview export.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderConfig {
    /// Background grid: none, point or line
    #[serde(default)]
    pub grid_mode: GridMode,

    /// World units between grid lines (valid range: 5.0 - 500.0)
    #[serde(default = "default_grid_spacing")]
    pub grid_spacing: f64,

    /// Grid color as [r, g, b, a] (0.0 - 1.0 each)
    #[serde(default = "default_grid_color")]
    pub grid_color: RgbaSpec,

    /// Canvas background as [r, g, b, a] (0.0 - 1.0 each)
    #[serde(default = "default_background_color")]
    pub background_color: RgbaSpec,

    /// World units added around the document in previews (valid range: 0.0 - 500.0)
    #[serde(default = "default_preview_padding")]
    pub preview_padding: f64,

    /// Longest preview edge in pixels (valid range: 64 - 8192)
    #[serde(default = "default_preview_max_dimension")]
    pub preview_max_dimension: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            grid_mode: GridMode::default(),
            grid_spacing: default_grid_spacing(),
            grid_color: default_grid_color(),
            background_color: default_background_color(),
            preview_padding: default_preview_padding(),
            preview_max_dimension: default_preview_max_dimension(),
        }
    }
}

/// Background persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PersistenceConfig {
    /// Document compression: off, on or auto
    #[serde(default)]
    pub compression: CompressionMode,

    /// Attempts after the first failure (valid range: 0 - 10)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts in milliseconds (valid range: 0 - 10000)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMode::default(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_color() -> ColorSpec {
    ColorSpec::Name("black".to_string())
}

fn default_thickness() -> f64 {
    4.0
}

fn default_eraser_thickness() -> f64 {
    20.0
}

fn default_step_rate() -> f64 {
    0.1
}

fn default_grid_spacing() -> f64 {
    40.0
}

fn default_grid_color() -> RgbaSpec {
    RgbaSpec([0.0, 0.0, 0.0, 0.15])
}

fn default_background_color() -> RgbaSpec {
    RgbaSpec([1.0, 1.0, 1.0, 1.0])
}

fn default_preview_padding() -> f64 {
    20.0
}

fn default_preview_max_dimension() -> u32 {
    512
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}
