//! Configuration color types.

use crate::color::{BLACK, Color};
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Color specification - either a named color or RGB values.
///
/// # Examples
/// ```toml
/// # Named color
/// default_color = "red"
///
/// # Custom RGB color (0-255 per component)
/// default_color = [255, 128, 0]  # Orange
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum ColorSpec {
    /// Named color: red, green, blue, yellow, orange, pink, white, black
    Name(String),
    /// RGB color as [red, green, blue] where each component is 0-255
    Rgb([u8; 3]),
}

impl ColorSpec {
    /// Converts the color specification to a [`Color`].
    ///
    /// Unknown color names fall back to black with a warning.
    pub fn to_color(&self) -> Color {
        match self {
            ColorSpec::Name(name) => crate::util::name_to_color(name).unwrap_or_else(|| {
                warn!("Unknown color '{}', using black", name);
                BLACK
            }),
            ColorSpec::Rgb([r, g, b]) => Color {
                r: *r as f64 / 255.0,
                g: *g as f64 / 255.0,
                b: *b as f64 / 255.0,
                a: 1.0,
            },
        }
    }
}

/// Straight-alpha color as `[r, g, b, a]`, each component 0.0 - 1.0.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(transparent)]
pub struct RgbaSpec(pub [f64; 4]);

impl RgbaSpec {
    pub fn to_color(self) -> Color {
        let [r, g, b, a] = self.0;
        Color::new(r, g, b, a)
    }

    /// Clamps every component into 0.0 - 1.0, logging each fix.
    pub(super) fn clamp_components(&mut self, key: &str) {
        for (i, component) in self.0.iter_mut().enumerate() {
            if !(0.0..=1.0).contains(component) {
                warn!(
                    "Invalid {}[{}] = {:.3}, clamping to 0.0-1.0",
                    key, i, component
                );
                *component = if component.is_nan() {
                    0.0
                } else {
                    component.clamp(0.0, 1.0)
                };
            }
        }
    }
}
