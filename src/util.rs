//! Utility functions for color names and pixel rectangles.
//!
//! This module provides:
//! - Color name mapping for the configuration file and the CLI summary
//! - A pixel-space rectangle used for clip bounds and rasteriser scissoring

use crate::color::*;
use crate::geometry::{BoundingBox, Extent};

// ============================================================================
// Color Mapping
// ============================================================================

/// Maps color name strings to Color values.
///
/// Used by the configuration system to parse color names from the config file.
///
/// # Supported Names (case-insensitive)
/// - "red", "green", "blue", "yellow", "orange", "pink", "white", "black"
///
/// # Returns
/// - `Some(Color)` if the name matches a predefined color
/// - `None` if the name is not recognized
pub fn name_to_color(name: &str) -> Option<Color> {
    match name.to_lowercase().as_str() {
        "red" => Some(RED),
        "green" => Some(GREEN),
        "blue" => Some(BLUE),
        "yellow" => Some(YELLOW),
        "orange" => Some(ORANGE),
        "pink" => Some(PINK),
        "white" => Some(WHITE),
        "black" => Some(BLACK),
        _ => None,
    }
}

/// Maps a Color value to its human-readable name.
///
/// Uses approximate matching (threshold-based) to identify colors.
/// Returns "Custom" if the color doesn't match any predefined color.
pub fn color_to_name(color: &Color) -> &'static str {
    // Match colors approximately with 0.1 tolerance
    if color.r > 0.9 && color.g < 0.1 && color.b < 0.1 {
        "Red"
    } else if color.r < 0.1 && color.g > 0.9 && color.b < 0.1 {
        "Green"
    } else if color.r < 0.1 && color.g < 0.1 && color.b > 0.9 {
        "Blue"
    } else if color.r > 0.9 && color.g > 0.9 && color.b < 0.1 {
        "Yellow"
    } else if color.r > 0.9 && (0.4..=0.6).contains(&color.g) && color.b < 0.1 {
        "Orange"
    } else if color.r > 0.9 && color.g < 0.1 && color.b > 0.9 {
        "Pink"
    } else if color.r > 0.9 && color.g > 0.9 && color.b > 0.9 {
        "White"
    } else if color.r < 0.1 && color.g < 0.1 && color.b < 0.1 {
        "Black"
    } else {
        "Custom"
    }
}

// ============================================================================
// Pixel Rectangles
// ============================================================================

/// Axis-aligned pixel rectangle (inclusive min, exclusive max).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle. Returns `None` for an empty area.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self {
                x,
                y,
                width,
                height,
            })
        }
    }

    /// The whole surface of `extent`.
    pub fn full(extent: Extent) -> Option<Self> {
        Self::new(0, 0, extent.width, extent.height)
    }

    /// Pixel cover of a view-space box, clamped to `extent`.
    pub fn covering(bounds: &BoundingBox, extent: Extent) -> Option<Self> {
        if bounds.is_empty() {
            return None;
        }
        let clamp_x = |v: f64| v.clamp(0.0, extent.width as f64) as u32;
        let clamp_y = |v: f64| v.clamp(0.0, extent.height as f64) as u32;
        let min_x = clamp_x(bounds.min_x.floor());
        let min_y = clamp_y(bounds.min_y.floor());
        let max_x = clamp_x(bounds.max_x.ceil());
        let max_y = clamp_y(bounds.max_y.ceil());
        Self::new(
            min_x,
            min_y,
            max_x.saturating_sub(min_x),
            max_y.saturating_sub(min_y),
        )
    }

    pub fn max_x(&self) -> u32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }
}
