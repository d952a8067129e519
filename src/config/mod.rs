//! Configuration file support for strokeboard.
//!
//! This module handles loading and validating user settings from the configuration file
//! located at `~/.config/strokeboard/config.toml`. Settings include the default pen,
//! stroke tessellation, canvas appearance and background persistence.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

pub use enums::{ColorSpec, RgbaSpec};
pub use types::{DrawingConfig, PersistenceConfig, RenderConfig, StrokeConfig};

use crate::element::PenStyle;
use crate::persistence::{FileStoreOptions, RetryPolicy};
use crate::render::RenderSettings;
use crate::stroke::GeneratorConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure containing all user settings.
///
/// This is the root configuration type that gets deserialized from the TOML file.
/// All fields have sensible defaults and will use those if not specified in the config file.
///
/// # Example TOML
/// ```toml
/// [drawing]
/// default_color = "red"
/// default_thickness = 6.0
///
/// [stroke]
/// granularity = "automatic"
///
/// [render]
/// grid_mode = "line"
/// grid_spacing = 32.0
///
/// [persistence]
/// compression = "auto"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Default pen settings
    #[serde(default)]
    pub drawing: DrawingConfig,

    /// Stroke tessellation
    #[serde(default)]
    pub stroke: StrokeConfig,

    /// Canvas appearance and preview export
    #[serde(default)]
    pub render: RenderConfig,

    /// Background saving
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning is logged.
    ///
    /// Validated ranges:
    /// - `drawing.default_thickness`: 1.0 - 100.0
    /// - `drawing.eraser_thickness`: 1.0 - 200.0
    /// - `stroke.step_rate`: 0.01 - 10.0
    /// - `render.grid_spacing`: 5.0 - 500.0
    /// - `render.preview_padding`: 0.0 - 500.0
    /// - `render.preview_max_dimension`: 64 - 8192
    /// - `persistence.max_retries`: 0 - 10
    /// - `persistence.retry_delay_ms`: 0 - 10000
    /// - color components: 0.0 - 1.0
    pub fn validate_and_clamp(&mut self) {
        clamp_f64(
            "default_thickness",
            &mut self.drawing.default_thickness,
            1.0,
            100.0,
        );
        clamp_f64(
            "eraser_thickness",
            &mut self.drawing.eraser_thickness,
            1.0,
            200.0,
        );
        clamp_f64("step_rate", &mut self.stroke.step_rate, 0.01, 10.0);
        clamp_f64("grid_spacing", &mut self.render.grid_spacing, 5.0, 500.0);
        clamp_f64(
            "preview_padding",
            &mut self.render.preview_padding,
            0.0,
            500.0,
        );

        // Preview size: 64 - 8192
        if !(64..=8192).contains(&self.render.preview_max_dimension) {
            log::warn!(
                "Invalid preview_max_dimension {}, clamping to 64-8192 range",
                self.render.preview_max_dimension
            );
            self.render.preview_max_dimension = self.render.preview_max_dimension.clamp(64, 8192);
        }

        // Retries: 0 - 10
        if self.persistence.max_retries > 10 {
            log::warn!(
                "Invalid max_retries {}, clamping to 0-10 range",
                self.persistence.max_retries
            );
            self.persistence.max_retries = 10;
        }

        // Retry delay: 0 - 10000 ms
        if self.persistence.retry_delay_ms > 10_000 {
            log::warn!(
                "Invalid retry_delay_ms {}, clamping to 0-10000 range",
                self.persistence.retry_delay_ms
            );
            self.persistence.retry_delay_ms = 10_000;
        }

        self.render.grid_color.clamp_components("grid_color");
        self.render
            .background_color
            .clamp_components("background_color");
    }

    /// Returns the path to the configuration file.
    ///
    /// The config file is located at `~/.config/strokeboard/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("strokeboard");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined, or if the file
    /// exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`, or returns defaults if the file is missing.
    ///
    /// All loaded values are validated and clamped to acceptable ranges.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Writes the documented example config to `config_path`.
    ///
    /// # Errors
    /// Returns an error if a file already exists there or it cannot be written.
    pub fn create_default_file(config_path: &Path) -> Result<()> {
        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Config file already exists at {}",
                config_path.display()
            ));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let default_config = include_str!("../../config.example.toml");
        fs::write(config_path, default_config)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Created default config at {}", config_path.display());
        Ok(())
    }

    /// JSON schema of the configuration file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Marker pen a new canvas starts with.
    pub fn pen_style(&self) -> PenStyle {
        PenStyle::marker(
            self.drawing.default_color.to_color(),
            self.drawing.default_thickness,
        )
    }

    pub fn eraser_style(&self) -> PenStyle {
        PenStyle::eraser(self.drawing.eraser_thickness)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            granularity: self.stroke.granularity,
            step_rate: self.stroke.step_rate,
            rotation: self.stroke.rotation,
            seed: self.stroke.seed,
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            grid_mode: self.render.grid_mode,
            grid_spacing: self.render.grid_spacing,
            grid_color: self.render.grid_color.to_color(),
            background: self.render.background_color.to_color(),
            preview_padding: self.render.preview_padding,
            preview_max_dimension: self.render.preview_max_dimension,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.persistence.max_retries,
            delay: Duration::from_millis(self.persistence.retry_delay_ms),
        }
    }

    pub fn file_store_options(&self) -> FileStoreOptions {
        FileStoreOptions {
            compression: self.persistence.compression,
            ..FileStoreOptions::default()
        }
    }
}

fn clamp_f64(key: &str, value: &mut f64, min: f64, max: f64) {
    if !(min..=max).contains(value) {
        log::warn!(
            "Invalid {} {:.2}, clamping to {}-{} range",
            key,
            value,
            min,
            max
        );
        *value = if value.is_nan() {
            min
        } else {
            value.clamp(min, max)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BLACK, RED};
    use crate::persistence::CompressionMode;
    use crate::render::GridMode;
    use crate::stroke::{Granularity, RotationPolicy};
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.drawing.default_thickness, 4.0);
        assert_eq!(config.pen_style().color, BLACK);
        assert_eq!(config.render_settings(), RenderSettings::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[drawing]
default_color = "red"
smoothing = true

[stroke]
granularity = "fixed"
rotation = "random"
seed = 7

[render]
grid_mode = "line"

[persistence]
compression = "on"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pen_style().color, RED);
        assert!(config.drawing.smoothing);
        assert_eq!(config.drawing.eraser_thickness, 20.0);
        let generator = config.generator_config();
        assert_eq!(generator.granularity, Granularity::Fixed);
        assert_eq!(generator.rotation, RotationPolicy::Random);
        assert_eq!(generator.seed, 7);
        assert_eq!(config.render.grid_mode, GridMode::Line);
        assert_eq!(config.render.grid_spacing, 40.0);
        assert_eq!(config.file_store_options().compression, CompressionMode::On);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = Config::default();
        config.drawing.default_thickness = 500.0;
        config.drawing.eraser_thickness = f64::NAN;
        config.stroke.step_rate = 0.0;
        config.render.grid_spacing = 1.0;
        config.render.preview_max_dimension = 10;
        config.render.grid_color = RgbaSpec([2.0, -1.0, 0.5, 0.5]);
        config.persistence.max_retries = 99;
        config.persistence.retry_delay_ms = 60_000;

        config.validate_and_clamp();

        assert_eq!(config.drawing.default_thickness, 100.0);
        assert_eq!(config.drawing.eraser_thickness, 1.0);
        assert_eq!(config.stroke.step_rate, 0.01);
        assert_eq!(config.render.grid_spacing, 5.0);
        assert_eq!(config.render.preview_max_dimension, 64);
        assert_eq!(config.render.grid_color, RgbaSpec([1.0, 0.0, 0.5, 0.5]));
        assert_eq!(config.persistence.max_retries, 10);
        assert_eq!(config.persistence.retry_delay_ms, 10_000);
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[render\ngrid_mode = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config"));
    }

    #[test]
    fn rgb_and_unknown_color_names() {
        let red = ColorSpec::Rgb([255, 0, 0]).to_color();
        assert_eq!(red, RED);
        assert_eq!(ColorSpec::Name("mauve".into()).to_color(), BLACK);
    }

    #[test]
    fn example_file_parses_to_defaults() {
        let example: Config = toml::from_str(include_str!("../../config.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(example.render_settings(), defaults.render_settings());
        assert_eq!(example.generator_config(), defaults.generator_config());
        assert_eq!(example.pen_style(), defaults.pen_style());
        assert_eq!(example.retry_policy(), defaults.retry_policy());
    }

    #[test]
    fn create_default_file_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::create_default_file(&path).unwrap();
        assert!(Config::create_default_file(&path).is_err());
        assert!(Config::load_from(&path).is_ok());
    }

    #[test]
    fn schema_names_every_section() {
        let schema = serde_json::to_value(Config::json_schema()).unwrap();
        let properties = &schema["properties"];
        for section in ["drawing", "stroke", "render", "persistence"] {
            assert!(properties.get(section).is_some(), "missing {section}");
        }
    }
}
