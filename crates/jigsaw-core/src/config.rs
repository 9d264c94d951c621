//! Session configuration.
//!
//! Every tunable has a default constant; config files only need to name the
//! values they change. With the `data-loader` feature, [`load_config`] reads
//! RON, TOML or JSON, picked by file extension.

use serde::{Deserialize, Serialize};
#[cfg(feature = "data-loader")]
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Screen-pixel distance within which matching waypoints count as touching.
pub const POSITION_TOLERANCE_PX: f32 = 12.0;
/// Max spread between the three waypoint-pair distances, in screen pixels.
pub const PROFILE_TOLERANCE_PX: f32 = 6.0;
/// Candidate search radius, as a multiple of the longest scaled frame side.
pub const SEARCH_RADIUS_FACTOR: f32 = 1.5;

/// Corner tolerance for confirming in-group neighbors: `18 * scale + 4`.
pub const CONNECT_TOLERANCE_PER_SCALE: f32 = 18.0;
pub const CONNECT_TOLERANCE_BASE: f32 = 4.0;

/// Table area used for the initial scatter, relative to the image size.
pub const SCATTER_SPREAD: f32 = 1.6;

pub const EVENT_HISTORY: usize = 256;
pub const COMMAND_HISTORY: usize = 64;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Connection matcher tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub position_tolerance_px: f32,
    pub profile_tolerance_px: f32,
    pub search_radius_factor: f32,
    /// Only test bump/dent pairs instead of any two interior sides.
    pub require_complementary: bool,
    /// Only test the edge a piece shares with a grid neighbor in the solved
    /// puzzle. Off, every pair of interior sides is tried.
    pub neighbors_only: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            position_tolerance_px: POSITION_TOLERANCE_PX,
            profile_tolerance_px: PROFILE_TOLERANCE_PX,
            search_radius_factor: SEARCH_RADIUS_FACTOR,
            require_complementary: false,
            neighbors_only: true,
        }
    }
}

impl MatchConfig {
    /// Squared world-space waypoint tolerance at a zoom level. Divides by
    /// `zoom²` so the on-screen tolerance stays constant.
    pub fn position_tolerance_sq(&self, zoom: f32) -> f32 {
        let tol = self.position_tolerance_px;
        (tol * tol) / (zoom * zoom)
    }

    /// World-space profile tolerance at a zoom level.
    pub fn profile_tolerance(&self, zoom: f32) -> f32 {
        self.profile_tolerance_px / zoom
    }
}

/// Tolerance for the corner check that confirms two grid neighbors are
/// still physically joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub tolerance_per_scale: f32,
    pub tolerance_base: f32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            tolerance_per_scale: CONNECT_TOLERANCE_PER_SCALE,
            tolerance_base: CONNECT_TOLERANCE_BASE,
        }
    }
}

impl ConnectivityConfig {
    pub fn tolerance(&self, avg_scale: f32) -> f32 {
        self.tolerance_per_scale * avg_scale + self.tolerance_base
    }
}

/// Spatial index sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub cell_size_factor: f32,
    pub min_cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size_factor: jigsaw_spatial::CELL_SIZE_FACTOR,
            min_cell_size: jigsaw_spatial::MIN_CELL_SIZE,
        }
    }
}

/// Table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub scatter_spread: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            scatter_spread: SCATTER_SPREAD,
        }
    }
}

/// Top-level configuration for a [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub matching: MatchConfig,
    pub connectivity: ConnectivityConfig,
    pub spatial: SpatialConfig,
    pub table: TableConfig,
    /// Delivered events kept for inspection. 0 keeps none.
    pub event_history: usize,
    /// Applied commands kept for inspection. 0 keeps none.
    pub command_history: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            matching: MatchConfig::default(),
            connectivity: ConnectivityConfig::default(),
            spatial: SpatialConfig::default(),
            table: TableConfig::default(),
            event_history: EVENT_HISTORY,
            command_history: COMMAND_HISTORY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config value `{field}` must be finite and positive, got {value}")]
    InvalidValue { field: &'static str, value: f32 },

    #[cfg(feature = "data-loader")]
    #[error("unsupported config format: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[cfg(feature = "data-loader")]
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[cfg(feature = "data-loader")]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GameConfig {
    /// Check every numeric tunable is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("matching.position_tolerance_px", self.matching.position_tolerance_px),
            ("matching.profile_tolerance_px", self.matching.profile_tolerance_px),
            ("matching.search_radius_factor", self.matching.search_radius_factor),
            ("connectivity.tolerance_base", self.connectivity.tolerance_base),
            ("spatial.cell_size_factor", self.spatial.cell_size_factor),
            ("spatial.min_cell_size", self.spatial.min_cell_size),
            ("table.scatter_spread", self.table.scatter_spread),
        ];
        for (field, value) in checks {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }
        let per_scale = self.connectivity.tolerance_per_scale;
        if !(per_scale.is_finite() && per_scale >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "connectivity.tolerance_per_scale",
                value: per_scale,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Supported config file formats.
#[cfg(feature = "data-loader")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
#[cfg(feature = "data-loader")]
pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Parse config text in the given format and validate it. `origin` only
/// labels errors.
#[cfg(feature = "data-loader")]
pub fn parse_config(content: &str, format: Format, origin: &Path) -> Result<GameConfig, ConfigError> {
    let parse_err = |detail: String| ConfigError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    let config: GameConfig = match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
    };
    config.validate()?;
    Ok(config)
}

/// Read and validate a config file.
#[cfg(feature = "data-loader")]
pub fn load_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, format, path)?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.position_tolerance_px, POSITION_TOLERANCE_PX);
        assert_eq!(config.spatial.min_cell_size, 80.0);
    }

    #[test]
    fn tolerance_scales_with_zoom() {
        let m = MatchConfig::default();
        let at_one = m.position_tolerance_sq(1.0);
        let at_two = m.position_tolerance_sq(2.0);
        assert_eq!(at_one, 144.0);
        assert_eq!(at_two, 36.0);
        assert_eq!(m.profile_tolerance(2.0), 3.0);
    }

    #[test]
    fn connect_tolerance_formula() {
        let c = ConnectivityConfig::default();
        assert_eq!(c.tolerance(1.0), 22.0);
        assert_eq!(c.tolerance(0.5), 13.0);
    }

    #[test]
    fn validate_rejects_zero_tolerance() {
        let mut config = GameConfig::default();
        config.matching.profile_tolerance_px = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "matching.profile_tolerance_px",
                ..
            })
        ));
    }

    #[cfg(feature = "data-loader")]
    mod loader {
        use super::super::*;

        #[test]
        fn detect_formats() {
            assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
            assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
            assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
            assert!(matches!(
                detect_format(Path::new("a.yaml")),
                Err(ConfigError::UnsupportedFormat { .. })
            ));
        }

        #[test]
        fn partial_toml_keeps_defaults() {
            let text = "event_history = 8\n\n[matching]\nposition_tolerance_px = 20.0\n";
            let config = parse_config(text, Format::Toml, Path::new("game.toml")).unwrap();
            assert_eq!(config.event_history, 8);
            assert_eq!(config.matching.position_tolerance_px, 20.0);
            assert_eq!(config.matching.profile_tolerance_px, PROFILE_TOLERANCE_PX);
        }

        #[test]
        fn json_and_ron() {
            let json = r#"{ "matching": { "require_complementary": true } }"#;
            let config = parse_config(json, Format::Json, Path::new("game.json")).unwrap();
            assert!(config.matching.require_complementary);

            let ron = "(table: (scatter_spread: 2.0))";
            let config = parse_config(ron, Format::Ron, Path::new("game.ron")).unwrap();
            assert_eq!(config.table.scatter_spread, 2.0);
        }

        #[test]
        fn parse_errors_name_the_file() {
            let err = parse_config("{ nope", Format::Json, Path::new("broken.json")).unwrap_err();
            assert!(err.to_string().contains("broken.json"));
        }

        #[test]
        fn invalid_values_rejected_after_parse() {
            let text = "[connectivity]\ntolerance_base = -1.0\n";
            let err = parse_config(text, Format::Toml, Path::new("game.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }));
        }

        #[test]
        fn missing_file_is_io_error() {
            let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Io(_)));
        }
    }
}
