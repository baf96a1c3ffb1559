//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/hyprexpose/config.json`.
//! The top-level schema has an `"overview"` and a `"gestures"` section; every
//! key is optional and falls back to its compiled-in default.
//!
//! # Example
//!
//! ```json
//! {
//!   "overview": {
//!     "columns": 3,
//!     "gap_size": 5,
//!     "bg_col": "0xff111111",
//!     "include_special": false,
//!     "low_res_previews": false,
//!     "transition": { "duration_ms": 500, "bezier": [0.05, 0.9, 0.1, 1.0] }
//!   },
//!   "gestures": {
//!     "enabled": true,
//!     "fingers": 4,
//!     "distance": 300.0,
//!     "positive": true
//!   }
//! }
//! ```
//!
//! Raw values are checked once by [`Settings::try_from`]; sessions only ever
//! see a validated [`Settings`].

use crate::bezier::BezierCurve;
use crate::command::Color;
use log::warn;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Grid layout and transition settings.
    #[serde(default)]
    pub overview: OverviewConfig,

    /// Touchpad swipe settings.
    #[serde(default)]
    pub gestures: GestureConfig,
}

/// Grid layout and appearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    /// Number of grid columns.  Must be at least `1`.  Default: `3`.
    pub columns: i64,
    /// Gap between tiles in logical pixels.  Default: `5`.
    pub gap_size: i64,
    /// Background colour behind the grid.  Default: `0xff111111`.
    pub bg_col: Color,
    /// Skip windows that have not yet presented any content.  Default: `false`.
    pub skip_empty: bool,
    /// Include windows on special (scratchpad) workspaces.  Default: `false`.
    pub include_special: bool,
    /// Render idle tiles at twice the tile size instead of the full output
    /// resolution.  Default: `false`.
    pub low_res_previews: bool,
    /// Easing used for the open / close transitions.
    pub transition: CurveConfig,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            columns: 3,
            gap_size: 5,
            bg_col: Color::default(),
            skip_empty: false,
            include_special: false,
            low_res_previews: false,
            transition: CurveConfig::default(),
        }
    }
}

/// Duration and cubic-bezier control points of a timed transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Length of the transition in milliseconds.  Default: `500`.
    pub duration_ms: u64,
    /// `[x1, y1, x2, y2]` as in CSS `cubic-bezier()`.
    pub bezier: [f64; 4],
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            duration_ms: 500,
            bezier: [0.05, 0.9, 0.1, 1.0],
        }
    }
}

/// Tuning knobs for the open/close swipe gesture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Whether swipes open the overview at all.  Default: `true`.
    pub enabled: bool,
    /// Number of fingers that trigger the overview.  Default: `4`.
    pub fingers: u32,
    /// Finger travel (px) that takes the grid from single-window to fully
    /// open.  Default: `300.0`.
    pub distance: f64,
    /// `true`: swiping down opens.  `false`: swiping up opens.
    pub positive: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fingers: 4,
            distance: 300.0,
            positive: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    ///
    /// The file is parsed but not validated; see [`Settings::try_from`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Check every value a session relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Settings::try_from(self).map(|_| ())
    }
}

/// Error from loading, parsing or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

//  Validated settings

/// Configuration after validation, in the units the session works in.
#[derive(Debug, Clone)]
pub struct Settings {
    pub columns: NonZeroUsize,
    pub gap: f64,
    pub background: Color,
    pub skip_empty: bool,
    pub include_special: bool,
    pub low_res_previews: bool,
    pub transition: TransitionCurve,
    pub gestures: GestureConfig,
}

/// A named easing configuration ready for the animator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionCurve {
    pub duration: Duration,
    pub curve: BezierCurve,
}

impl TryFrom<&Config> for Settings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, ConfigError> {
        let overview = &config.overview;

        let columns = usize::try_from(overview.columns)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("columns must be >= 1, got {}", overview.columns))
            })?;

        if overview.gap_size < 0 {
            return Err(ConfigError::Invalid(format!(
                "gap_size must not be negative, got {}",
                overview.gap_size
            )));
        }

        let [x1, y1, x2, y2] = overview.transition.bezier;
        if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(ConfigError::Invalid(format!(
                "bezier x control points must lie in [0, 1], got {} and {}",
                x1, x2
            )));
        }
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Invalid("bezier control points must be finite".into()));
        }

        let gestures = &config.gestures;
        if !(gestures.distance.is_finite() && gestures.distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "gesture distance must be > 0, got {}",
                gestures.distance
            )));
        }

        Ok(Settings::assemble(config, columns))
    }
}

impl Settings {
    /// Build settings from a config whose values are already known to be
    /// in range.
    fn assemble(config: &Config, columns: NonZeroUsize) -> Self {
        let overview = &config.overview;
        let [x1, y1, x2, y2] = overview.transition.bezier;
        Settings {
            columns,
            gap: overview.gap_size as f64,
            background: overview.bg_col,
            skip_empty: overview.skip_empty,
            include_special: overview.include_special,
            low_res_previews: overview.low_res_previews,
            transition: TransitionCurve {
                duration: Duration::from_millis(overview.transition.duration_ms),
                curve: BezierCurve::new(x1, y1, x2, y2),
            },
            gestures: config.gestures.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let config = Config::default();
        Settings::try_from(&config).unwrap_or_else(|e| {
            warn!("compiled-in config rejected ({}), using one column", e);
            Settings::assemble(&config, NonZeroUsize::MIN)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_follow_default_config() {
        let settings = Settings::default();
        let config = Config::default();
        assert_eq!(settings.columns.get() as i64, config.overview.columns);
        assert_eq!(settings.gap, config.overview.gap_size as f64);
        assert_eq!(
            settings.transition.duration,
            Duration::from_millis(config.overview.transition.duration_ms)
        );
        assert_eq!(settings.gestures.fingers, config.gestures.fingers);
        assert_eq!(settings.gestures.distance, config.gestures.distance);
    }

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "overview": {
                "columns": 4,
                "gap_size": 10,
                "bg_col": "0xff000000",
                "skip_empty": true,
                "include_special": true,
                "low_res_previews": true,
                "transition": { "duration_ms": 250, "bezier": [0.25, 0.1, 0.25, 1.0] }
            },
            "gestures": {
                "enabled": false,
                "fingers": 3,
                "distance": 200.0,
                "positive": false
            }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.overview.columns, 4);
        assert_eq!(cfg.overview.gap_size, 10);
        assert_eq!(cfg.overview.bg_col, Color::from_argb(0xff00_0000));
        assert!(cfg.overview.skip_empty);
        assert!(cfg.overview.include_special);
        assert!(cfg.overview.low_res_previews);
        assert_eq!(cfg.overview.transition.duration_ms, 250);
        assert!(!cfg.gestures.enabled);
        assert_eq!(cfg.gestures.fingers, 3);
        assert_eq!(cfg.gestures.distance, 200.0);
        assert!(!cfg.gestures.positive);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        let od = OverviewConfig::default();
        assert_eq!(cfg.overview.columns, od.columns);
        assert_eq!(cfg.overview.gap_size, od.gap_size);
        assert_eq!(cfg.overview.bg_col, od.bg_col);
        assert_eq!(cfg.overview.transition, od.transition);
        let gd = GestureConfig::default();
        assert_eq!(cfg.gestures.fingers, gd.fingers);
        assert_eq!(cfg.gestures.distance, gd.distance);
    }

    #[test]
    fn deserialize_partial_overview() {
        let json = r#"{ "overview": { "columns": 5 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.overview.columns, 5);
        assert_eq!(cfg.overview.gap_size, OverviewConfig::default().gap_size);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "overview": {}, "future_section": { "key": 42 } }"#;
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn zero_and_negative_columns_rejected() {
        for columns in [0, -2] {
            let mut cfg = Config::default();
            cfg.overview.columns = columns;
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Invalid(_))),
                "columns = {} should be rejected",
                columns
            );
        }
    }

    #[test]
    fn bad_gesture_distance_rejected() {
        let mut cfg = Config::default();
        cfg.gestures.distance = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_bezier_rejected() {
        let mut cfg = Config::default();
        cfg.overview.transition.bezier = [1.5, 0.0, 0.5, 1.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_gap_rejected() {
        let mut cfg = Config::default();
        cfg.overview.gap_size = -1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_settings_match_default_config() {
        let from_config = Settings::try_from(&Config::default()).unwrap();
        let default = Settings::default();
        assert_eq!(from_config.columns, default.columns);
        assert_eq!(from_config.gap, default.gap);
        assert_eq!(from_config.transition, default.transition);
        assert_eq!(from_config.columns.get(), 3);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/hyprexpose.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
