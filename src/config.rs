//! Tunable parameters, loadable from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a working
//! configuration:
//!
//! ```toml
//! [smoothing]
//! position = 0.7
//! angle = 0.8
//! scale = 0.6
//!
//! [fallback]
//! left_eye = [-0.2, -0.1]
//! right_eye = [0.2, -0.1]
//! ```

use std::{fmt, fs, io, path::Path};

use serde::Deserialize;

/// Environment variable holding the path of the configuration file.
pub const CONFIG_ENV_VAR: &str = "PHOTOBOOTH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub smoothing: SmoothingFactors,
    #[serde(default)]
    pub fallback: FallbackOffsets,
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config = content.parse()?;
        log::debug!("loaded configuration from '{}'", path.display());
        Ok(config)
    }

    /// Loads the file named by the `PHOTOBOOTH_CONFIG` environment variable.
    ///
    /// Returns the default configuration if the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks that all values are in their permitted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.smoothing.validate()?;
        self.fallback.validate()
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Blend factors of the exponential moving averages applied by the
/// [`OverlayEngine`][crate::overlay::OverlayEngine].
///
/// Each factor is the weight of the newest raw value, so `1.0` disables smoothing and values
/// close to `0.0` smooth heavily.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingFactors {
    #[serde(default = "default_position")]
    pub position: f32,
    #[serde(default = "default_angle")]
    pub angle: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_position() -> f32 { 0.7 }
fn default_angle() -> f32 { 0.8 }
fn default_scale() -> f32 { 0.6 }

impl Default for SmoothingFactors {
    fn default() -> Self {
        Self {
            position: default_position(),
            angle: default_angle(),
            scale: default_scale(),
        }
    }
}

impl SmoothingFactors {
    /// Factors that pass raw values through unchanged.
    pub const NONE: Self = Self {
        position: 1.0,
        angle: 1.0,
        scale: 1.0,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("smoothing.position", self.position),
            ("smoothing.angle", self.angle),
            ("smoothing.scale", self.scale),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Where the named keypoints go when a face has to be synthesized from a bounding box.
///
/// Each entry is an `[x, y]` offset from the box center, as a fraction of the box width and
/// height. `[0.0, -0.5]` is the middle of the top edge. These are rough heuristics, not
/// anatomical constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackOffsets {
    pub left_eye: [f32; 2],
    pub right_eye: [f32; 2],
    pub nose_tip: [f32; 2],
    pub forehead: [f32; 2],
    pub chin: [f32; 2],
    pub left_ear: [f32; 2],
    pub right_ear: [f32; 2],
}

impl Default for FallbackOffsets {
    fn default() -> Self {
        Self {
            left_eye: [-0.2, -0.1],
            right_eye: [0.2, -0.1],
            nose_tip: [0.0, 0.05],
            forehead: [0.0, -0.5],
            chin: [0.0, 0.5],
            left_ear: [-0.5, 0.0],
            right_ear: [0.5, 0.0],
        }
    }
}

impl FallbackOffsets {
    /// Offsets must keep the synthesized points inside the bounding box.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = [
            ("left_eye", self.left_eye),
            ("right_eye", self.right_eye),
            ("nose_tip", self.nose_tip),
            ("forehead", self.forehead),
            ("chin", self.chin),
            ("left_ear", self.left_ear),
            ("right_ear", self.right_ear),
        ];
        for (name, [x, y]) in entries {
            if !(-0.5..=0.5).contains(&x) || !(-0.5..=0.5).contains(&y) {
                return Err(ConfigError::Invalid(format!(
                    "`fallback.{name}` must lie within [-0.5, 0.5] on both axes, got [{x}, {y}]"
                )));
            }
        }
        Ok(())
    }
}

/// Errors that can occur while loading a [`Config`].
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read configuration: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse configuration: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.smoothing.position, 0.7);
        assert_eq!(config.smoothing.angle, 0.8);
        assert_eq!(config.smoothing.scale, 0.6);
    }

    #[test]
    fn partial_sections() {
        let config: Config = r#"
            [smoothing]
            angle = 0.5

            [fallback]
            chin = [0.0, 0.45]
        "#
        .parse()
        .unwrap();
        assert_eq!(config.smoothing.angle, 0.5);
        assert_eq!(config.smoothing.position, 0.7);
        assert_eq!(config.fallback.chin, [0.0, 0.45]);
        assert_eq!(config.fallback.left_eye, [-0.2, -0.1]);
    }

    #[test]
    fn rejects_out_of_range() {
        let err = "[smoothing]\nposition = 1.5".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");

        let err = "[fallback]\nleft_eye = [-0.7, 0.0]".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = "[smoothing]\nposition_factor = 0.5".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn missing_file() {
        let err = Config::load("/nonexistent/photobooth.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
