//! Capture configuration.
//!
//! Settings start from the command-line flags. When `--config` names a YAML
//! file, every recognized key in it overrides the corresponding flag;
//! unknown keys are reported and ignored.

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::camera::Resolution;
use crate::cli::Args;
use crate::detect::ChessboardGeometry;
use crate::selection::DEFAULT_DISTANCE_THRESHOLD;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Config file '{}' must contain a mapping of settings", path.display())]
    NotAMapping { path: PathBuf },
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Everything the capture run needs, after CLI and file have been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub camera_name: String,
    pub resolution: Resolution,
    /// Root under which the timestamped session directory is created
    pub save_dir: PathBuf,
    pub chessboard: ChessboardGeometry,
    /// `None` selects auto-detection
    pub video_id: Option<u32>,
    pub distance_threshold: f64,
    pub headless: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_name: "Elp".to_string(),
            resolution: Resolution::default(),
            save_dir: PathBuf::from("test_images"),
            chessboard: ChessboardGeometry::default(),
            video_id: None,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            headless: false,
        }
    }
}

fn parse_value<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, ConfigError> {
    serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl CaptureConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            camera_name: args.camera_name.clone(),
            resolution: Resolution {
                width: args.width,
                height: args.height,
            },
            save_dir: args.save_dir.clone(),
            chessboard: ChessboardGeometry::new(args.chessboard_size_column, args.chessboard_size_row),
            video_id: args.video_id,
            distance_threshold: args.distance_threshold,
            headless: args.headless,
        }
    }

    /// Build the configuration from flags plus the optional `--config` file.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Self::from_args(args);
        if let Some(path) = &args.config {
            log::info!("Loading configuration from: {}", path.display());
            config.apply_file(path)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Override settings with the values in a YAML file.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        for key in self.apply_yaml(&content, path)? {
            log::warn!("Unknown config key '{}' in {}", key, path.display());
        }
        Ok(())
    }

    /// Override settings from YAML text. Returns the unrecognized keys.
    pub fn apply_yaml(&mut self, content: &str, origin: &Path) -> Result<Vec<String>, ConfigError> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;

        let mapping = match document {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(ConfigError::NotAMapping {
                    path: origin.to_path_buf(),
                })
            }
        };

        let mut unknown = Vec::new();
        for (key, value) in &mapping {
            let key = match key {
                Value::String(s) => s.as_str(),
                other => {
                    unknown.push(format!("{:?}", other));
                    continue;
                }
            };
            match key {
                "config" => log::debug!("Ignoring nested 'config' key"),
                "camera_name" => self.camera_name = parse_value(key, value)?,
                "width" => self.resolution.width = parse_value(key, value)?,
                "height" => self.resolution.height = parse_value(key, value)?,
                "save_dir" => self.save_dir = parse_value(key, value)?,
                "chessboard_size_column" => self.chessboard.columns = parse_value(key, value)?,
                "chessboard_size_row" => self.chessboard.rows = parse_value(key, value)?,
                "video_id" => self.video_id = parse_value(key, value)?,
                "distance_threshold" => self.distance_threshold = parse_value(key, value)?,
                "headless" => self.headless = parse_value(key, value)?,
                other => unknown.push(other.to_string()),
            }
        }
        Ok(unknown)
    }

    /// Reject settings the capture loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("width", self.resolution.width),
            ("height", self.resolution.height),
            ("chessboard_size_column", self.chessboard.columns),
            ("chessboard_size_row", self.chessboard.rows),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "distance_threshold".to_string(),
                message: format!("must be a positive number, got {}", self.distance_threshold),
            });
        }
        if self.camera_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "camera_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Log the effective settings.
    pub fn log_summary(&self) {
        log::info!("Capture configuration:");
        log::info!("  Chessboard size     : {}", self.chessboard);
        log::info!("  Camera name         : {}", self.camera_name);
        log::info!("  Resolution          : {}", self.resolution);
        log::info!("  Save directory root : {}", self.save_dir.display());
        match self.video_id {
            Some(id) => log::info!("  Video device ID     : {}", id),
            None => log::info!("  Video device ID     : Auto-detect"),
        }
        log::info!("  Distance threshold  : {} pixels", self.distance_threshold);
        log::info!("  Preview             : {}", if self.headless { "off" } else { "on" });
    }
}
