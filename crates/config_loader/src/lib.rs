//! # Config Loader
//!
//! Launch configuration loading and parsing.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate ranges and cross-field rules
//! - Produce a `LaunchConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("launch.toml")).unwrap();
//! println!("fps: {}", config.video.fps());
//! ```

mod parser;
mod validator;

pub use contracts::LaunchConfig;
pub use parser::ConfigFormat;
pub use validator::{warnings, PRECOMPUTED_DETECTOR};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path.
    ///
    /// The format follows the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<LaunchConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<LaunchConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already built config (e.g. after CLI overrides)
    pub fn validate(config: &LaunchConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    pub fn to_toml(config: &LaunchConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &LaunchConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<LaunchConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[video]
source = "blank"
fps = 24.0
frame_width = 640
frame_height = 480
n_frames = 48

[detector]
name = "precomputed"
path = "detections.json"
class_names = ["person", "car"]

[tracker]
track_thresh = 0.5
max_time_lost = 30

[output]
mode = "all_frames"
save_path = "results.jsonl"
frame_vobj_num = true
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let cfg = result.unwrap();
        assert_eq!(cfg.video.kind(), "blank");
        assert_eq!(cfg.tracker.track_thresh, 0.5);
        assert_eq!(cfg.tracker.max_time_lost_for(cfg.video.fps()), 30);
    }

    #[test]
    fn test_round_trip_toml() {
        let cfg = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.detector.class_names, cfg2.detector.class_names);
        assert_eq!(cfg.output.mode, cfg2.output.mode);
    }

    #[test]
    fn test_round_trip_json() {
        let cfg = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(cfg.video.fps(), cfg2.video.fps());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("track_thresh = 0.5", "track_thresh = 0.05");
        let result = ConfigLoader::load_from_str(&content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("low_score_floor"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();
        assert!(ConfigLoader::load_from_path(file.path()).is_ok());

        let yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(yaml.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
