//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式。

use contracts::{ContractError, LaunchConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<LaunchConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<LaunchConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<LaunchConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutputMode, VideoConfig};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[video]
source = "image_dir"
path = "frames"
fps = 25.0

[detector]
name = "precomputed"
path = "detections.json"
class_names = ["person", "car"]
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let cfg = result.unwrap();
        assert!(matches!(cfg.video, VideoConfig::ImageDir { fps, .. } if fps == 25.0));
        assert_eq!(cfg.detector.class_names.len(), 2);
        assert_eq!(cfg.output.mode, OutputMode::MatchesOnly);
        assert_eq!(cfg.tracker.track_thresh, 0.6);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "video": { "source": "blank", "fps": 10.0, "frame_width": 320, "frame_height": 240, "n_frames": 5 },
            "detector": { "name": "precomputed", "path": "dets.json", "class_names": ["car"] },
            "tracker": { "max_time_lost": 12 },
            "output": { "mode": "all_frames", "total_vobj_num": true }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let cfg = result.unwrap();
        assert_eq!(cfg.tracker.max_time_lost, Some(12));
        assert!(cfg.output.total_vobj_num);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let content = r#"
[video]
source = "rtsp"
fps = 25.0

[detector]
name = "precomputed"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
