//! 配置校验模块
//!
//! 校验规则：
//! - tracker 阈值在 (0, 1] 内 (`TrackerConfig` 上的 derive 范围)
//! - low_score_floor < track_thresh
//! - fps > 0
//! - image_dir 必须提供 path
//! - blank 帧尺寸必须为正
//! - precomputed 检测器必须提供 path 和类别表

use std::collections::HashSet;

use contracts::{ContractError, LaunchConfig, OutputMode, VideoConfig};
use validator::{Validate, ValidationErrors};

/// 回放检测文件的内置检测器名称
pub const PRECOMPUTED_DETECTOR: &str = "precomputed";

/// 校验 `LaunchConfig` 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &LaunchConfig) -> Result<(), ContractError> {
    validate_tracker(config)?;
    validate_video(config)?;
    validate_detector(config)?;
    Ok(())
}

/// 合法配置的非致命警告
pub fn warnings(config: &LaunchConfig) -> Vec<String> {
    let mut out = Vec::new();

    if let VideoConfig::Blank { n_frames: 0, .. } = config.video {
        out.push("video.n_frames is 0; the run will produce no output".to_string());
    }
    if matches!(config.video, VideoConfig::Blank { .. })
        && config.detector.name != PRECOMPUTED_DETECTOR
    {
        out.push(format!(
            "detector '{}' receives no pixels from a blank source",
            config.detector.name
        ));
    }
    if config.output.save_path.is_none() {
        out.push("output.save_path is unset; only a summary will be printed".to_string());
    }
    if config.output.mode == OutputMode::AllFrames && !config.output.frame_vobj_num {
        out.push("output.mode = all_frames without frame_vobj_num; empty frames carry no count".to_string());
    }
    if let Some(max_lost) = config.tracker.max_time_lost {
        let fps = config.video.fps();
        if fps > 0.0 && f64::from(max_lost) < fps / 2.0 {
            out.push(format!(
                "tracker.max_time_lost ({max_lost}) is under half a second at {fps} fps; tracks may fragment"
            ));
        }
    }
    let mut seen = HashSet::new();
    for name in &config.detector.class_names {
        if !seen.insert(name.as_str()) {
            out.push(format!("detector.class_names lists '{name}' twice; the first id wins"));
        }
    }
    out
}

fn first_field_error(errors: &ValidationErrors) -> (String, String) {
    errors
        .field_errors()
        .into_iter()
        .next()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("failed '{}' check", e.code),
                })
                .unwrap_or_default();
            (field.to_string(), message)
        })
        .unwrap_or_default()
}

/// 校验阈值范围及其大小关系
fn validate_tracker(config: &LaunchConfig) -> Result<(), ContractError> {
    let tracker = &config.tracker;
    if let Err(errors) = tracker.validate() {
        let (field, message) = first_field_error(&errors);
        return Err(ContractError::config_validation(
            format!("tracker.{field}"),
            format!("{message} (thresholds must lie in (0, 1])"),
        ));
    }

    if tracker.low_score_floor >= tracker.track_thresh {
        return Err(ContractError::config_validation(
            "tracker.low_score_floor / tracker.track_thresh",
            format!(
                "low_score_floor ({}) must be < track_thresh ({})",
                tracker.low_score_floor, tracker.track_thresh
            ),
        ));
    }
    if tracker.max_time_lost == Some(0) {
        return Err(ContractError::config_validation(
            "tracker.max_time_lost",
            "max_time_lost must be > 0",
        ));
    }
    Ok(())
}

fn validate_video(config: &LaunchConfig) -> Result<(), ContractError> {
    let fps = config.video.fps();
    if !(fps.is_finite() && fps > 0.0) {
        return Err(ContractError::config_validation(
            "video.fps",
            format!("fps must be > 0, got {fps}"),
        ));
    }

    match &config.video {
        VideoConfig::ImageDir { path, .. } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "video.path",
                    "image_dir source requires a path",
                ));
            }
        }
        VideoConfig::Blank {
            frame_width,
            frame_height,
            ..
        } => {
            if *frame_width == 0 || *frame_height == 0 {
                return Err(ContractError::config_validation(
                    "video.frame_width / video.frame_height",
                    format!("frame size must be > 0, got {frame_width}x{frame_height}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_detector(config: &LaunchConfig) -> Result<(), ContractError> {
    let detector = &config.detector;
    if detector.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "detector.name",
            "detector name cannot be empty",
        ));
    }

    if detector.name == PRECOMPUTED_DETECTOR {
        if detector.path.is_none() {
            return Err(ContractError::config_validation(
                "detector.path",
                "precomputed detector requires a detection file",
            ));
        }
        if detector.class_names.is_empty() {
            return Err(ContractError::config_validation(
                "detector.class_names",
                "precomputed detector requires a non-empty class table",
            ));
        }
    }
    for (idx, name) in detector.class_names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("detector.class_names[{idx}]"),
                "class name cannot be empty",
            ));
        }
    }
    Ok(())
}
