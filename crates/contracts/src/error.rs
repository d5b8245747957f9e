//! Layered error definitions
//!
//! Categorized by source: config / detector / video / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Detector Errors =====
    /// Detector name not present in the registry
    #[error("detector '{name}' is not registered")]
    DetectorNotRegistered { name: String },

    /// Detector name registered twice
    #[error("detector '{name}' is already registered")]
    DuplicateDetector { name: String },

    /// Query asks for a class the detector cannot produce
    #[error("detector '{detector}' does not support class '{class_name}'")]
    UnsupportedClass {
        detector: String,
        class_name: String,
    },

    /// Detector failed while producing detections
    #[error("detector '{detector}' inference error: {message}")]
    Inference { detector: String, message: String },

    // ===== Video Errors =====
    /// Frame could not be decoded
    #[error("video decode error at frame {frame_id}: {message}")]
    VideoDecode { frame_id: u64, message: String },

    /// Source was asked for a frame past its end
    #[error("video source exhausted after {n_frames} frames")]
    VideoExhausted { n_frames: u64 },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unsupported class error
    pub fn unsupported_class(detector: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::UnsupportedClass {
            detector: detector.into(),
            class_name: class_name.into(),
        }
    }

    /// Create inference error
    pub fn inference(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inference {
            detector: detector.into(),
            message: message.into(),
        }
    }

    /// Create video decode error
    pub fn video_decode(frame_id: u64, message: impl Into<String>) -> Self {
        Self::VideoDecode {
            frame_id,
            message: message.into(),
        }
    }
}
