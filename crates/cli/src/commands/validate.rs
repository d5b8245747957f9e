//! `validate` command implementation.

use std::path::Path;

use config_loader::{ConfigLoader, LaunchConfig};
use contracts::OutputMode;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    source: String,
    fps: f64,
    detector: String,
    class_count: usize,
    output_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    save_path: Option<String>,
}

impl From<&LaunchConfig> for ConfigSummary {
    fn from(config: &LaunchConfig) -> Self {
        Self {
            source: config.video.kind().to_string(),
            fps: config.video.fps(),
            detector: config.detector.name.clone(),
            class_count: config.detector.class_names.len(),
            output_mode: match config.output.mode {
                OutputMode::MatchesOnly => "matches_only",
                OutputMode::AllFrames => "all_frames",
            }
            .to_string(),
            save_path: config
                .output
                .save_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            CliError::Other(anyhow::anyhow!("Failed to serialize validation result: {e}"))
        })?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        Err(CliError::config_invalid(
            result.error.unwrap_or_else(|| "validation failed".to_string()),
        ))
    }
}

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    if !path.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", path.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(path) {
        Ok(config) => {
            let warnings = config_loader::warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary::from(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Source: {} @ {} fps", summary.source, summary.fps);
            println!(
                "  Detector: {} ({} classes)",
                summary.detector, summary.class_count
            );
            println!("  Output mode: {}", summary.output_mode);
            if let Some(ref path) = summary.save_path {
                println!("  Save path: {path}");
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
