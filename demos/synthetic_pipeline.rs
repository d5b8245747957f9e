//! Synthetic Pipeline Example
//!
//! Runs a query over generated detections: one person jogging across the
//! frame and one standing still. No video or model files are needed.
//!
//! Run with: cargo run -p demos --bin synthetic_pipeline [launch.toml]

use std::collections::HashMap;

use config_loader::ConfigLoader;
use contracts::{
    DetectorConfig, LaunchConfig, OutputConfig, OutputMode, QuerySpec, RawDetection,
    TrackerConfig, VObjType, VideoConfig,
};
use executor::properties::{self, Continuing};
use executor::{BlankVideoSource, Executor, PrecomputedDetector};
use planner::Planner;

const FPS: f64 = 24.0;
const N_FRAMES: u64 = 96;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Synthetic Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading launch config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_test_config()
    };

    // ==== Stage 2: Declare the query ====
    let [still_state, still, still_periods] = Continuing::new(1.0).into_properties(
        "still",
        "bbox_velocity",
        |speed| speed.as_f64().is_some_and(|s| s < 0.1),
    );
    let person = VObjType::builder("Person", "person")
        .property(properties::bbox_velocity())
        .property(properties::direction(4))
        .property(still_state)
        .property(still)
        .property(still_periods)
        .build();
    let query = QuerySpec::new(
        "jogging_or_still",
        person.prop("bbox_velocity").gt(1.0) | person.prop("still").equals(true),
        vec![
            person.prop("track_id"),
            person.prop("bbox_velocity"),
            person.prop("direction"),
            person.prop("still_periods"),
        ],
    );

    // ==== Stage 3: Compile ====
    let plan = Planner::new().compile(&query)?;
    println!("{plan}");

    // ==== Stage 4: Build the pipeline over generated detections ====
    let source = Box::new(BlankVideoSource::with_size(FPS, 1280, 720, N_FRAMES));
    let detector = Box::new(PrecomputedDetector::new(
        config.detector.class_names.clone(),
        generate_detections(),
    ));
    let executor = Executor::build(plan, source, detector, "precomputed", &config)?;

    // ==== Stage 5: Pull results ====
    let mut emitted = 0u64;
    for output in executor {
        let output = output?;
        emitted += 1;
        if emitted % 12 == 0 {
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    tracing::info!(frames = N_FRAMES, emitted, "Demo finished");
    Ok(())
}

/// A jogger moving 6 px/frame and a bystander who never moves
fn generate_detections() -> HashMap<u64, Vec<RawDetection>> {
    (1..=N_FRAMES)
        .map(|f| {
            let x = 40.0 + 6.0 * f as f32;
            (
                f,
                vec![
                    RawDetection {
                        tlbr: [x, 300.0, x + 50.0, 450.0],
                        score: 0.92,
                        class_id: 0,
                    },
                    RawDetection {
                        tlbr: [900.0, 280.0, 960.0, 460.0],
                        score: 0.88,
                        class_id: 0,
                    },
                ],
            )
        })
        .collect()
}

fn create_test_config() -> LaunchConfig {
    LaunchConfig {
        video: VideoConfig::Blank {
            fps: FPS,
            frame_width: 1280,
            frame_height: 720,
            n_frames: N_FRAMES,
        },
        detector: DetectorConfig {
            name: "precomputed".to_string(),
            path: None,
            class_names: vec!["person".to_string()],
        },
        tracker: TrackerConfig::default(),
        output: OutputConfig {
            mode: OutputMode::MatchesOnly,
            frame_vobj_num: true,
            total_vobj_num: true,
            ..OutputConfig::default()
        },
    }
}
