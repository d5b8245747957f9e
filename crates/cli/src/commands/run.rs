//! `run` command implementation.

use std::time::Instant;

use config_loader::{ConfigLoader, LaunchConfig};
use contracts::OutputMode;
use executor::{DetectorRegistry, Executor, JsonLinesSink};
use observability::QuerySummary;
use planner::Planner;
use tracing::{debug, info, warn};

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::queries;

/// Execute the `run` command
pub fn run_query(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()));
    }

    let mut config = ConfigLoader::load_from_path(&args.config)
        .map_err(|e| CliError::config_invalid(e.to_string()))?;
    apply_overrides(&mut config, args)?;

    for warning in config_loader::warnings(&config) {
        warn!("{warning}");
    }

    let query = queries::find(&args.query)
        .ok_or_else(|| CliError::unknown_query(&args.query, queries::names()))?
        .build(&config.detector.class_names);
    let plan = Planner::new()
        .compile(&query)
        .map_err(|e| CliError::plan(&args.query, e.to_string()))?;

    info!(
        query = %args.query,
        class = %plan.class_name(),
        stages = plan.stages().len(),
        source = config.video.kind(),
        detector = %config.detector.name,
        "Query compiled"
    );
    debug!("\n{plan}");

    if args.dry_run {
        info!("Dry run mode - query compiled, exiting");
        println!("{plan}");
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let started = Instant::now();
    let summary = execute(plan, &config, args.max_frames)?;
    print_summary(&args.query, &summary, started.elapsed().as_secs_f64());
    Ok(())
}

/// Apply CLI overrides, then re-validate
fn apply_overrides(config: &mut LaunchConfig, args: &RunArgs) -> Result<()> {
    if let Some(ref output) = args.output {
        info!(path = %output.display(), "Overriding output path from CLI");
        config.output.save_path = Some(output.clone());
    }
    if args.all_frames {
        info!("Reporting all frames");
        config.output.mode = OutputMode::AllFrames;
    }
    ConfigLoader::validate(config).map_err(|e| CliError::config_invalid(e.to_string()))
}

fn execute(plan: planner::Plan, config: &LaunchConfig, max_frames: u64) -> Result<QuerySummary> {
    let mut executor = Executor::from_config(plan, config, &DetectorRegistry::with_builtins())
        .map_err(|e| CliError::execution(e.to_string()))?
        .with_max_frames(max_frames);

    let mut sink = config
        .output
        .save_path
        .as_ref()
        .map(JsonLinesSink::create)
        .transpose()
        .map_err(|e| CliError::execution(e.to_string()))?;

    for output in executor.by_ref() {
        // Records written before a failure stay on disk
        let output = output.map_err(|e| CliError::execution(e.to_string()))?;
        match sink.as_mut() {
            Some(sink) => sink
                .write(&output)
                .map_err(|e| CliError::execution(e.to_string()))?,
            None => debug!(frame_id = output.frame_id, objects = output.object_count(), "Output"),
        }
    }

    if let Some(mut sink) = sink {
        sink.flush()
            .map_err(|e| CliError::execution(e.to_string()))?;
        info!(path = %sink.path().display(), records = sink.written(), "Results saved");
    }

    info!(
        query = executor.query_name(),
        frames = executor.frames_processed(),
        mean_latency_ms = format!("{:.3}", executor.mean_latency_ms()),
        "Query finished"
    );
    Ok(executor.summary())
}

fn print_summary(query: &str, summary: &QuerySummary, elapsed_s: f64) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                       Query Statistics                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let throughput = if elapsed_s > 0.0 {
        summary.frames_processed as f64 / elapsed_s
    } else {
        0.0
    };

    println!("📊 Overview");
    println!("   ├─ Query: {query}");
    println!("   ├─ Duration: {elapsed_s:.2}s");
    println!("   └─ Throughput: {throughput:.1} frames/s");
    println!();
    print!("{summary}");
}
