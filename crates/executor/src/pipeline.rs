//! Executor - assembles and drives the operator chain for one plan
//!
//! The chain is always
//! `VideoReader -> ObjectDetector -> TrackerOperator -> <plan stages> -> OutputFormatter`.
//! Each query gets its own `Executor`; tracker and history state are never
//! shared between runs.

use std::time::Instant;

use contracts::{Detector, FrameOutput, LaunchConfig, VideoSource};
use observability::{QueryMetricsAggregator, QuerySummary};
use planner::{Plan, Stage};
use tracing::{debug, info, instrument};

use crate::detectors::DetectorRegistry;
use crate::operators::{
    ClassFilter, ObjectDetector, OutputFormatter, PredicateFilter, TrackerOperator, VObjProjector,
    VideoReader,
};
use crate::sources::open_source;
use crate::{BoxedOperator, ExecError};

/// Running pipeline; iterate it to pull output records
pub struct Executor {
    query_name: String,
    output: OutputFormatter,
    frames_processed: u64,
    total_latency_s: f64,
    max_frames: Option<u64>,
    stats: QueryMetricsAggregator,
    failed: bool,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("query_name", &self.query_name)
            .field("frames_processed", &self.frames_processed)
            .field("max_frames", &self.max_frames)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Build the operator chain for `plan` over an already opened source and detector.
    ///
    /// # Errors
    /// `UnsupportedClass` if the detector cannot produce the plan's class.
    #[instrument(level = "debug", name = "executor_build", skip_all, fields(query = %plan.query_name()))]
    pub fn build(
        plan: Plan,
        source: Box<dyn VideoSource>,
        detector: Box<dyn Detector>,
        detector_name: &str,
        config: &LaunchConfig,
    ) -> Result<Self, ExecError> {
        let query_name = plan.query_name().to_string();
        let class_name = plan.class_name().to_string();
        let fps = source.metadata().fps;

        let mut op: BoxedOperator = Box::new(VideoReader::new(source));
        op = Box::new(ObjectDetector::new(
            op,
            detector_name,
            detector,
            [class_name.as_str()],
        )?);
        op = Box::new(TrackerOperator::new(
            op,
            [class_name.as_str()],
            &config.tracker,
            fps,
        ));

        let mut output_spec = None;
        for stage in plan.into_stages() {
            debug!(stage = stage.kind(), "stage attached");
            op = match stage {
                Stage::ClassFilter {
                    class_name,
                    filter_index,
                } => Box::new(ClassFilter::new(op, class_name, filter_index)),
                Stage::Project(spec) => Box::new(VObjProjector::from_spec(op, spec)),
                Stage::PredicateFilter {
                    predicate,
                    class_name,
                    filter_index,
                } => Box::new(PredicateFilter::new(op, predicate, class_name, filter_index)),
                Stage::OutputFormat(spec) => {
                    output_spec = Some(spec);
                    continue;
                }
            };
        }
        let output_spec = output_spec.ok_or_else(|| {
            contracts::ContractError::Other("plan has no output stage".to_string())
        })?;

        info!(query = %query_name, class = %class_name, detector = detector_name, "pipeline ready");
        Ok(Self {
            query_name,
            output: OutputFormatter::new(op, output_spec, &config.output),
            frames_processed: 0,
            total_latency_s: 0.0,
            max_frames: None,
            stats: QueryMetricsAggregator::new(),
            failed: false,
        })
    }

    /// Open the configured source and detector, then build.
    ///
    /// The detector named by the query's VObj type wins over the launch config's.
    pub fn from_config(
        plan: Plan,
        config: &LaunchConfig,
        registry: &DetectorRegistry,
    ) -> Result<Self, ExecError> {
        let detector_name = plan
            .detector()
            .unwrap_or(config.detector.name.as_str())
            .to_string();
        let detector = registry.build(&detector_name, &config.detector)?;
        let source = open_source(&config.video)?;
        Self::build(plan, source, detector, &detector_name, config)
    }

    /// Stop after `limit` frames; 0 means no limit
    pub fn with_max_frames(mut self, limit: u64) -> Self {
        self.max_frames = (limit > 0).then_some(limit);
        self
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Mean wall time per frame, in milliseconds
    pub fn mean_latency_ms(&self) -> f64 {
        if self.frames_processed == 0 {
            0.0
        } else {
            self.total_latency_s * 1000.0 / self.frames_processed as f64
        }
    }

    /// Distinct track ids reported so far
    pub fn total_tracks(&self) -> usize {
        self.output.total_tracks()
    }

    /// Run statistics so far
    pub fn summary(&self) -> QuerySummary {
        self.stats.summary()
    }

    fn limit_reached(&self) -> bool {
        self.max_frames
            .is_some_and(|limit| self.frames_processed >= limit)
    }

    /// Pull frames until one produces output; `None` when the source is done
    #[instrument(level = "trace", name = "executor_next", skip(self))]
    pub fn next_output(&mut self) -> Option<Result<FrameOutput, ExecError>> {
        if self.failed {
            return None;
        }
        while !self.limit_reached() && self.output.has_next() {
            let started = Instant::now();
            let result = self.output.next();
            let latency_s = started.elapsed().as_secs_f64();

            match result {
                Ok(output) => {
                    self.frames_processed += 1;
                    self.total_latency_s += latency_s;
                    observability::record_frame_processed(self.frames_processed, latency_s);
                    self.stats.record_processed(latency_s * 1000.0);
                    if let Some(output) = output {
                        observability::record_frame_emitted(output.object_count());
                        self.stats.update(&output);
                        return Some(Ok(output));
                    }
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl Iterator for Executor {
    type Item = Result<FrameOutput, ExecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::PrecomputedDetector;
    use crate::properties;
    use crate::sources::BlankVideoSource;
    use contracts::{
        DetectorConfig, OutputConfig, OutputMode, QuerySpec, RawDetection, TrackerConfig,
        VObjType, VideoConfig,
    };
    use planner::Planner;
    use std::collections::HashMap;

    fn config(mode: OutputMode) -> LaunchConfig {
        LaunchConfig {
            video: VideoConfig::Blank {
                fps: 10.0,
                frame_width: 640,
                frame_height: 480,
                n_frames: 4,
            },
            detector: DetectorConfig {
                name: "precomputed".into(),
                path: None,
                class_names: vec!["person".into(), "car".into()],
            },
            tracker: TrackerConfig::default(),
            output: OutputConfig {
                mode,
                ..OutputConfig::default()
            },
        }
    }

    /// One person walking right at 2 px/frame, one parked car
    fn detector() -> Box<dyn Detector> {
        let frames = (1..=4u64)
            .map(|f| {
                let x = 100.0 + 2.0 * f as f32;
                (
                    f,
                    vec![
                        RawDetection {
                            tlbr: [x, 100.0, x + 40.0, 220.0],
                            score: 0.95,
                            class_id: 0,
                        },
                        RawDetection {
                            tlbr: [400.0, 300.0, 500.0, 360.0],
                            score: 0.9,
                            class_id: 1,
                        },
                    ],
                )
            })
            .collect::<HashMap<_, _>>();
        Box::new(PrecomputedDetector::new(
            vec!["person".into(), "car".into()],
            frames,
        ))
    }

    fn plan() -> Plan {
        let person = VObjType::builder("Person", "person")
            .property(properties::bbox_velocity())
            .build();
        let query = QuerySpec::new(
            "moving_person",
            person.prop("bbox_velocity").gt(0.1),
            vec![person.prop("track_id"), person.prop("bbox_velocity")],
        );
        Planner::new().compile(&query).unwrap()
    }

    #[test]
    fn test_velocity_query_end_to_end() {
        let source = Box::new(BlankVideoSource::with_size(10.0, 640, 480, 4));
        let cfg = config(OutputMode::MatchesOnly);
        let executor = Executor::build(plan(), source, detector(), "precomputed", &cfg).unwrap();

        let outputs: Vec<FrameOutput> = executor.map(Result::unwrap).collect();
        // Frame 1 has no velocity yet
        assert_eq!(
            outputs.iter().map(|o| o.frame_id).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        for out in &outputs {
            let person = &out.objects["Person"];
            assert_eq!(person.len(), 1);
            assert_eq!(person[0]["track_id"], serde_json::json!(1));
            // 2 px at 10 fps over a scale of 120 / 1.5
            let v = person[0]["bbox_velocity"].as_f64().unwrap();
            assert!((v - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_all_frames_mode_and_counters() {
        let source = Box::new(BlankVideoSource::with_size(10.0, 640, 480, 4));
        let cfg = config(OutputMode::AllFrames);
        let mut executor = Executor::build(plan(), source, detector(), "precomputed", &cfg).unwrap();

        let first = executor.next().unwrap().unwrap();
        assert_eq!(first.frame_id, 1);
        assert!(first.objects["Person"].is_empty());

        assert_eq!(executor.by_ref().count(), 3);
        assert_eq!(executor.frames_processed(), 4);
        assert_eq!(executor.total_tracks(), 1);
        assert!(executor.next().is_none());

        let summary = executor.summary();
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.frames_emitted, 4);
        assert_eq!(summary.frames_matched, 3);
        assert_eq!(summary.distinct_tracks, 1);
    }

    #[test]
    fn test_max_frames_stops_early() {
        let source = Box::new(BlankVideoSource::with_size(10.0, 640, 480, 4));
        let cfg = config(OutputMode::AllFrames);
        let executor = Executor::build(plan(), source, detector(), "precomputed", &cfg)
            .unwrap()
            .with_max_frames(2);

        let ids: Vec<u64> = executor.map(|o| o.unwrap().frame_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_unsupported_class_fails_build() {
        let zebra = VObjType::builder("Zebra", "zebra").build();
        let query = QuerySpec::new(
            "zebras",
            contracts::Predicate::is_instance(&zebra),
            vec![zebra.prop("tlbr")],
        );
        let plan = Planner::new().compile(&query).unwrap();
        let source = Box::new(BlankVideoSource::with_size(10.0, 640, 480, 1));
        let err = Executor::build(plan, source, detector(), "precomputed", &config(OutputMode::AllFrames))
            .err()
            .unwrap();
        assert!(err.to_string().contains("zebra"));
    }

    #[test]
    fn test_from_config_requires_registered_detector() {
        let mut cfg = config(OutputMode::AllFrames);
        cfg.detector.name = "yolox".into();
        let err = Executor::from_config(plan(), &cfg, &DetectorRegistry::with_builtins())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExecError::Contract(contracts::ContractError::DetectorNotRegistered { .. })
        ));
    }
}
