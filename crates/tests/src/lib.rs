//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshot tests (defaults, wire layout, plan errors)
//! - End-to-end query runs over blank sources and precomputed detections

#[cfg(test)]
mod contract_tests {
    use contracts::{
        merge, FrameOutput, Predicate, PropertyDescriptor, QuerySpec, TrackerConfig, VObjType,
        Value,
    };
    use executor::DetectorRegistry;
    use planner::{PlanError, Planner};

    #[test]
    fn test_tracker_defaults() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.track_thresh, 0.6);
        assert_eq!(cfg.match_thresh, 0.9);
        assert_eq!(cfg.det_thresh, 0.7);
        assert_eq!(cfg.low_score_floor, 0.1);
        assert_eq!(cfg.low_match_thresh, 0.5);
        assert_eq!(cfg.unconfirmed_match_thresh, 0.7);
        assert_eq!(cfg.dedup_iou_distance, 0.15);
        assert_eq!(cfg.max_time_lost_for(24.0), 24);
        assert_eq!(cfg.max_time_lost_for(29.97), 30);
    }

    #[test]
    fn test_invalid_is_not_null() {
        assert_ne!(Value::Invalid, Value::Null);
        assert!(Value::Invalid.is_invalid());
        assert!(!Value::Null.is_invalid());
    }

    #[test]
    fn test_output_wire_layout() {
        let mut out = FrameOutput::new(3);
        out.objects.insert("Car".into(), Vec::new());
        out.vobj_num = Some(0);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json, serde_json::json!({"frame_id": 3, "Car": [], "vobj_num": 0}));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let a = PropertyDescriptor::builder("a").input("b").compute(|_| Value::Null);
        let b = PropertyDescriptor::builder("b").input("a").compute(|_| Value::Null);
        let person = VObjType::builder("Person", "person")
            .property(a)
            .property(b)
            .build();
        let query = QuerySpec::new("cyclic", person.prop("a").gt(0.0), vec![]);
        assert!(matches!(
            Planner::new().compile(&query),
            Err(PlanError::Cycle { .. })
        ));
    }

    #[test]
    fn test_one_vobj_type_per_query() {
        let person = VObjType::builder("Person", "person").build();
        let car = VObjType::builder("Car", "car").build();
        let query = QuerySpec::new(
            "mixed",
            Predicate::is_instance(&person) & car.prop("score").gt(0.5),
            vec![person.prop("tlbr")],
        );
        let err = Planner::new().compile(&query).unwrap_err();
        assert!(matches!(err, PlanError::MultipleVObjTypes { .. }));
        assert!(err.to_string().contains("only one VObj type"));
    }

    #[test]
    fn test_merged_query_compiles() {
        let person = VObjType::builder("Person", "person").build();
        let parent = QuerySpec::new(
            "confident",
            person.prop("score").gt(0.6),
            vec![person.prop("tlbr")],
        );
        let child = QuerySpec::new("tracked", person.prop("track_id").gt(0i64), vec![]);
        let plan = Planner::new().compile(&merge(&parent, &child)).unwrap();
        assert_eq!(plan.query_name(), "tracked");
        assert_eq!(plan.class_name(), "person");
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = DetectorRegistry::with_builtins();
        let err = registry
            .register("precomputed", |_| {
                Err(contracts::ContractError::Other("unused".into()))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            contracts::ContractError::DuplicateDetector { .. }
        ));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use config_loader::ConfigLoader;
    use contracts::{
        DetectorConfig, FrameOutput, LaunchConfig, OutputConfig, OutputMode, Predicate,
        PropertyDescriptor, QuerySpec, RawDetection, TrackerConfig, VObjType, Value,
        VideoConfig,
    };
    use executor::properties;
    use executor::{
        BlankVideoSource, DetectorRegistry, Executor, JsonLinesSink, PrecomputedDetector,
    };
    use planner::Planner;

    const FPS: f64 = 24.0;

    fn launch_config(mode: OutputMode, n_frames: u64) -> LaunchConfig {
        LaunchConfig {
            video: VideoConfig::Blank {
                fps: FPS,
                frame_width: 640,
                frame_height: 480,
                n_frames,
            },
            detector: DetectorConfig {
                name: "precomputed".into(),
                path: None,
                class_names: vec!["person".into()],
            },
            tracker: TrackerConfig::default(),
            output: OutputConfig {
                mode,
                ..OutputConfig::default()
            },
        }
    }

    fn person_at(x: f32) -> RawDetection {
        RawDetection {
            tlbr: [x, 100.0, x + 40.0, 220.0],
            score: 0.9,
            class_id: 0,
        }
    }

    fn run(
        query: &QuerySpec,
        mode: OutputMode,
        n_frames: u64,
        frames: HashMap<u64, Vec<RawDetection>>,
    ) -> Vec<FrameOutput> {
        let plan = Planner::new().compile(query).unwrap();
        let detector = Box::new(PrecomputedDetector::new(vec!["person".into()], frames));
        let source = Box::new(BlankVideoSource::with_size(FPS, 640, 480, n_frames));
        Executor::build(
            plan,
            source,
            detector,
            "precomputed",
            &launch_config(mode, n_frames),
        )
        .unwrap()
        .map(Result::unwrap)
        .collect()
    }

    /// Track first seen at frame 5: velocity is invalid there, finite at frame 6.
    #[test]
    fn test_velocity_history_completeness() {
        let person = VObjType::builder("Person", "person")
            .property(properties::bbox_velocity())
            .build();
        let query = QuerySpec::new(
            "velocity",
            Predicate::is_instance(&person),
            vec![person.prop("track_id"), person.prop("bbox_velocity")],
        );
        let frames = (5..=6u64)
            .map(|f| (f, vec![person_at(100.0 + 3.0 * f as f32)]))
            .collect();

        let outputs = run(&query, OutputMode::AllFrames, 6, frames);
        assert_eq!(outputs.len(), 6);

        let at = |frame: u64| &outputs[frame as usize - 1].objects["Person"];
        assert!(at(4).is_empty());

        let first = &at(5)[0];
        assert_eq!(first["track_id"], serde_json::json!(1));
        assert!(!first.contains_key("bbox_velocity"));

        let next = &at(6)[0];
        assert_eq!(next["track_id"], serde_json::json!(1));
        let v = next["bbox_velocity"].as_f64().unwrap();
        // 3 px at 24 fps over a scale of 120 / 1.5
        assert!((v - 0.9).abs() < 1e-6, "got {v}");
    }

    /// `score > 0.6 & velocity > 1.0` with an invalid velocity excludes the object
    #[test]
    fn test_invalid_dependency_fails_predicate() {
        let person = VObjType::builder("Person", "person")
            .property(properties::bbox_velocity())
            .build();
        let query = QuerySpec::new(
            "fast_confident",
            person.prop("score").gt(0.6) & person.prop("bbox_velocity").gt(1.0),
            vec![person.prop("track_id")],
        );
        let frames = HashMap::from([(1, vec![person_at(100.0)])]);

        let outputs = run(&query, OutputMode::MatchesOnly, 1, frames);
        assert!(outputs.is_empty());
    }

    /// fps=24: matched 1-10, unmatched 11-34, seen again at 35 -> new id
    #[test]
    fn test_expired_track_is_not_reactivated() {
        let person = VObjType::builder("Person", "person").build();
        let query = QuerySpec::new(
            "lifecycle",
            Predicate::is_instance(&person),
            vec![person.prop("track_id")],
        );
        let frames = (1..=10u64)
            .chain(35..=36)
            .map(|f| (f, vec![person_at(100.0)]))
            .collect();

        let outputs = run(&query, OutputMode::MatchesOnly, 36, frames);
        let ids: Vec<(u64, Option<u64>)> = outputs
            .iter()
            .map(|o| {
                (
                    o.frame_id,
                    o.objects["Person"][0]
                        .get("track_id")
                        .and_then(serde_json::Value::as_u64),
                )
            })
            .collect();

        assert_eq!(ids.len(), 12);
        assert!(ids[..10].iter().all(|&(_, id)| id == Some(1)));
        // Track 1 expired at frame 34; the detection at 35 starts track 2
        assert_eq!(ids[10], (35, Some(2)));
        assert_eq!(ids[11], (36, Some(2)));
    }

    #[test]
    fn test_property_evaluated_once_per_track_and_frame() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let width = PropertyDescriptor::builder("width")
            .input("tlbr")
            .compute(move |inputs| {
                counter.fetch_add(1, Ordering::SeqCst);
                match inputs.bbox("tlbr") {
                    Some(b) => Value::Float(b[2] - b[0]),
                    None => Value::Invalid,
                }
            });
        let person = VObjType::builder("Person", "person")
            .property(width)
            .build();
        // Referenced by both the predicate and the output
        let query = QuerySpec::new(
            "wide",
            person.prop("width").gt(10.0),
            vec![person.prop("width")],
        );
        let frames = (1..=3u64)
            .map(|f| (f, vec![person_at(100.0), person_at(400.0)]))
            .collect();

        let outputs = run(&query, OutputMode::MatchesOnly, 3, frames);
        assert_eq!(outputs.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_independent_runs_do_not_share_state() {
        let person = VObjType::builder("Person", "person")
            .property(properties::direction(2))
            .build();
        let query = QuerySpec::new(
            "heading",
            Predicate::is_instance(&person),
            vec![person.prop("track_id"), person.prop("direction")],
        );
        let frames: HashMap<u64, Vec<RawDetection>> = (1..=5u64)
            .map(|f| (f, vec![person_at(100.0 + 4.0 * f as f32)]))
            .collect();

        let first = run(&query, OutputMode::AllFrames, 5, frames.clone());
        let second = run(&query, OutputMode::AllFrames, 5, frames);
        assert_eq!(first, second);
        assert_eq!(
            first[4].objects["Person"][0]["direction"],
            serde_json::json!([1.0, 0.0])
        );
    }

    /// Continuing periods live in each run's history, not in the descriptors
    #[test]
    fn test_continuing_periods_are_per_run() {
        let [idle_state, idle, idle_periods] = properties::Continuing::new(0.5).into_properties(
            "idle",
            "bbox_velocity",
            |speed| speed.as_f64().is_some_and(|s| s < 0.1),
        );
        let person = VObjType::builder("Person", "person")
            .property(properties::bbox_velocity())
            .property(idle_state)
            .property(idle)
            .property(idle_periods)
            .build();
        let query = QuerySpec::new(
            "idle",
            person.prop("idle").equals(true),
            vec![person.prop("track_id"), person.prop("idle_periods")],
        );
        let frames: HashMap<u64, Vec<RawDetection>> =
            (1..=30u64).map(|f| (f, vec![person_at(100.0)])).collect();

        let first = run(&query, OutputMode::MatchesOnly, 30, frames.clone());
        let second = run(&query, OutputMode::MatchesOnly, 30, frames);

        // Still from frame 2 (first velocity); 12 frames make half a second
        assert_eq!(first.first().map(|o| o.frame_id), Some(14));
        assert_eq!(first.len(), 17);
        assert_eq!(
            first[16].objects["Person"][0]["idle_periods"],
            serde_json::json!([[0, 1]])
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_driven_run_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let det_path = dir.path().join("detections.json");
        std::fs::write(
            &det_path,
            serde_json::json!({
                "1": [{"tlbr": [10.0, 10.0, 50.0, 130.0], "score": 0.95, "class_id": 1}],
                "2": [{"tlbr": [12.0, 10.0, 52.0, 130.0], "score": 0.95, "class_id": 1}],
                "3": [{"tlbr": [14.0, 10.0, 54.0, 130.0], "score": 0.2, "class_id": 1}]
            })
            .to_string(),
        )
        .unwrap();
        let out_path = dir.path().join("results.jsonl");
        let config_path = dir.path().join("launch.json");
        std::fs::write(
            &config_path,
            serde_json::json!({
                "video": {"source": "blank", "fps": 10.0, "frame_width": 320, "frame_height": 240, "n_frames": 4},
                "detector": {"name": "precomputed", "path": det_path, "class_names": ["car", "person"]},
                "output": {"mode": "all_frames", "save_path": out_path, "frame_vobj_num": true, "total_vobj_num": true}
            })
            .to_string(),
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&config_path).unwrap();
        let person = VObjType::builder("Person", "person").build();
        let query = QuerySpec::new(
            "people",
            Predicate::is_instance(&person),
            vec![person.prop("track_id"), person.prop("score")],
        );
        let plan = Planner::new().compile(&query).unwrap();
        let executor =
            Executor::from_config(plan, &config, &DetectorRegistry::with_builtins()).unwrap();

        let mut sink = JsonLinesSink::create(config.output.save_path.as_ref().unwrap()).unwrap();
        for output in executor {
            sink.write(&output.unwrap()).unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.written(), 4);

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&out_path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["Person"][0]["track_id"], 1);
        assert_eq!(lines[0]["vobj_num"], 1);
        // Low-score detection keeps the track through the second pass
        assert_eq!(lines[2]["Person"][0]["track_id"], 1);
        assert_eq!(lines[3]["Person"], serde_json::json!([]));
        assert_eq!(lines[3]["vobj_num"], 0);
        assert_eq!(lines[3]["total_vobj_num"], 1);
    }
}
