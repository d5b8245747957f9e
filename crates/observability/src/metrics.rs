//! 查询管道指标收集模块
//!
//! 记录函数封装 `metrics` facade；聚合器在内存中统计单次运行，供 CLI 报告使用。

use std::collections::HashSet;
use std::fmt;

use contracts::FrameOutput;
use metrics::{counter, gauge, histogram};

/// 记录管道处理完成的一帧
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_processed;
///
/// let started = Instant::now();
/// let frame = root.next()?;
/// record_frame_processed(frame.id, started.elapsed().as_secs_f64());
/// ```
pub fn record_frame_processed(frame_id: u64, latency_s: f64) {
    counter!("vidquery_frames_processed_total").increment(1);
    gauge!("vidquery_last_frame_id").set(frame_id as f64);
    histogram!("vidquery_frame_latency_seconds").record(latency_s);
}

/// 记录单帧中某类别保留的检测数
pub fn record_objects_detected(class_name: &str, count: usize) {
    counter!(
        "vidquery_objects_detected_total",
        "class" => class_name.to_string()
    )
    .increment(count as u64);
}

/// 记录 tracker 更新后的轨迹池大小
pub fn record_track_pools(class_name: &str, active: usize, lost: usize) {
    gauge!("vidquery_tracks_active", "class" => class_name.to_string()).set(active as f64);
    gauge!("vidquery_tracks_lost", "class" => class_name.to_string()).set(lost as f64);
}

/// 记录属性计算结果为 InvalidProperty
pub fn record_property_invalid(property: &str) {
    counter!(
        "vidquery_property_invalid_total",
        "property" => property.to_string()
    )
    .increment(1);
}

/// 记录一条输出结果
pub fn record_frame_emitted(objects: usize) {
    counter!("vidquery_frames_emitted_total").increment(1);
    histogram!("vidquery_objects_per_frame").record(objects as f64);
}

/// 内存中的运行统计
#[derive(Debug, Clone, Default)]
pub struct QueryMetricsAggregator {
    /// 经过管道的帧数
    pub frames_processed: u64,

    /// 产生的输出记录数
    pub frames_emitted: u64,

    /// 至少包含一个对象的输出记录数
    pub frames_matched: u64,

    /// 所有输出记录中的对象总数
    pub objects_emitted: u64,

    /// 输出中出现过的 (vobj 名称, track id)
    pub distinct_tracks: HashSet<(String, u64)>,

    /// 每条输出记录的对象数
    pub objects_per_frame: RunningStats,

    /// 单帧管道延迟 (毫秒)
    pub latency_ms: RunningStats,
}

impl QueryMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计数一帧已处理
    pub fn record_processed(&mut self, latency_ms: f64) {
        self.frames_processed += 1;
        self.latency_ms.push(latency_ms);
    }

    /// 将一条输出记录并入统计
    pub fn update(&mut self, output: &FrameOutput) {
        let objects = output.object_count();
        self.frames_emitted += 1;
        if objects > 0 {
            self.frames_matched += 1;
        }
        self.objects_emitted += objects as u64;
        self.objects_per_frame.push(objects as f64);
        for (name, id) in output.track_ids() {
            self.distinct_tracks.insert((name.to_string(), id));
        }
    }

    pub fn summary(&self) -> QuerySummary {
        QuerySummary {
            frames_processed: self.frames_processed,
            frames_emitted: self.frames_emitted,
            frames_matched: self.frames_matched,
            objects_emitted: self.objects_emitted,
            distinct_tracks: self.distinct_tracks.len(),
            match_rate: if self.frames_processed > 0 {
                self.frames_matched as f64 / self.frames_processed as f64 * 100.0
            } else {
                0.0
            },
            objects_per_frame: StatsSummary::from(&self.objects_per_frame),
            latency_ms: StatsSummary::from(&self.latency_ms),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct QuerySummary {
    pub frames_processed: u64,
    pub frames_emitted: u64,
    pub frames_matched: u64,
    pub objects_emitted: u64,
    pub distinct_tracks: usize,
    /// 命中帧占已处理帧的百分比
    pub match_rate: f64,
    pub objects_per_frame: StatsSummary,
    pub latency_ms: StatsSummary,
}

impl fmt::Display for QuerySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Query Summary ===")?;
        writeln!(f, "Frames processed: {}", self.frames_processed)?;
        writeln!(f, "Frames emitted: {}", self.frames_emitted)?;
        writeln!(
            f,
            "Frames matched: {} ({:.2}%)",
            self.frames_matched, self.match_rate
        )?;
        writeln!(f, "Objects emitted: {}", self.objects_emitted)?;
        writeln!(f, "Distinct tracks: {}", self.distinct_tracks)?;
        writeln!(f, "Objects per frame: {}", self.objects_per_frame)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线均值/方差 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ObjectOutput;
    use serde_json::json;

    fn output(frame_id: u64, ids: &[u64]) -> FrameOutput {
        let mut out = FrameOutput::new(frame_id);
        let objects = ids
            .iter()
            .map(|id| {
                let mut o = ObjectOutput::new();
                o.insert("track_id".into(), json!(id));
                o
            })
            .collect();
        out.objects.insert("Person".into(), objects);
        out
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut agg = QueryMetricsAggregator::new();
        for _ in 0..4 {
            agg.record_processed(2.0);
        }
        agg.update(&output(1, &[1, 2]));
        agg.update(&output(2, &[2]));
        agg.update(&output(3, &[]));

        let summary = agg.summary();
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.frames_emitted, 3);
        assert_eq!(summary.frames_matched, 2);
        assert_eq!(summary.objects_emitted, 3);
        assert_eq!(summary.distinct_tracks, 2);
        assert!((summary.match_rate - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut agg = QueryMetricsAggregator::new();
        agg.record_processed(1.5);
        agg.update(&output(1, &[9]));
        let text = agg.summary().to_string();
        assert!(text.contains("Frames processed: 1"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("Distinct tracks: 1"));

        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }
}
