//! Per-track history of one projector's windowed dependencies.
//!
//! Uses index-based separation:
//! - one HeapRb per track stores lightweight metadata (frame id + slab key)
//! - a shared Slab stores the dependency rows themselves
//!
//! Evicting or rotating a track's ring never moves row payloads (crops,
//! lists) around.

use std::collections::HashMap;
use std::fmt;

use contracts::{FrameId, TrackId, Value};
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in a track's ring
#[derive(Debug, Clone, Copy)]
struct RowMeta {
    frame_id: FrameId,
    slab_key: usize,
}

/// History table keyed by `(track_id, frame_id)`
///
/// Each row holds one value per column (the projector's windowed
/// dependencies, in declaration order). At most `capacity` trailing rows are
/// kept per track.
pub struct HistoryBuffer {
    columns: Vec<String>,
    capacity: usize,
    index: HashMap<TrackId, HeapRb<RowMeta>>,
    rows: Slab<Vec<Value>>,
    evicted_count: u64,
}

impl fmt::Debug for HistoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("columns", &self.columns)
            .field("capacity", &self.capacity)
            .field("tracks", &self.index.len())
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl HistoryBuffer {
    /// `capacity` rows per track; 0 disables storage entirely
    pub fn new(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns,
            capacity,
            index: HashMap::new(),
            rows: Slab::new(),
            evicted_count: 0,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored rows over all tracks
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.index.len()
    }

    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// Append the row of `track_id` at `frame_id`.
    ///
    /// Frame ids must increase per track; a row at or before the last stored
    /// frame is ignored and `false` is returned. When the track's ring is
    /// full the oldest row is dropped.
    pub fn push(&mut self, track_id: TrackId, frame_id: FrameId, values: Vec<Value>) -> bool {
        if self.capacity == 0 {
            return false;
        }
        debug_assert_eq!(values.len(), self.columns.len());

        let capacity = self.capacity;
        let ring = self
            .index
            .entry(track_id)
            .or_insert_with(|| HeapRb::new(capacity));

        if let Some(last) = ring.iter().last() {
            if last.frame_id >= frame_id {
                return false;
            }
        }

        if ring.is_full() {
            if let Some(old) = ring.try_pop() {
                self.rows.remove(old.slab_key);
                self.evicted_count += 1;
            }
        }

        let slab_key = self.rows.insert(values);
        let _ = ring.try_push(RowMeta { frame_id, slab_key });
        true
    }

    /// Values of `column` at frames `frame_id - k ..= frame_id - 1`, oldest first.
    ///
    /// `None` unless all `k` rows are present: a gap in the track's history
    /// (lost and re-acquired) counts as insufficient.
    pub fn window(
        &self,
        track_id: TrackId,
        frame_id: FrameId,
        column: usize,
        k: usize,
    ) -> Option<Vec<Value>> {
        if k == 0 {
            return Some(Vec::new());
        }
        let ring = self.index.get(&track_id)?;
        let first = frame_id.checked_sub(k as u64)?;

        // Frame ids are strictly increasing per track, so k rows inside a
        // range of k frames are exactly the contiguous window.
        let metas: Vec<&RowMeta> = ring
            .iter()
            .filter(|m| m.frame_id >= first && m.frame_id < frame_id)
            .collect();
        if metas.len() != k {
            return None;
        }

        metas
            .iter()
            .map(|m| {
                self.rows
                    .get(m.slab_key)
                    .and_then(|row| row.get(column))
                    .cloned()
            })
            .collect()
    }

    /// Most recent row of `track_id` and the frame it was stored at
    pub fn latest(&self, track_id: TrackId) -> Option<(FrameId, &[Value])> {
        let meta = self.index.get(&track_id)?.iter().last()?;
        self.rows
            .get(meta.slab_key)
            .map(|row| (meta.frame_id, row.as_slice()))
    }

    /// Drop rows no window ending after `frame_id` can reach, and every row
    /// of tracks for which `keep` returns false. Returns the evicted row count.
    pub fn evict(&mut self, frame_id: FrameId, keep: impl Fn(TrackId) -> bool) -> usize {
        let cutoff = (frame_id + 1).saturating_sub(self.capacity as u64);
        let rows = &mut self.rows;
        let mut evicted = 0;

        self.index.retain(|&track_id, ring| {
            if !keep(track_id) {
                for m in ring.pop_iter() {
                    rows.remove(m.slab_key);
                    evicted += 1;
                }
                return false;
            }

            let remaining: Vec<RowMeta> = ring
                .pop_iter()
                .filter(|m| {
                    if m.frame_id >= cutoff {
                        true
                    } else {
                        rows.remove(m.slab_key);
                        evicted += 1;
                        false
                    }
                })
                .collect();

            let alive = !remaining.is_empty();
            for m in remaining {
                let _ = ring.try_push(m);
            }
            alive
        });

        self.evicted_count += evicted as u64;
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> HistoryBuffer {
        HistoryBuffer::new(vec!["tlbr".into(), "speed".into()], capacity)
    }

    fn row(v: f64) -> Vec<Value> {
        vec![Value::Float(v), Value::Float(v * 10.0)]
    }

    #[test]
    fn test_window_requires_contiguous_rows() {
        let mut buf = buffer(2);
        assert!(buf.push(1, 5, row(5.0)));
        assert_eq!(buf.window(1, 6, 0, 2), None);

        assert!(buf.push(1, 6, row(6.0)));
        assert_eq!(
            buf.window(1, 7, 1, 2),
            Some(vec![Value::Float(50.0), Value::Float(60.0)])
        );
        assert_eq!(buf.window(1, 7, 0, 1), Some(vec![Value::Float(6.0)]));

        // Frame 7 missing: window at 9 would need 7 and 8
        assert!(buf.push(1, 8, row(8.0)));
        assert_eq!(buf.window(1, 9, 0, 2), None);
        assert_eq!(buf.window(1, 9, 0, 1), Some(vec![Value::Float(8.0)]));
        assert_eq!(buf.window(2, 9, 0, 1), None);
    }

    #[test]
    fn test_capacity_rotates_oldest() {
        let mut buf = buffer(2);
        for f in 1..=4 {
            buf.push(1, f, row(f as f64));
        }
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.evicted_count(), 2);
        assert_eq!(buf.window(1, 3, 0, 2), None);
    }

    #[test]
    fn test_stale_rows_ignored() {
        let mut buf = buffer(3);
        assert!(buf.push(1, 4, row(4.0)));
        assert!(!buf.push(1, 4, row(9.0)));
        assert!(!buf.push(1, 3, row(3.0)));
        assert_eq!(buf.window(1, 5, 0, 1), Some(vec![Value::Float(4.0)]));
    }

    #[test]
    fn test_latest_row() {
        let mut buf = buffer(2);
        assert!(buf.latest(1).is_none());
        buf.push(1, 3, row(3.0));
        buf.push(1, 7, row(7.0));
        let (frame_id, values) = buf.latest(1).unwrap();
        assert_eq!(frame_id, 7);
        assert_eq!(values, &[Value::Float(7.0), Value::Float(70.0)]);
    }

    #[test]
    fn test_evict_by_age_and_liveness() {
        let mut buf = buffer(2);
        buf.push(1, 1, row(1.0));
        buf.push(1, 2, row(2.0));
        buf.push(2, 2, row(2.0));
        buf.push(3, 2, row(2.0));

        // Track 3 was removed by the tracker
        let evicted = buf.evict(2, |id| id != 3);
        assert_eq!(evicted, 1);
        assert_eq!(buf.track_count(), 2);

        // With k = 2, the window at frame 5 starts at frame 3
        let evicted = buf.evict(4, |_| true);
        assert_eq!(evicted, 3);
        assert!(buf.is_empty());
        assert_eq!(buf.track_count(), 0);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut buf = buffer(0);
        assert!(!buf.push(1, 1, row(1.0)));
        assert!(buf.is_empty());
        assert_eq!(buf.window(1, 2, 0, 0), Some(vec![]));
    }
}
