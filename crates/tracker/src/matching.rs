//! Association helpers: IOU costs, score fusion, thresholded assignment.

use lapjv::{lapjv, Matrix};
use nalgebra::DMatrix;

/// Cost assigned to pairs that must never be matched
const INVALID_MATCH: f32 = 1_000_000.0;
const EPSILON: f32 = 1e-7;

/// Intersection over union of two (x1, y1, x2, y2) boxes
#[inline]
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = ix * iy;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    intersection / (area_a + area_b - intersection + EPSILON)
}

/// Pairwise `1 - iou` between two box sets (rows = `a`, cols = `b`)
pub fn iou_distance(a: &[[f32; 4]], b: &[[f32; 4]]) -> DMatrix<f32> {
    DMatrix::from_fn(a.len(), b.len(), |i, j| 1.0 - iou(&a[i], &b[j]))
}

/// Blend detection confidence into an IOU distance matrix
///
/// `cost = 1 - (1 - cost) * score[col]`
pub fn fuse_score(cost: &mut DMatrix<f32>, scores: &[f32]) {
    for (j, mut col) in cost.column_iter_mut().enumerate() {
        let score = scores.get(j).copied().unwrap_or(0.0);
        for c in col.iter_mut() {
            *c = 1.0 - (1.0 - *c) * score;
        }
    }
}

/// Result of a thresholded assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// (row, col) pairs with cost <= threshold
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Minimum-cost bipartite assignment with a cost limit.
///
/// Solved on the extended `(n+m) x (n+m)` matrix: leaving a row or a column
/// unmatched costs `thresh / 2`, so a pair is only matched when that is
/// globally cheaper than leaving both sides unmatched.
pub fn linear_assignment(cost: &DMatrix<f32>, thresh: f32) -> Assignment {
    let (n, m) = cost.shape();
    if n == 0 || m == 0 {
        return Assignment {
            matches: Vec::new(),
            unmatched_rows: (0..n).collect(),
            unmatched_cols: (0..m).collect(),
        };
    }

    let dim = n + m;
    let half = thresh / 2.0;
    let extended = Matrix::from_shape_fn((dim, dim), |(i, j)| match (i < n, j < m) {
        (true, true) => {
            let c = cost[(i, j)];
            if c.is_finite() && c <= thresh {
                c
            } else {
                INVALID_MATCH
            }
        }
        (true, false) | (false, true) => half,
        (false, false) => 0.0,
    });

    let mut row_matched = vec![false; n];
    let mut col_matched = vec![false; m];
    let mut matches = Vec::new();

    match lapjv(&extended) {
        Ok((row_to_col, _)) => {
            for (i, &j) in row_to_col.iter().take(n).enumerate() {
                if j < m && cost[(i, j)] <= thresh {
                    matches.push((i, j));
                    row_matched[i] = true;
                    col_matched[j] = true;
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = ?e, rows = n, cols = m, "linear assignment failed, leaving all unmatched");
        }
    }

    Assignment {
        matches,
        unmatched_rows: (0..n).filter(|&i| !row_matched[i]).collect(),
        unmatched_cols: (0..m).filter(|&j| !col_matched[j]).collect(),
    }
}

/// Duplicate suppression between two track sets.
///
/// Each entry is `(tlbr, lifetime)`. Any cross pair closer than `max_distance`
/// (IOU distance) drops the member with the shorter lifetime; ties drop the
/// entry from `a`. Returns keep-masks for `a` and `b`.
pub fn deduplicate(
    a: &[([f32; 4], u64)],
    b: &[([f32; 4], u64)],
    max_distance: f32,
) -> (Vec<bool>, Vec<bool>) {
    let mut keep_a = vec![true; a.len()];
    let mut keep_b = vec![true; b.len()];
    for (p, (box_a, life_a)) in a.iter().enumerate() {
        for (q, (box_b, life_b)) in b.iter().enumerate() {
            if 1.0 - iou(box_a, box_b) < max_distance {
                if life_a > life_b {
                    keep_b[q] = false;
                } else {
                    keep_a[p] = false;
                }
            }
        }
    }
    (keep_a, keep_b)
}
