//! Constant-velocity Kalman filter for bounding boxes.
//!
//! State x = [cx, cy, a, h, vcx, vcy, va, vh]^T where (cx, cy) is the box
//! centre, `a` the aspect ratio w/h and `h` the height. Observations are the
//! first four components. Noise scales with the box height.

use nalgebra::{SMatrix, SVector};

/// Track state mean
pub type StateMean = SVector<f32, 8>;
/// Track state covariance
pub type StateCovariance = SMatrix<f32, 8, 8>;
/// Measurement (cx, cy, a, h)
pub type Measurement = SVector<f32, 4>;

const STD_WEIGHT_POSITION: f32 = 1.0 / 20.0;
const STD_WEIGHT_VELOCITY: f32 = 1.0 / 160.0;

/// Convert (x1, y1, x2, y2) to (cx, cy, aspect, height)
#[inline]
pub fn tlbr_to_xyah(tlbr: &[f32; 4]) -> [f32; 4] {
    let w = tlbr[2] - tlbr[0];
    let h = tlbr[3] - tlbr[1];
    [tlbr[0] + w / 2.0, tlbr[1] + h / 2.0, w / h, h]
}

/// Convert (cx, cy, aspect, height) to (x1, y1, x2, y2)
#[inline]
pub fn xyah_to_tlbr(xyah: &[f32; 4]) -> [f32; 4] {
    let h = xyah[3];
    let w = xyah[2] * h;
    [
        xyah[0] - w / 2.0,
        xyah[1] - h / 2.0,
        xyah[0] + w / 2.0,
        xyah[1] + h / 2.0,
    ]
}

/// Box Kalman filter (stateless; tracks own their mean and covariance)
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// State transition F (unit time step)
    motion_mat: StateCovariance,
    /// Observation matrix H
    update_mat: SMatrix<f32, 4, 8>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = StateCovariance::identity();
        for i in 0..4 {
            motion_mat[(i, i + 4)] = 1.0;
        }
        let mut update_mat = SMatrix::<f32, 4, 8>::zeros();
        for i in 0..4 {
            update_mat[(i, i)] = 1.0;
        }
        Self {
            motion_mat,
            update_mat,
        }
    }

    /// Create a track state from an unassociated measurement
    pub fn initiate(&self, xyah: &[f32; 4]) -> (StateMean, StateCovariance) {
        let mut mean = StateMean::zeros();
        mean.fixed_rows_mut::<4>(0)
            .copy_from(&Measurement::from_column_slice(xyah));

        let h = xyah[3];
        let std = StateMean::from_column_slice(&[
            2.0 * STD_WEIGHT_POSITION * h,
            2.0 * STD_WEIGHT_POSITION * h,
            1e-2,
            2.0 * STD_WEIGHT_POSITION * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            1e-5,
            10.0 * STD_WEIGHT_VELOCITY * h,
        ]);
        let covariance = StateCovariance::from_diagonal(&std.component_mul(&std));
        (mean, covariance)
    }

    /// Advance one frame
    pub fn predict(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (StateMean, StateCovariance) {
        let h = mean[3];
        let std = StateMean::from_column_slice(&[
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-2,
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_VELOCITY * h,
            STD_WEIGHT_VELOCITY * h,
            1e-5,
            STD_WEIGHT_VELOCITY * h,
        ]);
        let motion_cov = StateCovariance::from_diagonal(&std.component_mul(&std));

        let mean = self.motion_mat * mean;
        let covariance = self.motion_mat * covariance * self.motion_mat.transpose() + motion_cov;
        (mean, covariance)
    }

    /// Project the state into measurement space
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (Measurement, SMatrix<f32, 4, 4>) {
        let h = mean[3];
        let std = Measurement::new(
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-1,
            STD_WEIGHT_POSITION * h,
        );
        let innovation_cov = SMatrix::<f32, 4, 4>::from_diagonal(&std.component_mul(&std));

        let projected_mean = self.update_mat * mean;
        let projected_cov =
            self.update_mat * covariance * self.update_mat.transpose() + innovation_cov;
        (projected_mean, projected_cov)
    }

    /// Correct the state with an associated measurement.
    ///
    /// Returns `None` when the innovation covariance is not positive definite.
    pub fn update(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        xyah: &[f32; 4],
    ) -> Option<(StateMean, StateCovariance)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        // K = P H^T S^-1, solved as S K^T = H P
        let chol = projected_cov.cholesky()?;
        let kalman_gain = chol.solve(&(self.update_mat * covariance)).transpose();

        let innovation = Measurement::from_column_slice(xyah) - projected_mean;
        let new_mean = mean + kalman_gain * innovation;
        let new_cov = covariance - kalman_gain * projected_cov * kalman_gain.transpose();
        Some((new_mean, new_cov))
    }
}
