//! Monocular distance estimation
//!
//! Pinhole-camera similar triangles: an object of known real height `H`
//! appearing `h` pixels tall through a lens of focal length `f` (pixels)
//! is `H * f / h` meters away. The focal length is an uncalibrated proxy.

use serde::{Deserialize, Serialize};

/// Assumed average vehicle height (meters)
pub const REAL_VEHICLE_HEIGHT_M: f32 = 1.5;

/// Approximate focal length (pixels)
pub const FOCAL_LENGTH_PX: f32 = 800.0;

/// Outcome substituted when the computation itself faults (NaN or infinite
/// height, non-finite result)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Treat the vehicle as infinitely far: never alerts
    #[default]
    AssumeFar,
    /// Treat the vehicle as touching: always alerts
    AssumeNear,
}

/// Box-height based distance estimator
#[derive(Debug, Clone, Copy)]
pub struct DistanceEstimator {
    fault_policy: FaultPolicy,
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self::new(FaultPolicy::default())
    }
}

impl DistanceEstimator {
    pub fn new(fault_policy: FaultPolicy) -> Self {
        Self { fault_policy }
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    /// Estimated distance in meters, or `f32::INFINITY`.
    ///
    /// Absent boxes and boxes of height <= 1 px are infinitely far.
    /// `frame_height` is accepted for interface stability but does not enter
    /// the formula.
    pub fn estimate(&self, box_height: Option<f32>, _frame_height: f32) -> f32 {
        let Some(height) = box_height else {
            return f32::INFINITY;
        };
        if height.is_nan() || height == f32::INFINITY {
            return self.fault();
        }
        if height <= 1.0 {
            return f32::INFINITY;
        }

        let distance = (REAL_VEHICLE_HEIGHT_M * FOCAL_LENGTH_PX) / height;
        if distance.is_finite() {
            distance
        } else {
            self.fault()
        }
    }

    fn fault(&self) -> f32 {
        match self.fault_policy {
            FaultPolicy::AssumeFar => f32::INFINITY,
            FaultPolicy::AssumeNear => 0.0,
        }
    }
}

/// Distance with the default (assume far) fault policy
pub fn estimate_distance(box_height: f32, frame_height: f32) -> f32 {
    DistanceEstimator::default().estimate(Some(box_height), frame_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_points() {
        assert_eq!(estimate_distance(1200.0, 640.0), 1.0);
        assert_eq!(estimate_distance(1200.0, 10.0), 1.0);
        assert_eq!(estimate_distance(50.0, 640.0), 24.0);
        assert!(estimate_distance(100.0, 640.0) > estimate_distance(200.0, 640.0));
    }

    #[test]
    fn test_degenerate_heights_are_infinite() {
        let estimator = DistanceEstimator::default();
        assert_eq!(estimator.estimate(None, 640.0), f32::INFINITY);
        for h in [1.0, 0.5, 0.0, -3.0, f32::NEG_INFINITY] {
            assert_eq!(estimator.estimate(Some(h), 640.0), f32::INFINITY, "{}", h);
        }
    }

    #[test]
    fn test_degenerate_heights_ignore_fault_policy() {
        let estimator = DistanceEstimator::new(FaultPolicy::AssumeNear);
        assert_eq!(estimator.estimate(Some(0.0), 640.0), f32::INFINITY);
        assert_eq!(estimator.estimate(None, 640.0), f32::INFINITY);
    }

    #[test]
    fn test_non_finite_heights_follow_fault_policy() {
        assert_eq!(
            DistanceEstimator::default().estimate(Some(f32::NAN), 640.0),
            f32::INFINITY
        );
        assert_eq!(
            DistanceEstimator::new(FaultPolicy::AssumeNear).estimate(Some(f32::NAN), 640.0),
            0.0
        );
        assert_eq!(
            DistanceEstimator::default().estimate(Some(f32::INFINITY), 640.0),
            f32::INFINITY
        );
        assert_eq!(
            DistanceEstimator::new(FaultPolicy::AssumeNear).estimate(Some(f32::INFINITY), 640.0),
            0.0
        );
    }

    proptest! {
        #[test]
        fn prop_small_boxes_never_alert(h in -1.0e6f32..=1.0, frame in 1.0f32..4000.0) {
            prop_assert_eq!(estimate_distance(h, frame), f32::INFINITY);
        }

        #[test]
        fn prop_taller_box_is_closer(h in 1.01f32..10_000.0, delta in 0.5f32..1000.0, frame in 1.0f32..4000.0) {
            let near = estimate_distance(h + delta, frame);
            let far = estimate_distance(h, frame);
            prop_assert!(near < far);
            prop_assert!(near.is_finite() && far.is_finite());
        }

        #[test]
        fn prop_frame_height_is_ignored(h in 1.01f32..5000.0, a in 1.0f32..4000.0, b in 1.0f32..4000.0) {
            prop_assert_eq!(estimate_distance(h, a), estimate_distance(h, b));
        }
    }
}
