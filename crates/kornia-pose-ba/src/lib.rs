#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Pose-only bundle adjustment
//!
//! Refines the 6-DoF pose of a calibrated pinhole camera from known 3D world points and
//! their observed pixels. The solver runs Huber-weighted Gauss-Newton iterations on the
//! SE(3) manifold, retries cost-increasing steps with Levenberg-Marquardt damping and
//! rejects correspondences whose reprojection error exceeds a hard threshold.
//!
//! ```rust
//! use kornia_pose_ba::synthetic::{self, SceneConfig};
//! use kornia_pose_ba::{solve_monocular_pose_only_ba_6dof, PoseOptimizerOptions};
//!
//! let scene = synthetic::generate_scene(
//!     &SceneConfig { num_points: 500, ..Default::default() },
//!     &synthetic::reference_pose(),
//!     &synthetic::reference_intrinsics(),
//! )
//! .unwrap();
//!
//! let result = solve_monocular_pose_only_ba_6dof(
//!     &scene.points_world,
//!     &scene.pixels,
//!     &scene.intrinsics,
//!     &synthetic::reference_initial_guess(),
//!     &PoseOptimizerOptions::default(),
//! )
//! .unwrap();
//!
//! let (rotation_error, translation_error) = synthetic::pose_error(&result.pose, &scene.pose);
//! assert!(rotation_error < 1e-3 && translation_error < 1e-3);
//! println!("{}", result.summary.brief_report());
//! ```

/// Pinhole camera model.
pub mod camera;

mod error;
pub use error::PoseOptimizerError;

/// Weighted normal equations and their solve.
pub mod normal;

/// Solver configuration.
pub mod options;

/// The iterative pose optimizer.
pub mod optimizer;

/// Reprojection residuals and Jacobians.
pub mod residual;

/// Robust losses and outlier classification.
pub mod robust;

/// Solve diagnostics.
pub mod summary;

/// Synthetic scenes for tests, benchmarks and demos.
pub mod synthetic;

/// Debug pose trajectory.
pub mod trajectory;

pub use camera::PinholeIntrinsics;
pub use optimizer::{PoseOptimizationResult, PoseOptimizer};
pub use options::{
    ConvergenceOptions, DampingOptions, DebugOptions, IterationOptions, OutlierOptions,
    PoseOptimizerOptions,
};
pub use summary::{Summary, TerminationReason};
pub use trajectory::DebugTrajectory;

use glam::{DVec2, DVec3};
use kornia_lie::SE3F64;

/// Refine the camera pose of a monocular 6-DoF pose-only bundle adjustment problem.
///
/// Convenience wrapper around [`PoseOptimizer::optimize`].
///
/// # Arguments
///
/// * `points_world` - 3D points in the world frame.
/// * `pixels` - Observed pixels, index-aligned with `points_world`.
/// * `intrinsics` - Pinhole camera intrinsics.
/// * `initial_pose` - Starting camera pose in the world frame.
/// * `options` - Solver options.
///
/// # Returns
///
/// The refined pose, the inlier mask, the solve summary and the debug trajectory.
pub fn solve_monocular_pose_only_ba_6dof(
    points_world: &[DVec3],
    pixels: &[DVec2],
    intrinsics: &PinholeIntrinsics,
    initial_pose: &SE3F64,
    options: &PoseOptimizerOptions,
) -> Result<PoseOptimizationResult, PoseOptimizerError> {
    PoseOptimizer::new(options.clone()).optimize(points_world, pixels, intrinsics, initial_pose)
}
