//! Robust Gauss-Newton pose optimizer with damped retries and outlier rejection.

use glam::{DVec2, DVec3};
use kornia_lie::SE3F64;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::camera::PinholeIntrinsics;
use crate::error::PoseOptimizerError;
use crate::normal::NormalEquations;
use crate::options::{DampingOptions, PoseOptimizerOptions};
use crate::residual::{linearize, reprojection_residual};
use crate::robust::{HuberLoss, IdentityLoss, OutlierClassifier, RobustLoss};
use crate::summary::{Summary, TerminationReason};
use crate::trajectory::DebugTrajectory;

/// Correspondences per accumulation chunk. Partial sums are reduced in chunk order, so
/// the serial and parallel paths produce identical results.
const CHUNK_SIZE: usize = 4096;

/// Outcome of a pose-only bundle adjustment.
#[derive(Debug, Clone)]
pub struct PoseOptimizationResult {
    /// Refined camera pose in the world frame.
    pub pose: SE3F64,
    /// One flag per correspondence, `false` for rejected outliers.
    pub inlier_mask: Vec<bool>,
    /// Solve diagnostics.
    pub summary: Summary,
    /// Starting pose followed by the pose after every iteration.
    pub trajectory: DebugTrajectory,
}

/// Pose-only bundle adjustment solver.
///
/// The pose is the camera pose in the world frame, so a world point `p_w` is seen by
/// the camera at `pose.inverse() * p_w`. Each iteration solves the Huber-weighted normal
/// equations for an increment `δ = [ω; υ]` and updates `pose ← pose ∘ Exp(δ)`. A step
/// that increases the cost is retried with Levenberg-Marquardt damping.
///
/// ```rust
/// use glam::{DVec2, DVec3};
/// use kornia_lie::SE3F64;
/// use kornia_pose_ba::{PinholeIntrinsics, PoseOptimizer, PoseOptimizerOptions};
///
/// let intrinsics = PinholeIntrinsics::new(338.0, 338.0, 320.0, 240.0);
/// let points_world: Vec<DVec3> = (0..20)
///     .map(|i| DVec3::new((i % 5) as f64 - 2.0, (i / 5) as f64 - 1.5, 3.0 + 0.1 * i as f64))
///     .collect();
/// let pixels: Vec<DVec2> = points_world
///     .iter()
///     .filter_map(|p| intrinsics.project(*p))
///     .collect();
///
/// let optimizer = PoseOptimizer::new(PoseOptimizerOptions::default());
/// let result = optimizer
///     .optimize(&points_world, &pixels, &intrinsics, &SE3F64::IDENTITY)
///     .unwrap();
/// assert!(result.summary.termination_reason.is_converged());
/// assert_eq!(result.inlier_mask.len(), points_world.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoseOptimizer {
    options: PoseOptimizerOptions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StepOutcome {
    Accepted,
    Stalled,
    Exhausted,
    Singular,
}

/// Step chosen by one iteration and the damping it took to find it.
#[derive(Debug, Clone, Copy)]
struct StepSearch {
    outcome: StepOutcome,
    delta: [f64; 6],
    cost: f64,
    /// Damping of the last solved step, zero for the Gauss-Newton step.
    lambda: f64,
    rejected: usize,
}

impl PoseOptimizer {
    /// Create an optimizer with the given options.
    pub fn new(options: PoseOptimizerOptions) -> Self {
        Self { options }
    }

    /// The options used by this optimizer.
    pub fn options(&self) -> &PoseOptimizerOptions {
        &self.options
    }

    /// Refine `initial_pose` against the 3D-2D correspondences.
    ///
    /// # Arguments
    ///
    /// * `points_world` - 3D points in the world frame.
    /// * `pixels` - Observed pixels, index-aligned with `points_world`.
    /// * `intrinsics` - Pinhole camera intrinsics.
    /// * `initial_pose` - Starting camera pose in the world frame.
    ///
    /// # Errors
    ///
    /// Precondition failures are reported before any iteration runs. A solve that did run
    /// always returns a pose; its quality is given by the summary's termination reason.
    pub fn optimize(
        &self,
        points_world: &[DVec3],
        pixels: &[DVec2],
        intrinsics: &PinholeIntrinsics,
        initial_pose: &SE3F64,
    ) -> Result<PoseOptimizationResult, PoseOptimizerError> {
        if points_world.len() != pixels.len() {
            return Err(PoseOptimizerError::MismatchedArrayLengths {
                left_name: "world points",
                left_len: points_world.len(),
                right_name: "pixels",
                right_len: pixels.len(),
            });
        }
        self.options.validate()?;
        intrinsics.validate()?;
        check_finite("world points", points_world.iter().map(|p| p.is_finite()))?;
        check_finite("pixels", pixels.iter().map(|p| p.is_finite()))?;
        check_finite(
            "initial pose",
            initial_pose.to_array().iter().map(|v| v.is_finite()),
        )?;

        let problem = Problem {
            points_world,
            pixels,
            intrinsics,
            parallel: self.options.iteration.parallel,
        };
        let num_points = points_world.len();

        let mut pose = *initial_pose;
        let mut inlier_mask = vec![true; num_points];
        let mut trajectory = DebugTrajectory::with_capacity(self.options.debug.trajectory_capacity);
        trajectory.push(pose);

        let (initial_cost, _) = problem.cost(&pose.inverse(), &IdentityLoss, &inlier_mask);
        let mut summary = Summary::new(num_points, initial_cost);

        let max_num_iterations = self.options.iteration.max_num_iterations;
        if max_num_iterations == 0 {
            info!("{summary}");
            return Ok(PoseOptimizationResult {
                pose,
                inlier_mask,
                summary,
                trajectory,
            });
        }

        let huber = HuberLoss::new(self.options.outlier.threshold_huber_loss);
        let classifier = OutlierClassifier::new(self.options.outlier.threshold_outlier_rejection);
        let convergence = &self.options.convergence;
        let damping = &self.options.damping;

        let mut rejection_armed = false;
        let mut termination_reason = TerminationReason::MaxIterationsReached;

        for iteration in 0..max_num_iterations {
            // correspondences behind the camera stay out of the inlier set from here on
            let system = problem.accumulate(&pose.inverse(), &huber, &mut inlier_mask);
            if system.num_active == 0 {
                warn!("iteration {iteration}: no correspondence in front of the camera");
                termination_reason = TerminationReason::Diverged;
                break;
            }
            let cost = system.cost;

            let search = search_step(cost, convergence.threshold_cost_change, damping, |lambda| {
                let delta = system.solve(lambda)?;
                let candidate = pose.rplus(&delta);
                let (candidate_cost, degenerate) =
                    problem.cost(&candidate.inverse(), &huber, &inlier_mask);
                Some((delta, if degenerate > 0 { f64::INFINITY } else { candidate_cost }))
            });
            summary.num_rejected_steps += search.rejected;

            let (new_cost, step_norm) = match search.outcome {
                StepOutcome::Accepted => {
                    pose = pose.rplus(&search.delta);
                    (search.cost, norm6(&search.delta))
                }
                StepOutcome::Stalled => (cost, 0.0),
                StepOutcome::Exhausted => {
                    warn!(
                        "iteration {iteration}: no damped step decreases the cost {cost:.6e} (lambda {:.1e})",
                        search.lambda
                    );
                    termination_reason = TerminationReason::Diverged;
                    break;
                }
                StepOutcome::Singular => {
                    warn!(
                        "iteration {iteration}: singular normal equations with {} active correspondences",
                        system.num_active
                    );
                    termination_reason = TerminationReason::Diverged;
                    break;
                }
            };

            summary.iterations = iteration + 1;
            summary.cost_history.push(new_cost);
            trajectory.push(pose);

            let cost_change = cost - new_cost;
            debug!(
                "iteration {}: cost {:.6e} -> {:.6e}, |delta| {:.3e}, lambda {:.1e}, active {}",
                iteration, cost, new_cost, step_norm, search.lambda, system.num_active
            );

            // damped steps are shortened, so only a Gauss-Newton step measures the distance
            // to the minimum
            let converged = search.outcome == StepOutcome::Stalled
                || cost_change.abs() < convergence.threshold_cost_change
                || (search.lambda == 0.0 && step_norm < convergence.threshold_step_size);

            if converged || rejection_armed {
                rejection_armed = true;
                let rejected = problem.classify(&pose.inverse(), &classifier, &mut inlier_mask);
                if rejected > 0 {
                    debug!("iteration {iteration}: rejected {rejected} outliers");
                } else if converged {
                    termination_reason = TerminationReason::Converged;
                    break;
                }
            }
        }

        let (final_cost, _) = problem.cost(&pose.inverse(), &huber, &inlier_mask);
        summary.final_cost = final_cost;
        summary.num_inliers = inlier_mask.iter().filter(|&&inlier| inlier).count();
        summary.termination_reason = termination_reason;

        match termination_reason {
            TerminationReason::Diverged => warn!("{summary}"),
            _ => info!("{summary}"),
        }

        Ok(PoseOptimizationResult {
            pose,
            inlier_mask,
            summary,
            trajectory,
        })
    }
}

/// Gauss-Newton step followed by Levenberg-Marquardt retries.
///
/// `try_step(lambda)` solves the system damped by `lambda` and returns the increment with
/// the cost it reaches, or `None` when the damped system is singular. A step is accepted
/// once it does not raise `cost`. A rise smaller than `threshold_cost_change` stalls the
/// search instead of spending more retries on it.
fn search_step<F>(
    cost: f64,
    threshold_cost_change: f64,
    damping: &DampingOptions,
    mut try_step: F,
) -> StepSearch
where
    F: FnMut(f64) -> Option<([f64; 6], f64)>,
{
    let Some((mut delta, mut candidate_cost)) = try_step(0.0) else {
        return StepSearch {
            outcome: StepOutcome::Singular,
            delta: [0.0; 6],
            cost,
            lambda: 0.0,
            rejected: 0,
        };
    };

    let mut lambda = damping.lambda_init;
    let mut step_lambda = 0.0;
    let mut rejected = 0;
    let outcome = loop {
        if candidate_cost <= cost {
            break StepOutcome::Accepted;
        }
        if candidate_cost - cost < threshold_cost_change {
            break StepOutcome::Stalled;
        }
        rejected += 1;
        if lambda > damping.lambda_max {
            break StepOutcome::Exhausted;
        }
        if let Some((damped, damped_cost)) = try_step(lambda) {
            delta = damped;
            candidate_cost = damped_cost;
            step_lambda = lambda;
        }
        lambda *= damping.lambda_factor;
    };

    StepSearch {
        outcome,
        delta,
        cost: candidate_cost,
        lambda: step_lambda,
        rejected,
    }
}

fn check_finite(
    name: &'static str,
    mut values: impl Iterator<Item = bool>,
) -> Result<(), PoseOptimizerError> {
    match values.position(|finite| !finite) {
        Some(index) => Err(PoseOptimizerError::NonFiniteInput { name, index }),
        None => Ok(()),
    }
}

#[inline]
fn norm6(v: &[f64; 6]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Read-only view of one solve's correspondences.
struct Problem<'a> {
    points_world: &'a [DVec3],
    pixels: &'a [DVec2],
    intrinsics: &'a PinholeIntrinsics,
    parallel: bool,
}

impl Problem<'_> {
    /// Normal equations over the selected correspondences that have positive depth.
    ///
    /// Selected correspondences without positive depth are removed from `selection`.
    fn accumulate<L: RobustLoss>(
        &self,
        camera_from_world: &SE3F64,
        loss: &L,
        selection: &mut [bool],
    ) -> NormalEquations {
        let partials: Vec<NormalEquations> = if self.parallel {
            self.points_world
                .par_chunks(CHUNK_SIZE)
                .zip(self.pixels.par_chunks(CHUNK_SIZE))
                .zip(selection.par_chunks_mut(CHUNK_SIZE))
                .map(|((points, pixels), selection)| {
                    self.accumulate_chunk(camera_from_world, loss, points, pixels, selection)
                })
                .collect()
        } else {
            self.points_world
                .chunks(CHUNK_SIZE)
                .zip(self.pixels.chunks(CHUNK_SIZE))
                .zip(selection.chunks_mut(CHUNK_SIZE))
                .map(|((points, pixels), selection)| {
                    self.accumulate_chunk(camera_from_world, loss, points, pixels, selection)
                })
                .collect()
        };

        partials
            .iter()
            .fold(NormalEquations::new(), |mut system, partial| {
                system.merge(partial);
                system
            })
    }

    fn accumulate_chunk<L: RobustLoss>(
        &self,
        camera_from_world: &SE3F64,
        loss: &L,
        points: &[DVec3],
        pixels: &[DVec2],
        selection: &mut [bool],
    ) -> NormalEquations {
        let mut system = NormalEquations::new();
        for ((&point, &pixel), selected) in points
            .iter()
            .zip(pixels)
            .zip(selection.iter_mut())
            .filter(|(_, selected)| **selected)
        {
            match linearize(camera_from_world, self.intrinsics, point, pixel) {
                Some(lin) => {
                    let squared_norm = lin.squared_norm();
                    system.add(&lin, loss.weight(squared_norm), loss.cost(squared_norm));
                }
                None => *selected = false,
            }
        }
        system
    }

    /// Robust cost over the selected correspondences, and how many of them were degenerate.
    fn cost<L: RobustLoss>(
        &self,
        camera_from_world: &SE3F64,
        loss: &L,
        selection: &[bool],
    ) -> (f64, usize) {
        let chunk_cost = |points: &[DVec3], pixels: &[DVec2], selection: &[bool]| {
            let mut cost = 0.0;
            let mut degenerate = 0;
            for ((&point, &pixel), _) in points
                .iter()
                .zip(pixels)
                .zip(selection)
                .filter(|(_, selected)| **selected)
            {
                match reprojection_residual(camera_from_world, self.intrinsics, point, pixel) {
                    Some(r) => cost += loss.cost(r.length_squared()),
                    None => degenerate += 1,
                }
            }
            (cost, degenerate)
        };

        let partials: Vec<(f64, usize)> = if self.parallel {
            self.points_world
                .par_chunks(CHUNK_SIZE)
                .zip(self.pixels.par_chunks(CHUNK_SIZE))
                .zip(selection.par_chunks(CHUNK_SIZE))
                .map(|((points, pixels), selection)| chunk_cost(points, pixels, selection))
                .collect()
        } else {
            self.points_world
                .chunks(CHUNK_SIZE)
                .zip(self.pixels.chunks(CHUNK_SIZE))
                .zip(selection.chunks(CHUNK_SIZE))
                .map(|((points, pixels), selection)| chunk_cost(points, pixels, selection))
                .collect()
        };

        partials
            .iter()
            .fold((0.0, 0), |(cost, degenerate), &(c, d)| (cost + c, degenerate + d))
    }

    /// Mark inliers that are outliers or degenerate at the given pose.
    ///
    /// Returns the number of newly rejected correspondences.
    fn classify(
        &self,
        camera_from_world: &SE3F64,
        classifier: &OutlierClassifier,
        inlier_mask: &mut [bool],
    ) -> usize {
        let mut rejected = 0;
        for ((&point, &pixel), inlier) in self
            .points_world
            .iter()
            .zip(self.pixels)
            .zip(inlier_mask.iter_mut())
            .filter(|(_, inlier)| **inlier)
        {
            let is_outlier =
                match reprojection_residual(camera_from_world, self.intrinsics, point, pixel) {
                    Some(r) => classifier.is_outlier(r.length_squared()),
                    None => true,
                };
            if is_outlier {
                *inlier = false;
                rejected += 1;
            }
        }
        rejected
    }
}
