//! Configuration of the pose optimizer.
//!
//! Options are grouped the same way the solver consumes them. Every group derives
//! `serde` traits with field defaults, so a partial JSON document is a valid configuration:
//!
//! ```rust
//! use kornia_pose_ba::PoseOptimizerOptions;
//!
//! let options = PoseOptimizerOptions::default()
//!     .with_max_num_iterations(50)
//!     .with_huber_threshold(1.0);
//! assert_eq!(options.iteration.max_num_iterations, 50);
//! assert!(options.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PoseOptimizerError;

/// Iteration control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationOptions {
    /// Maximum number of linearizations. Zero returns the initial pose untouched.
    pub max_num_iterations: usize,
    /// Accumulate the normal equations on the rayon thread pool.
    pub parallel: bool,
}

impl Default for IterationOptions {
    fn default() -> Self {
        Self {
            max_num_iterations: 100,
            parallel: true,
        }
    }
}

/// Convergence control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceOptions {
    /// Stop when the absolute change of the robust cost falls below this value.
    pub threshold_cost_change: f64,
    /// Stop when the norm of the pose increment falls below this value.
    pub threshold_step_size: f64,
}

impl Default for ConvergenceOptions {
    fn default() -> Self {
        Self {
            threshold_cost_change: 1e-6,
            threshold_step_size: 1e-6,
        }
    }
}

/// Outlier control, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierOptions {
    /// Residual norm where the Huber loss switches from quadratic to linear.
    pub threshold_huber_loss: f64,
    /// Residual norm above which a correspondence is rejected. `f64::INFINITY` disables it.
    pub threshold_outlier_rejection: f64,
}

impl Default for OutlierOptions {
    fn default() -> Self {
        Self {
            threshold_huber_loss: 1.5,
            threshold_outlier_rejection: 2.5,
        }
    }
}

/// Damping schedule used when a Gauss-Newton step increases the cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingOptions {
    /// First damping factor tried after a rejected step.
    pub lambda_init: f64,
    /// Multiplicative growth of the damping factor between retries.
    pub lambda_factor: f64,
    /// The solve diverges once the damping factor exceeds this value.
    pub lambda_max: f64,
}

impl Default for DampingOptions {
    fn default() -> Self {
        Self {
            lambda_init: 1e-4,
            lambda_factor: 10.0,
            lambda_max: 1e8,
        }
    }
}

/// Diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOptions {
    /// Maximum number of poses kept in the debug trajectory. Zero disables recording.
    pub trajectory_capacity: usize,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            trajectory_capacity: 256,
        }
    }
}

/// All the knobs of [`crate::PoseOptimizer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseOptimizerOptions {
    /// Iteration control.
    pub iteration: IterationOptions,
    /// Convergence control.
    pub convergence: ConvergenceOptions,
    /// Outlier control.
    pub outlier: OutlierOptions,
    /// Damping schedule.
    pub damping: DampingOptions,
    /// Diagnostics.
    pub debug: DebugOptions,
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), PoseOptimizerError> {
    // NaN fails the comparison as well
    if value >= 0.0 {
        Ok(())
    } else {
        Err(PoseOptimizerError::InvalidThreshold { name, value })
    }
}

impl PoseOptimizerOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations.
    pub fn with_max_num_iterations(mut self, max_num_iterations: usize) -> Self {
        self.iteration.max_num_iterations = max_num_iterations;
        self
    }

    /// Enable or disable parallel accumulation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.iteration.parallel = parallel;
        self
    }

    /// Set the cost change threshold.
    pub fn with_cost_change_threshold(mut self, threshold: f64) -> Self {
        self.convergence.threshold_cost_change = threshold;
        self
    }

    /// Set the step size threshold.
    pub fn with_step_size_threshold(mut self, threshold: f64) -> Self {
        self.convergence.threshold_step_size = threshold;
        self
    }

    /// Set the Huber loss threshold.
    pub fn with_huber_threshold(mut self, threshold: f64) -> Self {
        self.outlier.threshold_huber_loss = threshold;
        self
    }

    /// Set the outlier rejection threshold.
    pub fn with_outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier.threshold_outlier_rejection = threshold;
        self
    }

    /// Set the debug trajectory capacity.
    pub fn with_trajectory_capacity(mut self, capacity: usize) -> Self {
        self.debug.trajectory_capacity = capacity;
        self
    }

    /// Check that the options describe a valid solve.
    pub fn validate(&self) -> Result<(), PoseOptimizerError> {
        check_threshold(
            "threshold_cost_change",
            self.convergence.threshold_cost_change,
        )?;
        check_threshold("threshold_step_size", self.convergence.threshold_step_size)?;
        check_threshold("threshold_huber_loss", self.outlier.threshold_huber_loss)?;
        check_threshold(
            "threshold_outlier_rejection",
            self.outlier.threshold_outlier_rejection,
        )?;

        let damping = &self.damping;
        if !(damping.lambda_init > 0.0 && damping.lambda_init.is_finite()) {
            return Err(PoseOptimizerError::InvalidDamping(format!(
                "lambda_init must be positive and finite, got {}",
                damping.lambda_init
            )));
        }
        if !(damping.lambda_factor > 1.0 && damping.lambda_factor.is_finite()) {
            return Err(PoseOptimizerError::InvalidDamping(format!(
                "lambda_factor must be greater than one, got {}",
                damping.lambda_factor
            )));
        }
        if !damping.lambda_max.is_finite() {
            return Err(PoseOptimizerError::InvalidDamping(format!(
                "lambda_max must be finite, got {}",
                damping.lambda_max
            )));
        }
        if !(damping.lambda_max >= damping.lambda_init) {
            return Err(PoseOptimizerError::InvalidDamping(format!(
                "lambda_max ({}) must not be smaller than lambda_init ({})",
                damping.lambda_max, damping.lambda_init
            )));
        }
        Ok(())
    }
}
