//! Solve diagnostics and their textual reports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason why the optimizer terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Cost change or step size fell below its threshold and no new outlier was found.
    Converged,
    /// The iteration budget ran out first.
    MaxIterationsReached,
    /// The normal equations became singular, no correspondence was usable, or no damped
    /// step could decrease the cost. The best pose found so far is returned.
    Diverged,
}

impl TerminationReason {
    /// Whether the solve reached a minimum.
    pub fn is_converged(&self) -> bool {
        matches!(self, TerminationReason::Converged)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationReason::Converged => "CONVERGENCE",
            TerminationReason::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
            TerminationReason::Diverged => "DIVERGED",
        };
        f.write_str(name)
    }
}

/// Diagnostics of one solve. Produced once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of completed iterations.
    pub iterations: usize,
    /// Plain least-squares cost `Σ ½‖rᵢ‖²` of the initial pose over all usable correspondences.
    pub initial_cost: f64,
    /// Robust cost of the final pose over the inliers.
    pub final_cost: f64,
    /// Robust cost after each completed iteration.
    pub cost_history: Vec<f64>,
    /// Why the solve stopped.
    pub termination_reason: TerminationReason,
    /// Number of input correspondences.
    pub num_correspondences: usize,
    /// Number of correspondences left in the inlier mask.
    pub num_inliers: usize,
    /// Number of candidate steps rejected and retried with more damping.
    pub num_rejected_steps: usize,
}

impl Summary {
    pub(crate) fn new(num_correspondences: usize, initial_cost: f64) -> Self {
        Self {
            iterations: 0,
            initial_cost,
            final_cost: initial_cost,
            cost_history: Vec::new(),
            termination_reason: TerminationReason::MaxIterationsReached,
            num_correspondences,
            num_inliers: num_correspondences,
            num_rejected_steps: 0,
        }
    }

    /// One-line report: iterations, initial cost, final cost and termination reason.
    pub fn brief_report(&self) -> String {
        format!(
            "Pose-only BA, Iterations: {}, Initial cost: {:.6e}, Final cost: {:.6e}, Termination: {}",
            self.iterations, self.initial_cost, self.final_cost, self.termination_reason
        )
    }

    /// Multi-line report including inliers and the per-iteration cost history.
    pub fn full_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Pose-only bundle adjustment report\n");
        report.push_str(&format!(
            "  correspondences   : {} ({} inliers, {} outliers)\n",
            self.num_correspondences,
            self.num_inliers,
            self.num_correspondences - self.num_inliers
        ));
        report.push_str(&format!("  iterations        : {}\n", self.iterations));
        report.push_str(&format!("  rejected steps    : {}\n", self.num_rejected_steps));
        report.push_str(&format!("  initial cost      : {:.6e}\n", self.initial_cost));
        report.push_str(&format!("  final cost        : {:.6e}\n", self.final_cost));
        report.push_str(&format!("  termination       : {}\n", self.termination_reason));
        for (i, cost) in self.cost_history.iter().enumerate() {
            report.push_str(&format!("  iter {:>4}         : {:.6e}\n", i + 1, cost));
        }
        report
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.brief_report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief_report_format() {
        let mut summary = Summary::new(10, 1234.5);
        summary.iterations = 3;
        summary.final_cost = 0.5;
        summary.termination_reason = TerminationReason::Converged;
        assert_eq!(
            summary.brief_report(),
            "Pose-only BA, Iterations: 3, Initial cost: 1.234500e3, Final cost: 5.000000e-1, Termination: CONVERGENCE"
        );
        assert_eq!(summary.to_string(), summary.brief_report());
    }

    #[test]
    fn test_full_report_lists_history() {
        let mut summary = Summary::new(4, 2.0);
        summary.cost_history = vec![1.0, 0.5];
        summary.iterations = 2;
        summary.num_inliers = 3;
        let report = summary.full_report();
        assert!(report.contains("4 (3 inliers, 1 outliers)"));
        assert!(report.contains("iter    2"));
        assert!(report.contains("MAX_ITERATIONS_REACHED"));
    }
}
