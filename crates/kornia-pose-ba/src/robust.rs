//! Robust loss functions and hard outlier classification.
//!
//! The two mechanisms are independent: a [`RobustLoss`] down-weights large residuals
//! but keeps them in the normal equations, while the [`OutlierClassifier`] removes a
//! correspondence entirely. Neither assumes anything about the other's threshold.

/// Trait for robust loss functions that scale residuals by weight.
///
/// Both methods take the squared residual norm `s = e²`.
pub trait RobustLoss: Send + Sync {
    /// Weight applied to the residual's contribution to the normal equations.
    fn weight(&self, squared_norm: f64) -> f64;

    /// Robustified cost `ρ(s)`, consistent with [`RobustLoss::weight`] (`ρ'(e) = w · e`).
    fn cost(&self, squared_norm: f64) -> f64;
}

/// Identity loss: weight always 1.0 (L2 baseline).
#[derive(Debug, Clone, Copy)]
pub struct IdentityLoss;

impl RobustLoss for IdentityLoss {
    fn weight(&self, _squared_norm: f64) -> f64 {
        1.0
    }

    fn cost(&self, squared_norm: f64) -> f64 {
        0.5 * squared_norm
    }
}

/// Huber loss: quadratic up to `threshold`, linear beyond.
///
/// A zero threshold gives zero weight to every non-zero residual.
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    /// Residual norm where the loss becomes linear.
    pub threshold: f64,
}

impl HuberLoss {
    /// Create a new Huber loss.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl RobustLoss for HuberLoss {
    fn weight(&self, squared_norm: f64) -> f64 {
        if squared_norm <= self.threshold * self.threshold {
            1.0
        } else {
            self.threshold / squared_norm.sqrt()
        }
    }

    fn cost(&self, squared_norm: f64) -> f64 {
        if squared_norm <= self.threshold * self.threshold {
            0.5 * squared_norm
        } else {
            self.threshold * (squared_norm.sqrt() - 0.5 * self.threshold)
        }
    }
}

/// Hard residual-norm threshold deciding inlier/outlier membership.
#[derive(Debug, Clone, Copy)]
pub struct OutlierClassifier {
    /// Residual norm above which a correspondence is an outlier.
    pub threshold: f64,
}

impl OutlierClassifier {
    /// Create a new classifier.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether a residual with the given squared norm is an outlier.
    #[inline]
    pub fn is_outlier(&self, squared_norm: f64) -> bool {
        squared_norm > self.threshold * self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_loss_always_one() {
        let loss = IdentityLoss;
        assert_eq!(loss.weight(0.0), 1.0);
        assert_eq!(loss.weight(100.0), 1.0);
        assert_eq!(loss.cost(4.0), 2.0);
    }

    #[test]
    fn test_huber_loss_weights() {
        let huber = HuberLoss::new(1.5);
        assert_eq!(huber.weight(0.0), 1.0);
        assert_eq!(huber.weight(1.5 * 1.5), 1.0); // at threshold
        assert_relative_eq!(huber.weight(9.0), 0.5); // e = 3
        assert!(huber.weight(1e12).is_finite());
    }

    #[test]
    fn test_huber_cost_is_continuous() {
        let huber = HuberLoss::new(2.0);
        let below = huber.cost(4.0 - 1e-9);
        let above = huber.cost(4.0 + 1e-9);
        assert_relative_eq!(below, above, epsilon = 1e-8);
        // linear regime: k * (e - k / 2)
        assert_relative_eq!(huber.cost(36.0), 2.0 * (6.0 - 1.0));
    }

    #[test]
    fn test_huber_weight_matches_cost_derivative() {
        let huber = HuberLoss::new(1.5);
        let h = 1e-6;
        for e in [0.5f64, 1.0, 2.0, 10.0] {
            let d_cost =
                (huber.cost((e + h) * (e + h)) - huber.cost((e - h) * (e - h))) / (2.0 * h);
            assert_relative_eq!(d_cost, huber.weight(e * e) * e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_huber_threshold() {
        let huber = HuberLoss::new(0.0);
        assert_eq!(huber.weight(0.0), 1.0);
        assert_eq!(huber.weight(1.0), 0.0);
    }

    #[test]
    fn test_outlier_classifier() {
        let classifier = OutlierClassifier::new(2.5);
        assert!(!classifier.is_outlier(0.0));
        assert!(!classifier.is_outlier(2.5 * 2.5));
        assert!(classifier.is_outlier(2.6 * 2.6));

        let disabled = OutlierClassifier::new(f64::INFINITY);
        assert!(!disabled.is_outlier(1e300));
    }
}
