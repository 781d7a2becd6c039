//! Weighted normal equations of the 6-DoF pose problem and their Cholesky solve.

use crate::residual::Linearization;

/// Pivots below this fraction of the largest diagonal entry are treated as zero.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-12;

/// Accumulated `H = Σ wᵢ JᵢᵀJᵢ`, `g = Σ wᵢ Jᵢᵀrᵢ` and robust cost over the active set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalEquations {
    /// Approximate Hessian (upper triangle is authoritative until [`Self::hessian`]).
    h: [[f64; 6]; 6],
    /// Weighted gradient.
    pub gradient: [f64; 6],
    /// Robust cost of the accumulated correspondences.
    pub cost: f64,
    /// Number of correspondences that contributed.
    pub num_active: usize,
}

impl NormalEquations {
    /// Empty system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one weighted correspondence.
    #[inline]
    pub fn add(&mut self, lin: &Linearization, weight: f64, cost: f64) {
        let r = [lin.residual.x, lin.residual.y];
        for (row, &ri) in lin.jacobian.iter().zip(r.iter()) {
            for a in 0..6 {
                let wja = weight * row[a];
                self.gradient[a] += wja * ri;
                for b in a..6 {
                    self.h[a][b] += wja * row[b];
                }
            }
        }
        self.cost += cost;
        self.num_active += 1;
    }

    /// Add the partial sums of another system.
    pub fn merge(&mut self, other: &NormalEquations) {
        for a in 0..6 {
            self.gradient[a] += other.gradient[a];
            for b in a..6 {
                self.h[a][b] += other.h[a][b];
            }
        }
        self.cost += other.cost;
        self.num_active += other.num_active;
    }

    /// The full symmetric approximate Hessian.
    pub fn hessian(&self) -> [[f64; 6]; 6] {
        let mut h = self.h;
        for a in 0..6 {
            for b in 0..a {
                h[a][b] = h[b][a];
            }
        }
        h
    }

    /// Solve `(H + λ·diag(H)) δ = −g`.
    ///
    /// Returns `None` if the damped system is not positive definite.
    pub fn solve(&self, lambda: f64) -> Option<[f64; 6]> {
        let mut h = self.hessian();
        for (d, row) in h.iter_mut().enumerate() {
            row[d] *= 1.0 + lambda;
        }
        let l = cholesky_6x6(&h)?;
        let rhs = self.gradient.map(|g| -g);
        let delta = cholesky_solve_6x6(&l, &rhs);
        delta.iter().all(|d| d.is_finite()).then_some(delta)
    }
}

/// Computes the Cholesky decomposition of a symmetric positive definite 6x6 matrix.
///
/// Returns a lower triangular matrix L such that A = L * L^T, or `None` if the matrix is
/// not positive definite (including pivots negligible against the largest diagonal entry).
pub fn cholesky_6x6(a: &[[f64; 6]; 6]) -> Option<[[f64; 6]; 6]> {
    let max_diag = (0..6).map(|i| a[i][i]).fold(0.0f64, f64::max);
    if !(max_diag > 0.0 && max_diag.is_finite()) {
        return None;
    }
    let tolerance = RELATIVE_PIVOT_TOLERANCE * max_diag;

    let mut l = [[0.0f64; 6]; 6];
    for j in 0..6 {
        let mut diag = a[j][j];
        for k in 0..j {
            diag -= l[j][k] * l[j][k];
        }
        if !(diag > tolerance) {
            return None;
        }
        let ljj = diag.sqrt();
        l[j][j] = ljj;

        for i in (j + 1)..6 {
            let mut s = a[i][j];
            for k in 0..j {
                s -= l[i][k] * l[j][k];
            }
            l[i][j] = s / ljj;
        }
    }
    Some(l)
}

/// Solves A x = b given the Cholesky factor L of A, by forward and back substitution.
pub fn cholesky_solve_6x6(l: &[[f64; 6]; 6], b: &[f64; 6]) -> [f64; 6] {
    // L y = b
    let mut y = [0.0f64; 6];
    for i in 0..6 {
        let mut s = b[i];
        for k in 0..i {
            s -= l[i][k] * y[k];
        }
        y[i] = s / l[i][i];
    }

    // L^T x = y
    let mut x = [0.0f64; 6];
    for i in (0..6).rev() {
        let mut s = y[i];
        for k in (i + 1)..6 {
            s -= l[k][i] * x[k];
        }
        x[i] = s / l[i][i];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec2;

    fn spd_matrix() -> [[f64; 6]; 6] {
        // A = B^T B + I for a fixed B
        let b = [
            [1.0, 2.0, 0.0, -1.0, 0.5, 0.0],
            [0.0, 1.0, 3.0, 0.0, -2.0, 1.0],
            [2.0, 0.0, 1.0, 1.0, 0.0, -1.0],
            [0.5, -1.0, 0.0, 2.0, 1.0, 0.0],
            [0.0, 0.0, -1.0, 0.5, 3.0, 2.0],
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        ];
        let mut a = [[0.0; 6]; 6];
        for i in 0..6 {
            for j in 0..6 {
                for row in &b {
                    a[i][j] += row[i] * row[j];
                }
            }
            a[i][i] += 1.0;
        }
        a
    }

    #[test]
    fn test_cholesky_6x6_reconstructs() {
        let a = spd_matrix();
        let l = cholesky_6x6(&a).unwrap();
        for i in 0..6 {
            for j in 0..6 {
                let llt: f64 = (0..6).map(|k| l[i][k] * l[j][k]).sum();
                assert_relative_eq!(llt, a[i][j], epsilon = 1e-10);
            }
            for j in (i + 1)..6 {
                assert_eq!(l[i][j], 0.0);
            }
        }
    }

    #[test]
    fn test_cholesky_solve_6x6() {
        let a = spd_matrix();
        let x_true = [1.0, -2.0, 0.5, 3.0, 0.0, -1.5];
        let mut b = [0.0; 6];
        for i in 0..6 {
            b[i] = (0..6).map(|j| a[i][j] * x_true[j]).sum();
        }
        let l = cholesky_6x6(&a).unwrap();
        let x = cholesky_solve_6x6(&l, &b);
        for (xi, ti) in x.iter().zip(x_true.iter()) {
            assert_relative_eq!(xi, ti, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cholesky_rejects_singular() {
        let mut a = spd_matrix();
        // make the last row/column a copy of the first
        for i in 0..6 {
            a[i][5] = a[i][0];
            a[5][i] = a[0][i];
        }
        a[5][5] = a[0][0];
        assert!(cholesky_6x6(&a).is_none());
        assert!(cholesky_6x6(&[[0.0; 6]; 6]).is_none());
    }

    #[test]
    fn test_rank_deficient_system_is_singular() {
        // two correspondences give four equations for six unknowns
        let mut system = NormalEquations::new();
        let lin = Linearization {
            residual: DVec2::new(1.0, -1.0),
            jacobian: [
                [1.0, 0.0, 2.0, 0.0, 1.0, 0.0],
                [0.0, 1.0, 0.0, 3.0, 0.0, 1.0],
            ],
        };
        system.add(&lin, 1.0, 1.0);
        system.add(&lin, 0.5, 0.5);
        assert_eq!(system.num_active, 2);
        assert!(system.solve(0.0).is_none());
    }

    #[test]
    fn test_merge_matches_sequential() {
        let lins = [
            Linearization {
                residual: DVec2::new(0.5, 2.0),
                jacobian: [
                    [1.0, 0.5, 2.0, -1.0, 1.0, 0.0],
                    [0.0, 1.0, -0.5, 3.0, 0.0, 1.0],
                ],
            },
            Linearization {
                residual: DVec2::new(-1.0, 0.25),
                jacobian: [
                    [0.0, 2.0, 1.0, 1.0, -1.0, 4.0],
                    [3.0, 0.0, 0.5, 0.0, 2.0, -1.0],
                ],
            },
        ];
        let mut sequential = NormalEquations::new();
        let mut first = NormalEquations::new();
        let mut second = NormalEquations::new();
        sequential.add(&lins[0], 1.0, 2.0);
        sequential.add(&lins[1], 0.3, 1.0);
        first.add(&lins[0], 1.0, 2.0);
        second.add(&lins[1], 0.3, 1.0);
        first.merge(&second);

        let (merged_h, sequential_h) = (first.hessian(), sequential.hessian());
        for i in 0..6 {
            assert_relative_eq!(first.gradient[i], sequential.gradient[i], epsilon = 1e-12);
            for j in 0..6 {
                assert_relative_eq!(merged_h[i][j], sequential_h[i][j], epsilon = 1e-12);
                assert_eq!(merged_h[i][j], merged_h[j][i]);
            }
        }
        assert_relative_eq!(first.cost, sequential.cost);
        assert_eq!(first.num_active, 2);
    }
}
