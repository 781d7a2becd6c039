//! # SO(3) - The Special Orthogonal Group in 3D
//!
//! SO(3) is the group of 3D rotations: 3×3 orthogonal matrices with determinant +1.
//!
//! [`SO3F64`] stores rotations as unit quaternions. Note that `q` and `-q` represent the
//! same rotation, so comparisons must go through [`SO3F64::angle_to`] or the matrix form.
//!
//! ## The exp/log maps
//!
//! A vector `v ∈ R³` of the Lie algebra **so(3)** represents an axis-angle rotation:
//! the direction is the rotation axis and the magnitude is the angle in radians.
//!
//! - `exp(v)`: axis-angle vector → unit quaternion `q = (cos(θ/2), sin(θ/2) · axis)`.
//! - `log()`: unit quaternion → axis-angle vector, with θ ∈ [0, π].
//!
//! Small angles (θ < 1e-10) go through Taylor expansions in both maps and in the Jacobians.

use glam::{DMat3, DQuat, DVec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

const SMALL_ANGLE_EPSILON: f64 = 1.0e-10;

/// A 3D rotation, stored as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SO3F64 {
    /// The unit quaternion of the rotation.
    pub q: DQuat,
}

impl Default for SO3F64 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SO3F64 {
    /// The identity rotation.
    pub const IDENTITY: Self = Self {
        q: DQuat::IDENTITY,
    };

    /// Create a new rotation from a quaternion.
    /// NOTE: quaternion should be normalized
    #[inline]
    pub fn new(q: DQuat) -> Self {
        Self { q }
    }

    /// Create a rotation from a rotation matrix.
    pub fn from_matrix(mat: &DMat3) -> Self {
        Self {
            q: DQuat::from_mat3(mat).normalize(),
        }
    }

    /// Create a rotation of `angle` radians around `axis`.
    ///
    /// The axis does not need to be normalized.
    pub fn from_axis_angle(axis: DVec3, angle: f64) -> Self {
        Self::exp(axis.normalize_or_zero() * angle)
    }

    /// Draw a uniformly distributed rotation (Shoemake method).
    pub fn from_random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let r1: f64 = rng.random();
        let r2: f64 = rng.random();
        let r3: f64 = rng.random();

        let one_minus_r1_sqrt = (1.0 - r1).sqrt();
        let r1_sqrt = r1.sqrt();
        let two_pi = 2.0 * std::f64::consts::PI;

        let w = one_minus_r1_sqrt * (two_pi * r2).cos();
        let x = one_minus_r1_sqrt * (two_pi * r2).sin();
        let y = r1_sqrt * (two_pi * r3).cos();
        let z = r1_sqrt * (two_pi * r3).sin();

        Self {
            q: DQuat::from_xyzw(x, y, z, w).normalize(),
        }
    }

    /// Right retraction `X ⊕ τ = X · Exp(τ)`.
    #[inline]
    pub fn rplus(&self, tau: DVec3) -> Self {
        *self * SO3F64::exp(tau)
    }

    /// Right difference `Y ⊖ X = Log(X⁻¹ · Y)` with `self = X`.
    #[inline]
    pub fn rminus(&self, other: &Self) -> DVec3 {
        (self.inverse() * *other).log()
    }

    /// The 3x3 rotation matrix.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_quat(self.q)
    }

    /// The adjoint representation, equal to the rotation matrix for SO(3).
    pub fn adjoint(&self) -> DMat3 {
        self.matrix()
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Self {
        Self {
            q: self.q.conjugate(),
        }
    }

    /// Project the quaternion back onto the unit sphere.
    pub fn normalize(&self) -> Self {
        Self {
            q: self.q.normalize(),
        }
    }

    /// Rotation angle in radians, in `[0, π]`.
    pub fn angle(&self) -> f64 {
        self.log().length()
    }

    /// Angle in radians of the relative rotation between `self` and `other`.
    pub fn angle_to(&self, other: &Self) -> f64 {
        self.rminus(other).length()
    }

    /// Lie algebra -> Lie group
    pub fn exp(v: DVec3) -> Self {
        let theta_sq = v.dot(v);
        let theta = theta_sq.sqrt();

        let (w, b) = if theta < SMALL_ANGLE_EPSILON {
            // taylor series of cos(x/2) and sin(x/2)/x around 0
            (1.0 - theta_sq / 8.0, 0.5 - theta_sq / 48.0)
        } else {
            let theta_half = 0.5 * theta;
            (theta_half.cos(), theta_half.sin() / theta)
        };

        let xyz = b * v;
        Self {
            q: DQuat::from_xyzw(xyz.x, xyz.y, xyz.z, w),
        }
    }

    /// Lie group -> Lie algebra
    pub fn log(&self) -> DVec3 {
        let mut w = self.q.w;
        let mut vec = DVec3::new(self.q.x, self.q.y, self.q.z);

        // shortest path: pick the quaternion on the w >= 0 hemisphere
        if w < 0.0 {
            w = -w;
            vec = -vec;
        }

        let sin_half_theta = vec.length();
        if sin_half_theta > SMALL_ANGLE_EPSILON {
            let half_theta = sin_half_theta.atan2(w);
            vec * (2.0 * half_theta / sin_half_theta)
        } else {
            vec * (2.0 / w)
        }
    }

    /// Vector space -> Lie algebra
    pub fn hat(v: DVec3) -> DMat3 {
        let (a, b, c) = (v.x, v.y, v.z);
        DMat3::from_cols_array(&[0.0, c, -b, -c, 0.0, a, b, -a, 0.0])
    }

    /// Lie algebra -> vector space
    pub fn vee(omega: DMat3) -> DVec3 {
        DVec3::new(omega.y_axis.z, omega.z_axis.x, omega.x_axis.y)
    }

    /// Left Jacobian of the exponential map.
    pub fn left_jacobian(v: DVec3) -> DMat3 {
        let skew = Self::hat(v);
        let theta_sq = v.dot(v);
        let theta = theta_sq.sqrt();

        if theta < SMALL_ANGLE_EPSILON {
            return DMat3::IDENTITY + 0.5 * skew + (1.0 / 6.0) * (skew * skew);
        }

        DMat3::IDENTITY
            + ((1.0 - theta.cos()) / theta_sq) * skew
            + ((theta - theta.sin()) / (theta_sq * theta)) * (skew * skew)
    }

    /// Inverse of [`SO3F64::left_jacobian`].
    pub fn left_jacobian_inverse(v: DVec3) -> DMat3 {
        let skew = Self::hat(v);
        let theta_sq = v.dot(v);
        let theta = theta_sq.sqrt();

        if theta < SMALL_ANGLE_EPSILON {
            return DMat3::IDENTITY - 0.5 * skew + (1.0 / 12.0) * (skew * skew);
        }

        let half_theta = 0.5 * theta;
        let coeff = (1.0 - half_theta * half_theta.cos() / half_theta.sin()) / theta_sq;
        DMat3::IDENTITY - 0.5 * skew + coeff * (skew * skew)
    }

    /// Right Jacobian of the exponential map, `Jr(v) = Jl(-v)`.
    pub fn right_jacobian(v: DVec3) -> DMat3 {
        Self::left_jacobian(-v)
    }
}

impl std::ops::Mul<SO3F64> for SO3F64 {
    type Output = SO3F64;

    fn mul(self, rhs: Self) -> Self::Output {
        Self { q: self.q * rhs.q }
    }
}

impl std::ops::MulAssign<SO3F64> for SO3F64 {
    #[inline]
    fn mul_assign(&mut self, rhs: SO3F64) {
        *self = *self * rhs;
    }
}

impl std::ops::Mul<DVec3> for SO3F64 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> Self::Output {
        self.q * rhs
    }
}
