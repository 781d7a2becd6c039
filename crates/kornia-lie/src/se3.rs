//! # SE(3) - The Special Euclidean Group in 3D
//!
//! Rigid body transformations `T = (R, t)` acting on points as `T · p = R p + t`.
//!
//! Tangent vectors are ordered **rotation first**: `δ = [ω; υ]` with `ω ∈ so(3)` and
//! `υ ∈ R³`. The exponential map is `Exp(δ) = (Exp(ω), Jl(ω) υ)`.

use glam::{DMat3, DMat4, DQuat, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::so3::SO3F64;

/// A 3D rigid body transformation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SE3F64 {
    /// Rotation part.
    pub r: SO3F64,
    /// Translation part.
    pub t: DVec3,
}

impl Default for SE3F64 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SE3F64 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        r: SO3F64::IDENTITY,
        t: DVec3::ZERO,
    };

    /// Create a transformation from its rotation and translation.
    #[inline]
    pub fn new(r: SO3F64, t: DVec3) -> Self {
        Self { r, t }
    }

    /// A pure translation.
    pub fn from_translation(t: DVec3) -> Self {
        Self {
            r: SO3F64::IDENTITY,
            t,
        }
    }

    /// Create a transformation from a rotation matrix and a translation.
    pub fn from_rotation_translation(rotation: &DMat3, t: DVec3) -> Self {
        Self {
            r: SO3F64::from_matrix(rotation),
            t,
        }
    }

    /// Create from `[qx, qy, qz, qw, tx, ty, tz]`.
    pub fn from_array(arr: [f64; 7]) -> Self {
        Self {
            r: SO3F64::new(DQuat::from_xyzw(arr[0], arr[1], arr[2], arr[3]).normalize()),
            t: DVec3::new(arr[4], arr[5], arr[6]),
        }
    }

    /// Serialize as `[qx, qy, qz, qw, tx, ty, tz]`.
    pub fn to_array(&self) -> [f64; 7] {
        let q = self.r.q;
        [q.x, q.y, q.z, q.w, self.t.x, self.t.y, self.t.z]
    }

    /// The rotation as a 3x3 matrix.
    pub fn rotation(&self) -> DMat3 {
        self.r.matrix()
    }

    /// The homogeneous 4x4 matrix.
    pub fn matrix(&self) -> DMat4 {
        let r = self.r.matrix();
        DMat4::from_cols(
            r.x_axis.extend(0.0),
            r.y_axis.extend(0.0),
            r.z_axis.extend(0.0),
            DVec4::new(self.t.x, self.t.y, self.t.z, 1.0),
        )
    }

    /// The inverse transformation.
    pub fn inverse(&self) -> Self {
        let r_inv = self.r.inverse();
        Self {
            r: r_inv,
            t: -(r_inv * self.t),
        }
    }

    /// Project the rotation back onto the group.
    pub fn normalize(&self) -> Self {
        Self {
            r: self.r.normalize(),
            t: self.t,
        }
    }

    /// Lie algebra -> Lie group, with `omega` the rotation and `upsilon` the translation part.
    pub fn exp(omega: DVec3, upsilon: DVec3) -> Self {
        Self {
            r: SO3F64::exp(omega),
            t: SO3F64::left_jacobian(omega) * upsilon,
        }
    }

    /// Exponential of a stacked tangent vector `[ωx, ωy, ωz, υx, υy, υz]`.
    pub fn exp_vec(delta: &[f64; 6]) -> Self {
        Self::exp(
            DVec3::new(delta[0], delta[1], delta[2]),
            DVec3::new(delta[3], delta[4], delta[5]),
        )
    }

    /// Lie group -> Lie algebra, returned as `(omega, upsilon)`.
    pub fn log(&self) -> (DVec3, DVec3) {
        let omega = self.r.log();
        let upsilon = SO3F64::left_jacobian_inverse(omega) * self.t;
        (omega, upsilon)
    }

    /// Right retraction `X ⊕ δ = X · Exp(δ)`.
    #[inline]
    pub fn rplus(&self, delta: &[f64; 6]) -> Self {
        (*self * Self::exp_vec(delta)).normalize()
    }

    /// Right difference `Y ⊖ X = Log(X⁻¹ · Y)` stacked as `[ω; υ]`, with `self = X`.
    pub fn rminus(&self, other: &Self) -> [f64; 6] {
        let (omega, upsilon) = (self.inverse() * *other).log();
        [omega.x, omega.y, omega.z, upsilon.x, upsilon.y, upsilon.z]
    }

    /// Apply the transformation to a point.
    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.r * p + self.t
    }
}

impl std::ops::Mul<SE3F64> for SE3F64 {
    type Output = SE3F64;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r * rhs.r,
            t: self.t + self.r * rhs.t,
        }
    }
}

impl std::ops::MulAssign<SE3F64> for SE3F64 {
    #[inline]
    fn mul_assign(&mut self, rhs: SE3F64) {
        *self = *self * rhs;
    }
}

impl std::ops::Mul<DVec3> for SE3F64 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> Self::Output {
        self.transform_point(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_identity() {
        let p = DVec3::new(1.0, -2.0, 3.0);
        assert_eq!(SE3F64::IDENTITY * p, p);
    }

    #[test]
    fn test_inverse() {
        let pose = SE3F64::new(
            SO3F64::exp(DVec3::new(0.2, -0.1, 0.4)),
            DVec3::new(0.4, 0.012, -0.5),
        );
        let p = DVec3::new(0.3, 1.2, 4.0);
        let back = pose.inverse() * (pose * p);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_log_roundtrip() {
        let omega = DVec3::new(0.1, -0.3, 0.25);
        let upsilon = DVec3::new(-0.2, -0.5, 0.7);
        let (w, v) = SE3F64::exp(omega, upsilon).log();
        assert_relative_eq!((w - omega).length(), 0.0, epsilon = 1e-12);
        assert_relative_eq!((v - upsilon).length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exp_pure_translation() {
        let pose = SE3F64::exp(DVec3::ZERO, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.t, DVec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(pose.r.angle(), 0.0);
    }

    #[test]
    fn test_rplus_rminus_roundtrip() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = SE3F64::new(SO3F64::from_random(&mut rng), DVec3::new(0.1, 0.2, 0.3));
        let delta = [0.05, -0.02, 0.1, 0.3, -0.1, 0.2];
        let y = x.rplus(&delta);
        let diff = x.rminus(&y);
        for (a, b) in diff.iter().zip(delta.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_matrix_and_array() {
        let pose = SE3F64::new(
            SO3F64::from_axis_angle(DVec3::Y, -0.3),
            DVec3::new(0.4, 0.012, -0.5),
        );
        let m = pose.matrix();
        let p = DVec3::new(1.0, 2.0, 3.0);
        let hp = m * p.extend(1.0);
        let expected = pose * p;
        assert_relative_eq!(hp.x, expected.x, epsilon = 1e-12);
        assert_relative_eq!(hp.y, expected.y, epsilon = 1e-12);
        assert_relative_eq!(hp.z, expected.z, epsilon = 1e-12);
        assert_relative_eq!(hp.w, 1.0);

        let restored = SE3F64::from_array(pose.to_array());
        assert!(restored.r.angle_to(&pose.r) < 1e-12);
        assert_eq!(restored.t, pose.t);
    }
}
