//! Reprojection residuals and their Jacobians with respect to a local pose increment.
//!
//! The pose `T_wc` places the camera in the world, so a world point is seen at
//! `X_c = T_wc⁻¹ · X_w`. The pose is updated as `T_wc ← T_wc ∘ Exp(δ)` with
//! `δ = [ω; υ]`, which to first order moves the camera-frame point by
//!
//! ```text
//! X_c(δ) ≈ X_c + [X_c]× ω − υ
//! ```
//!
//! so the 2x6 Jacobian of the residual is `∂π/∂X_c · [ [X_c]× | −I ]`.

use glam::{DVec2, DVec3};
use kornia_lie::SE3F64;

use crate::camera::PinholeIntrinsics;

/// Residual and Jacobian of one correspondence.
#[derive(Debug, Clone, Copy)]
pub struct Linearization {
    /// Projected minus observed pixel.
    pub residual: DVec2,
    /// Rows of the 2x6 Jacobian, columns ordered `[ωx, ωy, ωz, υx, υy, υz]`.
    pub jacobian: [[f64; 6]; 2],
}

impl Linearization {
    /// Squared norm of the residual.
    #[inline]
    pub fn squared_norm(&self) -> f64 {
        self.residual.length_squared()
    }
}

/// Reprojection residual of `point_world` seen from `camera_from_world`.
///
/// Returns `None` when the point has non-positive depth.
#[inline]
pub fn reprojection_residual(
    camera_from_world: &SE3F64,
    intrinsics: &PinholeIntrinsics,
    point_world: DVec3,
    pixel: DVec2,
) -> Option<DVec2> {
    let pc = *camera_from_world * point_world;
    intrinsics.project(pc).map(|uv| uv - pixel)
}

/// Residual and analytic Jacobian of one correspondence.
///
/// Returns `None` when the point has non-positive depth.
pub fn linearize(
    camera_from_world: &SE3F64,
    intrinsics: &PinholeIntrinsics,
    point_world: DVec3,
    pixel: DVec2,
) -> Option<Linearization> {
    let pc = *camera_from_world * point_world;
    let uv = intrinsics.project(pc)?;
    let jp = intrinsics.projection_jacobian(pc)?;

    // row a of ∂π/∂X_c gives aᵀ [X_c]× ω = (a × X_c)ᵀ ω
    let row = |a: [f64; 3]| {
        let a = DVec3::from_array(a);
        let rot = a.cross(pc);
        [rot.x, rot.y, rot.z, -a.x, -a.y, -a.z]
    };

    Some(Linearization {
        residual: uv - pixel,
        jacobian: [row(jp[0]), row(jp[1])],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kornia_lie::SO3F64;

    fn setup() -> (SE3F64, PinholeIntrinsics) {
        let world_from_camera = SE3F64::new(
            SO3F64::from_axis_angle(DVec3::Y, -0.3),
            DVec3::new(0.4, 0.012, -0.5),
        );
        let intrinsics = PinholeIntrinsics::new(338.0, 338.0, 320.0, 240.0);
        (world_from_camera, intrinsics)
    }

    #[test]
    fn test_zero_residual_at_true_pose() {
        let (world_from_camera, intrinsics) = setup();
        let camera_from_world = world_from_camera.inverse();
        let pw = DVec3::new(0.7, -0.3, 3.0);
        let pixel = intrinsics.project(camera_from_world * pw).unwrap();
        let r = reprojection_residual(&camera_from_world, &intrinsics, pw, pixel).unwrap();
        assert_relative_eq!(r.length(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_depth() {
        let (world_from_camera, intrinsics) = setup();
        let camera_from_world = world_from_camera.inverse();
        // behind the camera
        let pw = world_from_camera * DVec3::new(0.0, 0.0, -2.0);
        assert!(linearize(&camera_from_world, &intrinsics, pw, DVec2::ZERO).is_none());
        assert!(reprojection_residual(&camera_from_world, &intrinsics, pw, DVec2::ZERO).is_none());
    }

    #[test]
    fn test_jacobian_matches_manifold_finite_differences() {
        let (world_from_camera, intrinsics) = setup();
        let pw = DVec3::new(-0.8, 0.6, 2.7);
        let pixel = DVec2::new(100.0, 200.0);

        let lin = linearize(&world_from_camera.inverse(), &intrinsics, pw, pixel).unwrap();

        let h = 1e-7;
        for k in 0..6 {
            let mut delta = [0.0; 6];
            delta[k] = h;
            let plus = world_from_camera.rplus(&delta).inverse();
            delta[k] = -h;
            let minus = world_from_camera.rplus(&delta).inverse();

            let r_plus = reprojection_residual(&plus, &intrinsics, pw, pixel).unwrap();
            let r_minus = reprojection_residual(&minus, &intrinsics, pw, pixel).unwrap();
            let num = (r_plus - r_minus) / (2.0 * h);

            assert_relative_eq!(lin.jacobian[0][k], num.x, epsilon = 1e-3, max_relative = 1e-5);
            assert_relative_eq!(lin.jacobian[1][k], num.y, epsilon = 1e-3, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_translation_block_is_negated_projection_jacobian() {
        let (world_from_camera, intrinsics) = setup();
        let camera_from_world = world_from_camera.inverse();
        let pw = DVec3::new(0.3, -0.2, 2.2);
        let jp = intrinsics
            .projection_jacobian(camera_from_world * pw)
            .unwrap();
        let lin = linearize(&camera_from_world, &intrinsics, pw, DVec2::ZERO).unwrap();
        for (row, a) in lin.jacobian.iter().zip(jp.iter()) {
            assert_relative_eq!(row[3], -a[0]);
            assert_relative_eq!(row[4], -a[1]);
            assert_relative_eq!(row[5], -a[2]);
        }
    }
}
