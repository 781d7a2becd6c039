//! Synthetic 3D-2D correspondences for testing and benchmarking the optimizer.
//!
//! World points are drawn uniformly in a box in front of the camera, projected through a
//! known camera pose and perturbed with Gaussian pixel noise. All randomness comes from a
//! seeded [`StdRng`], so a configuration always produces the same scene.

use glam::{DVec2, DVec3};
use kornia_lie::{SE3F64, SO3F64};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::camera::PinholeIntrinsics;
use crate::error::PoseOptimizerError;

/// Parameters of a synthetic scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Number of correspondences.
    pub num_points: usize,
    /// Points are drawn with `x ∈ [−x_extent, x_extent]`.
    pub x_extent: f64,
    /// Points are drawn with `y ∈ [−y_extent, y_extent]`.
    pub y_extent: f64,
    /// Smallest world `z` of a point.
    pub z_min: f64,
    /// Points are drawn with `z ∈ [z_min, z_min + z_range]`.
    pub z_range: f64,
    /// Standard deviation of the pixel noise.
    pub pixel_noise_std: f64,
    /// Seed of the random generator.
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_points: 1000,
            x_extent: 1.7,
            y_extent: 1.3,
            z_min: 1.2,
            z_range: 5.0,
            pixel_noise_std: 0.0,
            seed: 42,
        }
    }
}

/// Generated correspondences together with the ground truth used to create them.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// World points.
    pub points_world: Vec<DVec3>,
    /// Observed (noisy) pixels.
    pub pixels: Vec<DVec2>,
    /// Noise-free projections of the world points.
    pub true_pixels: Vec<DVec2>,
    /// Camera pose in the world frame used for the projection.
    pub pose: SE3F64,
    /// Camera intrinsics used for the projection.
    pub intrinsics: PinholeIntrinsics,
}

/// The 640x480 camera used by the reference scenario.
pub fn reference_intrinsics() -> PinholeIntrinsics {
    PinholeIntrinsics::new(338.0, 338.0, 320.0, 240.0)
}

/// True camera pose of the reference scenario: rotated by −0.3 rad around y and moved
/// to `(0.4, 0.012, −0.5)`.
pub fn reference_pose() -> SE3F64 {
    SE3F64::new(
        SO3F64::from_axis_angle(DVec3::Y, -0.3),
        DVec3::new(0.4, 0.012, -0.5),
    )
}

/// Initial guess of the reference scenario: identity rotation at `(−0.2, −0.5, 0)`.
pub fn reference_initial_guess() -> SE3F64 {
    SE3F64::from_translation(DVec3::new(-0.2, -0.5, 0.0))
}

/// Generate a scene seen by a camera at `pose`.
///
/// # Errors
///
/// Fails on invalid intrinsics, on a negative or NaN noise level, and when a generated
/// point lands behind the camera.
pub fn generate_scene(
    config: &SceneConfig,
    pose: &SE3F64,
    intrinsics: &PinholeIntrinsics,
) -> Result<SyntheticScene, PoseOptimizerError> {
    intrinsics.validate()?;
    if !(config.pixel_noise_std >= 0.0) {
        return Err(PoseOptimizerError::InvalidThreshold {
            name: "pixel_noise_std",
            value: config.pixel_noise_std,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let camera_from_world = pose.inverse();

    let mut points_world = Vec::with_capacity(config.num_points);
    let mut true_pixels = Vec::with_capacity(config.num_points);
    for _ in 0..config.num_points {
        let point = DVec3::new(
            config.x_extent * (2.0 * rng.random::<f64>() - 1.0),
            config.y_extent * (2.0 * rng.random::<f64>() - 1.0),
            config.z_min + config.z_range * rng.random::<f64>(),
        );
        let pixel = intrinsics.project(camera_from_world * point).ok_or_else(|| {
            PoseOptimizerError::InvalidIntrinsics(format!(
                "generated point {point} is behind the camera"
            ))
        })?;
        points_world.push(point);
        true_pixels.push(pixel);
    }

    let pixels = true_pixels
        .iter()
        .map(|&pixel| pixel + gaussian_noise(&mut rng, config.pixel_noise_std))
        .collect();

    Ok(SyntheticScene {
        points_world,
        pixels,
        true_pixels,
        pose: *pose,
        intrinsics: *intrinsics,
    })
}

fn gaussian_noise<R: Rng + ?Sized>(rng: &mut R, std: f64) -> DVec2 {
    if std == 0.0 {
        return DVec2::ZERO;
    }
    let nx: f64 = rng.sample(StandardNormal);
    let ny: f64 = rng.sample(StandardNormal);
    DVec2::new(nx, ny) * std
}

/// Pick `fraction` of `num_points` distinct indices, sorted.
pub fn choose_outlier_indices<R: Rng + ?Sized>(
    rng: &mut R,
    num_points: usize,
    fraction: f64,
) -> Vec<usize> {
    let amount = ((num_points as f64 * fraction.clamp(0.0, 1.0)).round() as usize).min(num_points);
    let mut indices = rand::seq::index::sample(rng, num_points, amount).into_vec();
    indices.sort_unstable();
    indices
}

/// Move the pixels at `indices` by `radius` pixels in a random direction.
///
/// Indices out of range are ignored.
pub fn inject_outliers<R: Rng + ?Sized>(
    rng: &mut R,
    pixels: &mut [DVec2],
    indices: &[usize],
    radius: f64,
) {
    for &index in indices {
        if let Some(pixel) = pixels.get_mut(index) {
            let angle = rng.random::<f64>() * std::f64::consts::TAU;
            *pixel += DVec2::new(angle.cos(), angle.sin()) * radius;
        }
    }
}

/// Rotation angle (radians) and translation distance between two poses.
pub fn pose_error(a: &SE3F64, b: &SE3F64) -> (f64, f64) {
    (a.r.angle_to(&b.r), (a.t - b.t).length())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generate_noiseless() -> Result<(), PoseOptimizerError> {
        let config = SceneConfig {
            num_points: 200,
            ..Default::default()
        };
        let scene = generate_scene(&config, &reference_pose(), &reference_intrinsics())?;
        assert_eq!(scene.points_world.len(), 200);
        assert_eq!(scene.pixels, scene.true_pixels);
        for p in &scene.points_world {
            assert!(p.x.abs() <= 1.7 && p.y.abs() <= 1.3);
            assert!(p.z >= 1.2 && p.z <= 6.2);
        }
        Ok(())
    }

    #[test]
    fn test_generate_is_deterministic() -> Result<(), PoseOptimizerError> {
        let config = SceneConfig {
            num_points: 50,
            pixel_noise_std: 1.0,
            ..Default::default()
        };
        let a = generate_scene(&config, &reference_pose(), &reference_intrinsics())?;
        let b = generate_scene(&config, &reference_pose(), &reference_intrinsics())?;
        assert_eq!(a.points_world, b.points_world);
        assert_eq!(a.pixels, b.pixels);
        assert_ne!(a.pixels, a.true_pixels);
        Ok(())
    }

    #[test]
    fn test_negative_noise_rejected() {
        let config = SceneConfig {
            pixel_noise_std: -1.0,
            ..Default::default()
        };
        assert!(generate_scene(&config, &reference_pose(), &reference_intrinsics()).is_err());
    }

    #[test]
    fn test_inject_outliers() {
        let mut rng = StdRng::seed_from_u64(7);
        let original = vec![DVec2::new(100.0, 100.0); 20];
        let mut pixels = original.clone();
        let indices = choose_outlier_indices(&mut rng, pixels.len(), 0.25);
        assert_eq!(indices.len(), 5);
        inject_outliers(&mut rng, &mut pixels, &indices, 40.0);
        for (i, (p, o)) in pixels.iter().zip(&original).enumerate() {
            let moved = (*p - *o).length();
            if indices.contains(&i) {
                assert_relative_eq!(moved, 40.0, epsilon = 1e-9);
            } else {
                assert_eq!(moved, 0.0);
            }
        }
    }

    #[test]
    fn test_pose_error() {
        let a = reference_pose();
        let (rot, trans) = pose_error(&a, &a);
        assert_relative_eq!(rot, 0.0, epsilon = 1e-12);
        assert_relative_eq!(trans, 0.0);

        let (rot, trans) = pose_error(&reference_initial_guess(), &a);
        assert_relative_eq!(rot, 0.3, epsilon = 1e-12);
        assert_relative_eq!(trans, (0.6f64 * 0.6 + 0.512 * 0.512 + 0.25).sqrt(), epsilon = 1e-12);
    }
}
