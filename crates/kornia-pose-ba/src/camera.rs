//! Pinhole camera model used by the reprojection residuals.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::PoseOptimizerError;

/// Points closer to the image plane than this are considered degenerate.
pub const MIN_DEPTH: f64 = f64::EPSILON;

/// Represents the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    /// Focal length in x direction
    pub fx: f64,
    /// Focal length in y direction
    pub fy: f64,
    /// Principal point x coordinate
    pub cx: f64,
    /// Principal point y coordinate
    pub cy: f64,
}

impl PinholeIntrinsics {
    /// Create camera intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Create camera intrinsics from a 3x3 intrinsics matrix (row major).
    pub fn from_matrix(k: &[[f64; 3]; 3]) -> Result<Self, PoseOptimizerError> {
        if k[0][1] != 0.0 || k[1][0] != 0.0 || k[2][0] != 0.0 || k[2][1] != 0.0 || k[2][2] != 1.0
        {
            return Err(PoseOptimizerError::InvalidIntrinsics(
                "Intrinsics matrix must have form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]"
                    .to_string(),
            ));
        }

        let intrinsics = Self::new(k[0][0], k[1][1], k[0][2], k[1][2]);
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// Convert to a 3x3 intrinsics matrix (row major).
    pub fn to_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Check that the parameters describe a usable projection.
    pub fn validate(&self) -> Result<(), PoseOptimizerError> {
        if !self.fx.is_finite() || !self.fy.is_finite() || self.fx == 0.0 || self.fy == 0.0 {
            return Err(PoseOptimizerError::InvalidIntrinsics(format!(
                "focal lengths must be finite and non-zero, got fx={} fy={}",
                self.fx, self.fy
            )));
        }
        if !self.cx.is_finite() || !self.cy.is_finite() {
            return Err(PoseOptimizerError::InvalidIntrinsics(format!(
                "principal point must be finite, got cx={} cy={}",
                self.cx, self.cy
            )));
        }
        Ok(())
    }

    /// Project a camera-frame point to pixels.
    ///
    /// Returns `None` when the point is not in front of the camera.
    #[inline]
    pub fn project(&self, pc: DVec3) -> Option<DVec2> {
        if pc.z <= MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / pc.z;
        Some(DVec2::new(
            self.fx * pc.x * inv_z + self.cx,
            self.fy * pc.y * inv_z + self.cy,
        ))
    }

    /// Derivative of the projection with respect to the camera-frame point.
    ///
    /// Returns the 2x3 matrix as rows, or `None` for degenerate depth.
    #[inline]
    pub fn projection_jacobian(&self, pc: DVec3) -> Option<[[f64; 3]; 2]> {
        if pc.z <= MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / pc.z;
        let inv_z2 = inv_z * inv_z;
        Some([
            [self.fx * inv_z, 0.0, -self.fx * pc.x * inv_z2],
            [0.0, self.fy * inv_z, -self.fy * pc.y * inv_z2],
        ])
    }
}
