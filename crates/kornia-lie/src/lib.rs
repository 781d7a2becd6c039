#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Kornia Lie Groups
//!
//! Double precision Lie groups for optimization on the rigid-transform manifold.
//!
//! ## Supported Groups
//!
//! - **SO(3)**: 3D rotation group, stored as a unit quaternion
//! - **SE(3)**: 3D rigid body transformations (rotation + translation)
//!
//! ## Example
//!
//! ```rust
//! use glam::DVec3;
//! use kornia_lie::{SE3F64, SO3F64};
//!
//! // a quarter turn around z followed by a translation along x
//! let rotation = SO3F64::exp(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
//! let pose = SE3F64::new(rotation, DVec3::new(1.0, 0.0, 0.0));
//!
//! let p = pose * DVec3::X;
//! assert!((p - DVec3::new(1.0, 1.0, 0.0)).length() < 1e-12);
//!
//! // right-multiplicative update on the manifold
//! let updated = pose.rplus(&[0.0, 0.0, 0.1, 0.0, 0.0, 0.0]);
//! assert!((updated.r.log().z - (std::f64::consts::FRAC_PI_2 + 0.1)).abs() < 1e-12);
//! ```

/// Special Euclidean group SE(3) for 3D rigid transformations.
pub mod se3;

/// Special Orthogonal group SO(3) for 3D rotations.
pub mod so3;

pub use se3::SE3F64;
pub use so3::SO3F64;
