//! Radial-symmetry localization from image gradients.
//!
//! Intensity gradients of a symmetric blob point towards its center. Each
//! gradient defines a line; the spot center is recovered as the weighted
//! least-squares intersection of these lines.
//!
//! All geometry is done in an isotropic frame: the z coordinate is multiplied
//! by the anisotropy factor (and the z gradient divided by it). Two-dimensional
//! data is embedded at `z = 0`.

mod estimator;
mod gradient;

pub use estimator::{fit_radial_center, fit_radial_center_indexed, line_distance, RadialFit};
pub use gradient::{sample_gradients, GradientSample, SupportRegion};

/// Reasons why a peak does not produce a spot.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Not enough usable gradient samples for the requested operation.
    InsufficientSamples {
        /// Required minimum number of samples.
        needed: usize,
        /// Number of samples available.
        got: usize,
    },
    /// Gradient lines are (nearly) parallel; the normal equations are ill-conditioned.
    Degenerate,
    /// No consensus set reached the acceptance bound.
    NoConsensus {
        /// Best inlier count found.
        best_inliers: usize,
        /// Number of samples in the pool.
        pool: usize,
    },
    /// The fitted position left the support region of the seeding peak.
    OutsideSupport,
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientSamples { needed, got } => {
                write!(f, "insufficient gradient samples: need {}, got {}", needed, got)
            }
            Self::Degenerate => write!(f, "degenerate gradient-intersection system"),
            Self::NoConsensus { best_inliers, pool } => {
                write!(f, "no consensus: best {} inliers of {}", best_inliers, pool)
            }
            Self::OutsideSupport => write!(f, "fit left the support region"),
        }
    }
}

impl std::error::Error for FitError {}
