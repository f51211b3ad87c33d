//! Difference-of-Gaussian response for blob-like spot candidates.
//!
//! `response = G(σ) * I − G(k·σ) * I` with a fixed scale ratio `k`. Bright
//! blobs of scale ≈ σ produce positive maxima. When anisotropy is enabled the
//! z sigma is divided by the anisotropy factor before the kernels are built,
//! so the kernel support follows the voxel spacing.

mod kernel;

pub(crate) use kernel::gaussian_smooth;

use crate::field::ScalarField;

/// Ratio between the wide and narrow Gaussian of the DoG.
pub const DOG_SIGMA_RATIO: f64 = 1.6;

/// Difference-of-Gaussian controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DogConfig {
    /// Narrow Gaussian sigma in xy voxels.
    pub sigma: f64,
    /// Apply the anisotropy factor to the z sigma.
    pub use_anisotropy: bool,
}

impl Default for DogConfig {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            use_anisotropy: true,
        }
    }
}

impl DogConfig {
    /// Per-axis sigma of the narrow Gaussian.
    pub fn axis_sigmas(&self, anisotropy: f64) -> [f64; 3] {
        let z = if self.use_anisotropy {
            self.sigma / anisotropy
        } else {
            self.sigma
        };
        [self.sigma, self.sigma, z]
    }
}

/// Compute the DoG response of `field`.
///
/// The result has the same extent as the input. Callers validate `sigma > 0`
/// and `anisotropy > 0` beforehand.
pub fn compute_dog_response(field: &ScalarField, config: &DogConfig, anisotropy: f64) -> ScalarField {
    let narrow = config.axis_sigmas(anisotropy);
    let wide = narrow.map(|s| s * DOG_SIGMA_RATIO);

    let g1 = gaussian_smooth(field, narrow);
    let g2 = gaussian_smooth(field, wide);

    let data = g1
        .as_slice()
        .iter()
        .zip(g2.as_slice())
        .map(|(&a, &b)| a - b)
        .collect();
    field.with_data(data)
}
