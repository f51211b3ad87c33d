//! Outlier-robust refinement of radial-symmetry fits.
//!
//! Three modes are supported:
//! - `Off`: one least-squares fit over every gradient sample.
//! - `Single`: RANSAC over minimal subsets, followed by an inlier refit.
//! - `MultiConsensus`: repeated RANSAC that peels off one spot at a time, so
//!   overlapping spots inside a single support region are all recovered.
//!
//! Sampling is deterministic: each peak gets its own generator seeded from the
//! configured seed and the peak coordinates.

mod consensus;
mod multi;

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::radial::{fit_radial_center, FitError, GradientSample, SupportRegion};

pub use consensus::fit_single_consensus;
pub use multi::fit_multi_consensus;

/// Seed used when the configuration does not provide one.
pub const DEFAULT_SEED: u64 = 0x5EED_0F15_B5EE_D000;

/// Refinement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RansacMode {
    /// Plain least-squares over all samples.
    Off,
    /// One consensus set per peak.
    Single,
    /// Several consensus sets per peak.
    MultiConsensus,
}

/// Multiconsensus peeling controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MultiConsensusConfig {
    /// Minimum inliers for every accepted spot; peeling stops when the pool
    /// is smaller.
    pub min_num_inliers: usize,
    /// Standard-deviation factor at the start of peeling.
    pub n_times_stdev_initial: f64,
    /// Standard-deviation factor once the whole pool is consumed.
    pub n_times_stdev_final: f64,
}

impl Default for MultiConsensusConfig {
    fn default() -> Self {
        Self {
            min_num_inliers: 20,
            n_times_stdev_initial: 8.0,
            n_times_stdev_final: 6.0,
        }
    }
}

/// RANSAC refinement controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Refinement strategy.
    pub mode: RansacMode,
    /// Minimal-subset trials per consensus search.
    pub num_iterations: usize,
    /// Minimum inlier fraction of the candidate pool.
    pub inlier_ratio: f64,
    /// Inlier distance between a gradient line and the fitted center (voxels).
    pub max_error: f64,
    /// Sampling seed; `None` uses [`DEFAULT_SEED`].
    pub seed: Option<u64>,
    /// Peeling controls, used in `MultiConsensus` mode only.
    pub multi: MultiConsensusConfig,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            mode: RansacMode::Single,
            num_iterations: 1000,
            inlier_ratio: 0.1,
            max_error: 1.5,
            seed: None,
            multi: MultiConsensusConfig::default(),
        }
    }
}

/// A fitted center together with the samples supporting it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusSet {
    /// Fitted center in the isotropic frame.
    pub position: Vector3<f64>,
    /// Indices into the gradient sample arena, ascending.
    pub inliers: Vec<usize>,
    /// Weighted mean line distance of the inliers to `position`.
    pub residual: f64,
}

/// Generator for the peak at `position`.
///
/// Depends only on the seed and the coordinates, never on scheduling.
pub fn peak_rng(seed: Option<u64>, position: [usize; 3]) -> StdRng {
    let mut h = seed.unwrap_or(DEFAULT_SEED);
    for c in position {
        h = splitmix64(h ^ c as u64);
    }
    StdRng::seed_from_u64(h)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Refine one peak from its gradient samples.
///
/// Returns one consensus set in `Off`/`Single` mode and one or more in
/// `MultiConsensus` mode. Every returned center lies inside `region`.
pub fn refine_peak(
    samples: &[GradientSample],
    region: &SupportRegion,
    config: &RansacConfig,
) -> Result<Vec<ConsensusSet>, FitError> {
    match config.mode {
        RansacMode::Off => fit_all(samples, region).map(|c| vec![c]),
        RansacMode::Single => {
            let mut rng = peak_rng(config.seed, region.center);
            fit_single_consensus(samples, region, config, &mut rng).map(|c| vec![c])
        }
        RansacMode::MultiConsensus => {
            let mut rng = peak_rng(config.seed, region.center);
            fit_multi_consensus(samples, region, config, &mut rng)
        }
    }
}

fn fit_all(samples: &[GradientSample], region: &SupportRegion) -> Result<ConsensusSet, FitError> {
    let fit = fit_radial_center(samples, region.ndim)?;
    if !region.contains_voxel(&region.to_voxel(&fit.position)) {
        return Err(FitError::OutsideSupport);
    }
    Ok(ConsensusSet {
        position: fit.position,
        inliers: (0..samples.len()).collect(),
        residual: fit.residual,
    })
}
