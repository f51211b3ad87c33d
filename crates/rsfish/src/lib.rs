//! rsfish: sub-pixel spot detection in 2D/3D fluorescence images.
//!
//! Built for single-molecule FISH data, where every spot is a small,
//! roughly radially symmetric blob. The pipeline stages are:
//!
//! 1. **Normalize** – rescale intensities to `[0, 1]`.
//! 2. **DoG** – Difference-of-Gaussian response, computed once per run.
//! 3. **Peaks** – strict local maxima above the lowest requested threshold;
//!    every other threshold is served by filtering this superset.
//! 4. **Radial symmetry** – closed-form intersection of image-gradient lines
//!    around each peak.
//! 5. **RANSAC** – outlier-robust refinement, optionally recovering several
//!    overlapping spots per peak (multiconsensus).
//! 6. **Intensity** – interpolated intensity with optional local background
//!    subtraction.
//!
//! # Public API
//! - [`SpotDetector`] as primary entry point
//! - [`DetectConfig`] for tuning
//! - [`ScalarField`] as input and [`ThresholdResult`] / [`Spot`] as output
//!
//! The stage modules are public for callers that want to run single stages.

mod api;
pub mod background;
mod detector;
pub mod dog;
mod field;
pub mod peaks;
mod pipeline;
pub mod radial;
pub mod ransac;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{DetectError, SpotDetector};
pub use background::{BackgroundConfig, BackgroundMode};
pub use detector::{ConfigError, DetectConfig};
pub use dog::DogConfig;
pub use field::{FieldError, ScalarField};
pub use peaks::{Peak, PeakSet};
pub use pipeline::{Spot, ThresholdResult};
pub use radial::FitError;
pub use ransac::{MultiConsensusConfig, RansacConfig, RansacMode};
