//! Spot detection pipeline.
//!
//! Stages, in call order:
//! normalize → DoG response → peak extraction at the lowest threshold →
//! one branch per threshold (peak filter → gradient sampling → RANSAC
//! refinement → background and intensity → intensity filter).
//!
//! The DoG response and the peak superset are computed once per run and
//! shared read-only by all branches. Branches run in parallel on a pool sized
//! by `DetectConfig::num_threads`; results keep the requested threshold order.

mod branch;
mod result;
mod run;

#[cfg(test)]
mod tests;

pub use result::{Spot, ThresholdResult};

pub(crate) use run::{detect_peaks, detect_spots};
