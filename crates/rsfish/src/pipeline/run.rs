//! Top-level pipeline orchestrator: normalize → DoG → peaks → threshold branches.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use super::branch::{self, BranchContext};
use super::result::{Spot, ThresholdResult};
use crate::api::DetectError;
use crate::detector::{ConfigError, DetectConfig};
use crate::dog::compute_dog_response;
use crate::field::ScalarField;
use crate::peaks::{find_peaks, PeakSet};

/// Normalized input, DoG response and superset peaks of one run.
struct Prepared {
    normalized: Arc<ScalarField>,
    peaks: Arc<PeakSet>,
    range: (f64, f64),
}

fn build_pool(config: &DetectConfig) -> Result<rayon::ThreadPool, DetectError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build()
        .map_err(|e| DetectError::ThreadPool(e.to_string()))
}

fn intensity_range(field: &ScalarField, config: &DetectConfig) -> (f64, f64) {
    match config.intensity_range {
        Some([lo, hi]) => (lo, hi),
        None => field
            .min_max()
            .map(|(lo, hi)| (lo as f64, hi as f64))
            .unwrap_or((0.0, 0.0)),
    }
}

fn prepare(field: &ScalarField, config: &DetectConfig) -> Result<Prepared, DetectError> {
    let min_threshold = config.min_threshold().ok_or(ConfigError::EmptyThresholds)?;
    let range = intensity_range(field, config);
    tracing::debug!("normalizing intensities from [{}, {}]", range.0, range.1);
    let normalized = Arc::new(field.normalized(range.0, range.1));

    let dog = compute_dog_response(&normalized, &config.dog, config.anisotropy);
    let peaks = find_peaks(&dog, min_threshold);
    tracing::info!("{} peaks above threshold {}", peaks.len(), min_threshold);

    Ok(Prepared {
        normalized,
        peaks: Arc::new(PeakSet {
            threshold: min_threshold,
            peaks,
        }),
        range,
    })
}

/// Run the full detection on `field`; one result per requested threshold,
/// in requested order.
pub(crate) fn detect_spots(
    field: &ScalarField,
    config: &DetectConfig,
) -> Result<Vec<ThresholdResult>, DetectError> {
    config.validate()?;
    let pool = build_pool(config)?;
    pool.install(|| {
        let prepared = prepare(field, config)?;
        let ctx = BranchContext {
            raw: field,
            normalized: Arc::clone(&prepared.normalized),
            peaks: Arc::clone(&prepared.peaks),
            config,
            intensity_scale: prepared.range.1 - prepared.range.0,
        };
        Ok(config
            .thresholds
            .par_iter()
            .map(|&t| run_guarded(t, || branch::run(&ctx, t)))
            .collect())
    })
}

/// Candidate peaks at the lowest requested threshold, without refinement.
pub(crate) fn detect_peaks(field: &ScalarField, config: &DetectConfig) -> Result<PeakSet, DetectError> {
    config.validate()?;
    let pool = build_pool(config)?;
    pool.install(|| {
        let prepared = prepare(field, config)?;
        Ok(Arc::unwrap_or_clone(prepared.peaks))
    })
}

/// Run one branch, converting a panic into a failed result.
pub(super) fn run_guarded<F>(threshold: f64, branch: F) -> ThresholdResult
where
    F: FnOnce() -> Vec<Spot>,
{
    match catch_unwind(AssertUnwindSafe(branch)) {
        Ok(spots) => ThresholdResult {
            threshold,
            spots,
            failure: None,
        },
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("threshold {} failed: {}", threshold, msg);
            ThresholdResult {
                threshold,
                spots: Vec::new(),
                failure: Some(msg),
            }
        }
    }
}
