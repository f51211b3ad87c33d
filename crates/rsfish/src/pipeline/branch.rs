//! Per-threshold branch: filter peaks, refine each one, measure intensity.

use std::sync::Arc;

use rayon::prelude::*;

use super::result::Spot;
use crate::background::{estimate_background, shell_values, BackgroundMode};
use crate::detector::DetectConfig;
use crate::field::ScalarField;
use crate::peaks::{Peak, PeakSet};
use crate::radial::{sample_gradients, SupportRegion};
use crate::ransac::refine_peak;

/// Read-only state shared by every threshold branch of a run.
pub(super) struct BranchContext<'a> {
    /// Caller's field, used for intensity and background.
    pub raw: &'a ScalarField,
    /// Normalized field, used for gradients.
    pub normalized: Arc<ScalarField>,
    /// Peaks extracted at the lowest threshold.
    pub peaks: Arc<PeakSet>,
    pub config: &'a DetectConfig,
    /// Width of the normalization range, in raw intensity units.
    pub intensity_scale: f64,
}

/// Spots for `threshold`, in peak order.
pub(super) fn run(ctx: &BranchContext<'_>, threshold: f64) -> Vec<Spot> {
    let peaks = ctx.peaks.filter(threshold);
    let spots: Vec<Spot> = peaks
        .par_iter()
        .map(|peak| spots_for_peak(ctx, peak))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();
    tracing::info!(
        "threshold {}: {} peaks, {} spots",
        threshold,
        peaks.len(),
        spots.len()
    );
    spots
}

fn spots_for_peak(ctx: &BranchContext<'_>, peak: &Peak) -> Vec<Spot> {
    let config = ctx.config;
    let ndim = ctx.normalized.ndim();
    let region = SupportRegion::around(peak, config.support_radius, ndim, config.anisotropy);

    let samples = sample_gradients(&ctx.normalized, &region);
    let sets = match refine_peak(&samples, &region, &config.ransac) {
        Ok(sets) => sets,
        Err(err) => {
            tracing::trace!("peak {:?} rejected: {}", peak.coords(ndim), err);
            return Vec::new();
        }
    };

    let background = match config.background.mode {
        BackgroundMode::None => 0.0,
        _ => {
            let shell = shell_values(ctx.raw, peak.position, config.support_radius);
            estimate_background(&shell, &config.background, ctx.intensity_scale)
        }
    };

    sets.into_iter()
        .filter_map(|set| {
            let position = region.to_voxel(&set.position);
            let intensity = ctx.raw.interpolate(&position) - background;
            if intensity < config.intensity_threshold {
                tracing::trace!(
                    "spot at {:?} below intensity threshold ({} < {})",
                    position,
                    intensity,
                    config.intensity_threshold
                );
                return None;
            }
            Some(Spot {
                position,
                intensity,
                background,
                residual: set.residual,
                num_inliers: set.inliers.len(),
                dog_value: peak.dog_value,
            })
        })
        .collect()
}
