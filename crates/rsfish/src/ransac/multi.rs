//! Multiconsensus RANSAC: peel overlapping spots off one support region.
//!
//! The candidate pool starts with every gradient sample. Each round runs a
//! full consensus search on the pool; an accepted set is removed from the
//! pool before the next round, together with any remaining line that passes
//! close to the accepted center. Acceptance gets stricter relative to the
//! spots found so far: the inlier count must not fall below `mean − n·σ` of
//! earlier counts, with `n` moving linearly from the initial to the final
//! factor as the pool is consumed.

use rand::Rng;

use super::consensus::{acceptance_floor, refit_inliers, search_consensus};
use super::{ConsensusSet, RansacConfig};
use crate::radial::{line_distance, FitError, GradientSample, SupportRegion};

/// Lines within this many `max_error` of an accepted center leave the pool.
const CLAIM_RADIUS_FACTOR: f64 = 2.0;

/// Recover every spot supported by `samples`.
///
/// Fails with [`FitError::NoConsensus`] when not even one set is accepted.
pub fn fit_multi_consensus<R: Rng>(
    samples: &[GradientSample],
    region: &SupportRegion,
    config: &RansacConfig,
    rng: &mut R,
) -> Result<Vec<ConsensusSet>, FitError> {
    let total = samples.len();
    let ndim = region.ndim;
    let min_inliers = config.multi.min_num_inliers.max(ndim);
    if total < min_inliers {
        return Err(FitError::InsufficientSamples {
            needed: min_inliers,
            got: total,
        });
    }

    let claim_radius = CLAIM_RADIUS_FACTOR * config.max_error;
    let mut pool: Vec<usize> = (0..total).collect();
    let mut accepted: Vec<ConsensusSet> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut best_rejected = 0usize;

    while pool.len() >= min_inliers {
        let Some(best) = search_consensus(samples, &pool, ndim, config, rng) else {
            break;
        };
        let floor = acceptance_floor(config.inlier_ratio, pool.len(), ndim).max(min_inliers);
        if best.inliers.len() < floor {
            best_rejected = best.inliers.len();
            break;
        }
        let set = refit_inliers(samples, &pool, best, ndim, config.max_error, floor);
        let count = set.inliers.len();

        let consumed = 1.0 - pool.len() as f64 / total as f64;
        let n_std = stdev_factor(
            config.multi.n_times_stdev_initial,
            config.multi.n_times_stdev_final,
            consumed,
        );
        if count_bound(&counts, n_std).is_some_and(|b| (count as f64) < b) {
            tracing::trace!("consensus of {} inliers below bound after {:?}", count, counts);
            best_rejected = count;
            break;
        }
        if !region.contains_voxel(&region.to_voxel(&set.position)) {
            break;
        }

        let mut taken = vec![false; total];
        for &i in &set.inliers {
            taken[i] = true;
        }
        pool.retain(|&i| !taken[i] && line_distance(&samples[i], &set.position) > claim_radius);
        counts.push(count);
        accepted.push(set);
    }

    if accepted.is_empty() {
        return Err(FitError::NoConsensus {
            best_inliers: best_rejected,
            pool: total,
        });
    }
    Ok(accepted)
}

/// Standard-deviation factor after `consumed` (0..=1) of the pool is used.
fn stdev_factor(initial: f64, last: f64, consumed: f64) -> f64 {
    let t = consumed.clamp(0.0, 1.0);
    initial + (last - initial) * t
}

/// Lower bound `mean − n·σ` over earlier inlier counts, `None` before the
/// first accepted spot.
///
/// `σ` never drops below `sqrt(mean)`, the spread of a count of that size.
fn count_bound(counts: &[usize], n_std: f64) -> Option<f64> {
    if counts.is_empty() {
        return None;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
    let var = counts
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(mean - n_std * var.sqrt().max(mean.sqrt()))
}
