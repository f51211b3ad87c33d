//! Single-consensus RANSAC over gradient lines.

use rand::Rng;

use super::{ConsensusSet, RansacConfig};
use crate::radial::{fit_radial_center_indexed, line_distance, FitError, GradientSample, SupportRegion};

/// Upper bound on inlier refit rounds after the sampling stage.
const MAX_REFIT_ROUNDS: usize = 5;

/// Fit one spot robustly using RANSAC.
///
/// Samples `ndim`-line minimal subsets, fits their intersection, and keeps the
/// trial with the most inliers (lower residual on ties). The winner is
/// accepted when its inlier fraction reaches `config.inlier_ratio`, then
/// re-fit to its inliers until the inlier set no longer changes.
pub fn fit_single_consensus<R: Rng>(
    samples: &[GradientSample],
    region: &SupportRegion,
    config: &RansacConfig,
    rng: &mut R,
) -> Result<ConsensusSet, FitError> {
    let n = samples.len();
    let ndim = region.ndim;
    if n < ndim {
        return Err(FitError::InsufficientSamples {
            needed: ndim,
            got: n,
        });
    }

    let pool: Vec<usize> = (0..n).collect();
    let best = search_consensus(samples, &pool, ndim, config, rng).ok_or(FitError::NoConsensus {
        best_inliers: 0,
        pool: n,
    })?;

    let floor = acceptance_floor(config.inlier_ratio, n, ndim);
    let count = best.inliers.len();
    if count < floor {
        return Err(FitError::NoConsensus {
            best_inliers: count,
            pool: n,
        });
    }

    let refined = refit_inliers(samples, &pool, best, ndim, config.max_error, floor);
    if !region.contains_voxel(&region.to_voxel(&refined.position)) {
        return Err(FitError::OutsideSupport);
    }
    Ok(refined)
}

/// Best minimal-subset consensus among `pool`, or `None` when every trial
/// was degenerate.
pub(super) fn search_consensus<R: Rng>(
    samples: &[GradientSample],
    pool: &[usize],
    ndim: usize,
    config: &RansacConfig,
    rng: &mut R,
) -> Option<ConsensusSet> {
    let n = pool.len();
    if n < ndim {
        return None;
    }

    let mut best: Option<ConsensusSet> = None;
    let mut subset = vec![0usize; ndim];
    for _ in 0..config.num_iterations {
        for (slot, &k) in subset.iter_mut().zip(sample_indices(rng, n, ndim).iter()) {
            *slot = pool[k];
        }
        let Ok(fit) = fit_radial_center_indexed(samples, &subset, ndim) else {
            continue;
        };

        let candidate = score(samples, pool, fit.position, config.max_error);
        let better = match &best {
            None => true,
            Some(b) => {
                candidate.inliers.len() > b.inliers.len()
                    || (candidate.inliers.len() == b.inliers.len() && candidate.residual < b.residual)
            }
        };
        if better {
            best = Some(candidate);
            // Every sample agrees; no trial can do better.
            if best.as_ref().is_some_and(|b| b.inliers.len() == n) {
                break;
            }
        }
    }
    best
}

/// Smallest inlier count accepted from a pool of `pool_len` samples.
pub(super) fn acceptance_floor(inlier_ratio: f64, pool_len: usize, ndim: usize) -> usize {
    ((inlier_ratio * pool_len as f64).ceil() as usize).max(ndim)
}

/// Re-fit `set` to its inliers and re-score against `pool` until stable.
///
/// A round that would leave fewer than `min_count` inliers is discarded and
/// the previous set is kept.
pub(super) fn refit_inliers(
    samples: &[GradientSample],
    pool: &[usize],
    mut set: ConsensusSet,
    ndim: usize,
    max_error: f64,
    min_count: usize,
) -> ConsensusSet {
    for _ in 0..MAX_REFIT_ROUNDS {
        let Ok(fit) = fit_radial_center_indexed(samples, &set.inliers, ndim) else {
            break;
        };
        let next = score(samples, pool, fit.position, max_error);
        if next.inliers.len() < min_count.max(ndim) {
            break;
        }
        let stable = next.inliers == set.inliers;
        set = next;
        if stable {
            break;
        }
    }
    set
}

/// Inliers of `pool` for the center `position`, with their weighted mean distance.
fn score(
    samples: &[GradientSample],
    pool: &[usize],
    position: nalgebra::Vector3<f64>,
    max_error: f64,
) -> ConsensusSet {
    let mut inliers = Vec::new();
    let mut dist_sum = 0.0;
    let mut w_sum = 0.0;
    for &i in pool {
        let s = &samples[i];
        let dist = line_distance(s, &position);
        if dist <= max_error {
            inliers.push(i);
            dist_sum += s.weight * dist;
            w_sum += s.weight;
        }
    }
    let residual = if w_sum > 0.0 { dist_sum / w_sum } else { f64::INFINITY };
    ConsensusSet {
        position,
        inliers,
        residual,
    }
}

/// Sample `k` distinct indices from `0..n` using Fisher–Yates partial shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::star_samples;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use rand::prelude::*;

    fn random_lines(rng: &mut StdRng, count: usize, lo: f64, hi: f64, ndim: usize) -> Vec<GradientSample> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let z = if ndim == 3 { rng.gen_range(lo..hi) } else { 0.0 };
            let gz = if ndim == 3 { rng.gen_range(-1.0..1.0) } else { 0.0 };
            let p = Vector3::new(rng.gen_range(lo..hi), rng.gen_range(lo..hi), z);
            let g = Vector3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), gz);
            out.extend(GradientSample::from_gradient(p, g));
        }
        out
    }

    fn config(max_error: f64, inlier_ratio: f64) -> RansacConfig {
        RansacConfig {
            max_error,
            inlier_ratio,
            num_iterations: 500,
            ..Default::default()
        }
    }

    fn region(center: [usize; 3], radius: usize, ndim: usize) -> SupportRegion {
        SupportRegion {
            center,
            radius,
            ndim,
            anisotropy: 1.0,
        }
    }

    #[test]
    fn test_sample_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let mut idx = sample_indices(&mut rng, 10, 3);
            assert_eq!(idx.len(), 3);
            idx.sort_unstable();
            idx.dedup();
            assert_eq!(idx.len(), 3);
            assert!(idx.iter().all(|&i| i < 10));
        }
    }

    #[test]
    fn test_ransac_no_outliers() {
        let c = Vector3::new(10.4, 9.7, 0.0);
        let samples = star_samples(c, 3, 2);
        let mut rng = StdRng::seed_from_u64(42);
        let result = fit_single_consensus(&samples, &region([10, 10, 0], 3, 2), &config(0.5, 0.5), &mut rng)
            .expect("RANSAC should succeed");
        assert_eq!(result.inliers.len(), samples.len());
        assert_relative_eq!(result.position, c, epsilon = 1e-9);
        assert!(result.residual < 1e-9);
    }

    #[test]
    fn test_ransac_with_outliers() {
        let c = Vector3::new(6.3, 5.8, 6.2);
        let mut samples = star_samples(c, 2, 3);
        let n_true = samples.len();
        let mut rng = StdRng::seed_from_u64(999);
        samples.extend(random_lines(&mut rng, 40, 2.0, 10.0, 3));

        let mut rng = StdRng::seed_from_u64(42);
        let result = fit_single_consensus(&samples, &region([6, 6, 6], 3, 3), &config(0.5, 0.3), &mut rng)
            .expect("RANSAC should succeed with outliers");

        assert_relative_eq!(result.position.x, c.x, epsilon = 0.1);
        assert_relative_eq!(result.position.y, c.y, epsilon = 0.1);
        assert_relative_eq!(result.position.z, c.z, epsilon = 0.1);
        assert!(
            result.inliers.len() >= n_true,
            "expected >= {} inliers, got {}",
            n_true,
            result.inliers.len()
        );
        assert!(result.inliers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ransac_rejects_pure_noise() {
        let mut rng = StdRng::seed_from_u64(777);
        let samples = random_lines(&mut rng, 60, 0.0, 12.0, 3);
        let mut rng = StdRng::seed_from_u64(42);
        let err = fit_single_consensus(&samples, &region([6, 6, 6], 3, 3), &config(0.2, 0.5), &mut rng)
            .expect_err("noise has no consensus");
        assert!(matches!(err, FitError::NoConsensus { pool: 60, .. }));
    }

    #[test]
    fn test_ransac_too_few_samples() {
        let samples = star_samples(Vector3::new(5.0, 5.0, 0.0), 1, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let err = fit_single_consensus(&samples[..1], &region([5, 5, 0], 2, 2), &config(0.5, 0.1), &mut rng)
            .expect_err("one line is not enough");
        assert_eq!(err, FitError::InsufficientSamples { needed: 2, got: 1 });
    }

    #[test]
    fn test_refit_keeps_set_when_inliers_fall_below_floor() {
        // Three light lines meet at `p`; two heavy lines meet at `r` and pass
        // 0.45 from `p`. Refitting all five drifts toward `r` and drops the
        // horizontal light line.
        let p = Vector3::new(5.0, 5.0, 0.0);
        let r = p + Vector3::new(0.0, 0.9, 0.0);
        let s3 = 3f64.sqrt() / 2.0;
        let light = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.5, s3, 0.0), Vector3::new(-0.5, s3, 0.0)];
        let heavy = [Vector3::new(0.5, s3, 0.0), Vector3::new(0.5, -s3, 0.0)];
        let mut samples: Vec<GradientSample> = light
            .iter()
            .filter_map(|d| GradientSample::from_gradient(p + d * 2.0, *d))
            .collect();
        samples.extend(heavy.iter().filter_map(|d| GradientSample::from_gradient(r + d, d * 100.0)));
        let pool: Vec<usize> = (0..samples.len()).collect();

        let initial = score(&samples, &pool, p, 0.5);
        assert_eq!(initial.inliers.len(), 5);

        let loose = refit_inliers(&samples, &pool, initial.clone(), 2, 0.5, 2);
        assert_eq!(loose.inliers, vec![1, 2, 3, 4]);

        let kept = refit_inliers(&samples, &pool, initial.clone(), 2, 0.5, 5);
        assert_eq!(kept, initial);
    }

    #[test]
    fn test_acceptance_floor_rounds_up() {
        assert_eq!(acceptance_floor(0.1, 216, 3), 22);
        assert_eq!(acceptance_floor(0.5, 10, 3), 5);
        assert_eq!(acceptance_floor(0.0, 10, 3), 3);
    }

    #[test]
    fn test_ransac_rejects_center_outside_support() {
        let samples = star_samples(Vector3::new(15.0, 5.0, 0.0), 2, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let err = fit_single_consensus(&samples, &region([5, 5, 0], 3, 2), &config(0.5, 0.1), &mut rng)
            .expect_err("center is far from the peak");
        assert_eq!(err, FitError::OutsideSupport);
    }
}
