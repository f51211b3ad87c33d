//! Local background estimation around a spot.
//!
//! The estimate uses the outer shell of the support region (samples at
//! Chebyshev distance exactly `r` from the peak) so the spot itself does not
//! contribute. Robust modes run a one-sample RANSAC over the shell values.

use crate::field::ScalarField;

/// How the local background is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// No subtraction.
    None,
    /// Mean of the shell values.
    Mean,
    /// Median of the shell values.
    Median,
    /// Mean of the largest consistent subset of shell values.
    RansacMean,
    /// Median of the largest consistent subset of shell values.
    RansacMedian,
}

/// Background subtraction controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Estimator applied to the support-region shell.
    pub mode: BackgroundMode,
    /// Inlier tolerance of the robust modes, in normalized intensity units.
    pub max_error: f64,
    /// Minimum inlier fraction of the robust modes.
    pub inlier_ratio: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::None,
            max_error: 0.05,
            inlier_ratio: 0.75,
        }
    }
}

/// Samples of `field` at Chebyshev distance exactly `radius` from `center`.
///
/// Only real axes are visited; reads outside the field are mirrored.
pub fn shell_values(field: &ScalarField, center: [usize; 3], radius: usize) -> Vec<f64> {
    let r = radius as i64;
    let c = center.map(|v| v as i64);
    let z_span = if field.ndim() == 3 { r } else { 0 };
    let mut values = Vec::new();
    for dz in -z_span..=z_span {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs().max(dy.abs()).max(dz.abs()) != r {
                    continue;
                }
                values.push(field.get_mirrored([c[0] + dx, c[1] + dy, c[2] + dz]) as f64);
            }
        }
    }
    values
}

/// Background value for one spot from its shell `values`.
///
/// `scale` converts `config.max_error` to the units of `values` (the width of
/// the normalization range). Returns 0 in [`BackgroundMode::None`] or for an
/// empty shell.
pub fn estimate_background(values: &[f64], config: &BackgroundConfig, scale: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match config.mode {
        BackgroundMode::None => 0.0,
        BackgroundMode::Mean => mean(values),
        BackgroundMode::Median => median(values),
        BackgroundMode::RansacMean | BackgroundMode::RansacMedian => {
            let use_median = config.mode == BackgroundMode::RansacMedian;
            match robust_inliers(values, config.max_error * scale, config.inlier_ratio) {
                Some(inliers) if use_median => median(&inliers),
                Some(inliers) => mean(&inliers),
                None => {
                    tracing::debug!(
                        "robust background rejected over {} shell values, using plain estimate",
                        values.len()
                    );
                    if use_median {
                        median(values)
                    } else {
                        mean(values)
                    }
                }
            }
        }
    }
}

/// One-sample RANSAC over scalar values.
///
/// Every value is tried as the model (the shell is small, so the search is
/// exhaustive). The best model has the most values within `max_error`, then
/// the lowest mean absolute deviation of those values.
fn robust_inliers(values: &[f64], max_error: f64, inlier_ratio: f64) -> Option<Vec<f64>> {
    let mut best: Option<(usize, f64, f64)> = None;
    for &model in values {
        let mut count = 0usize;
        let mut dev = 0.0;
        for &v in values {
            let d = (v - model).abs();
            if d <= max_error {
                count += 1;
                dev += d;
            }
        }
        let mad = dev / count as f64;
        let better = match best {
            None => true,
            Some((bc, bmad, _)) => count > bc || (count == bc && mad < bmad),
        };
        if better {
            best = Some((count, mad, model));
        }
    }

    let (count, _, model) = best?;
    if (count as f64) < inlier_ratio * values.len() as f64 {
        return None;
    }
    Some(
        values
            .iter()
            .copied()
            .filter(|v| (v - model).abs() <= max_error)
            .collect(),
    )
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}
