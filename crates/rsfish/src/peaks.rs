//! Local-maximum extraction on the DoG response and per-threshold filtering.
//!
//! Peaks carry their DoG value, so one extraction at the lowest threshold is
//! enough to serve every higher threshold by a plain comparison.

use rayon::prelude::*;

use crate::field::ScalarField;

/// Integer-position local maximum of the DoG response.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Peak {
    /// Voxel position `[x, y, z]`; `z == 0` for 2D fields.
    pub position: [usize; 3],
    /// DoG response at `position`.
    pub dog_value: f32,
}

impl Peak {
    /// Real-axis coordinates of the peak.
    pub fn coords(&self, ndim: usize) -> &[usize] {
        &self.position[..ndim]
    }
}

/// Peak list extracted once at the lowest requested threshold.
#[derive(Debug, Clone)]
pub struct PeakSet {
    /// Threshold used for extraction.
    pub threshold: f64,
    /// Peaks in raster order (x fastest).
    pub peaks: Vec<Peak>,
}

impl PeakSet {
    /// Peaks whose response exceeds `threshold`, in extraction order.
    pub fn filter(&self, threshold: f64) -> Vec<Peak> {
        filter_peaks(&self.peaks, threshold)
    }
}

/// Find strict local maxima of `response` above `threshold`.
///
/// A sample qualifies when `value > threshold` and `value` is strictly greater
/// than every in-bounds neighbour at Chebyshev distance 1. Plateaus produce no
/// peak.
pub fn find_peaks(response: &ScalarField, threshold: f64) -> Vec<Peak> {
    let [w, h, d] = response.dims3();
    let rows = h * d;

    let per_row: Vec<Vec<Peak>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let y = row % h;
            let z = row / h;
            let mut found = Vec::new();
            for x in 0..w {
                let v = response.get([x, y, z]);
                if v.is_nan() || (v as f64) <= threshold {
                    continue;
                }
                if is_strict_maximum(response, [x, y, z], v) {
                    found.push(Peak {
                        position: [x, y, z],
                        dog_value: v,
                    });
                }
            }
            found
        })
        .collect();

    per_row.into_iter().flatten().collect()
}

fn is_strict_maximum(response: &ScalarField, pos: [usize; 3], v: f32) -> bool {
    let dims = response.dims3();
    for dz in -1i64..=1 {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let n = [pos[0] as i64 + dx, pos[1] as i64 + dy, pos[2] as i64 + dz];
                let in_bounds = n
                    .iter()
                    .zip(dims.iter())
                    .all(|(&c, &ext)| c >= 0 && (c as usize) < ext);
                if !in_bounds {
                    continue;
                }
                let nv = response.get([n[0] as usize, n[1] as usize, n[2] as usize]);
                if nv >= v {
                    return false;
                }
            }
        }
    }
    true
}

/// Keep the peaks whose stored DoG value exceeds `threshold`.
pub fn filter_peaks(peaks: &[Peak], threshold: f64) -> Vec<Peak> {
    peaks
        .iter()
        .filter(|p| (p.dog_value as f64) > threshold)
        .copied()
        .collect()
}
