//! Gradient sampling around a candidate peak.

use nalgebra::Vector3;

use crate::field::ScalarField;
use crate::peaks::Peak;

/// Gradients weaker than this carry no usable direction.
const MIN_GRADIENT_MAGNITUDE: f64 = 1e-9;

/// One gradient line: a point and a unit direction, in the isotropic frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSample {
    /// Cell-center position (z scaled by the anisotropy factor).
    pub position: Vector3<f64>,
    /// Unit gradient direction.
    pub direction: Vector3<f64>,
    /// Gradient magnitude, used as least-squares weight.
    pub weight: f64,
}

impl GradientSample {
    /// Build a sample from a raw gradient; `None` for near-zero gradients.
    pub fn from_gradient(position: Vector3<f64>, gradient: Vector3<f64>) -> Option<Self> {
        let weight = gradient.norm();
        if !weight.is_finite() || weight < MIN_GRADIENT_MAGNITUDE {
            return None;
        }
        Some(Self {
            position,
            direction: gradient / weight,
            weight,
        })
    }
}

/// Axis-aligned box of half-width `radius` voxels around a peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportRegion {
    /// Peak voxel `[x, y, z]`.
    pub center: [usize; 3],
    /// Half-width in voxels.
    pub radius: usize,
    /// Number of real axes.
    pub ndim: usize,
    /// Factor applied to z in the isotropic frame.
    pub anisotropy: f64,
}

impl SupportRegion {
    /// Support region of `peak` in a field with `ndim` axes.
    pub fn around(peak: &Peak, radius: usize, ndim: usize, anisotropy: f64) -> Self {
        Self {
            center: peak.position,
            radius,
            ndim,
            anisotropy,
        }
    }

    /// Convert an isotropic-frame position back to voxel coordinates.
    pub fn to_voxel(&self, p: &Vector3<f64>) -> Vec<f64> {
        let mut out = vec![p.x, p.y, p.z / self.anisotropy];
        out.truncate(self.ndim);
        out
    }

    /// `true` when the voxel position lies inside the box.
    pub fn contains_voxel(&self, voxel: &[f64]) -> bool {
        let r = self.radius as f64;
        voxel.iter().zip(self.center.iter()).all(|(&v, &c)| {
            let c = c as f64;
            v.is_finite() && v >= c - r && v <= c + r
        })
    }
}

/// Collect gradient samples of `field` inside the support region of `peak`.
///
/// Gradients are evaluated at the centers of the cells whose lower corner is
/// offset by `[-r, r-1]` from the peak on every real axis, so every voxel read
/// lies within Chebyshev distance `r`. The gradient along an axis is the mean
/// forward difference over the cell's edges parallel to that axis. Reads
/// outside the field are mirrored.
pub fn sample_gradients(field: &ScalarField, region: &SupportRegion) -> Vec<GradientSample> {
    let ndim = field.ndim();
    let r = region.radius as i64;
    let c = region.center.map(|v| v as i64);
    let z_range = if ndim == 3 { -r..r } else { 0..1 };
    let n_corners = 1usize << ndim;
    let pairs = (n_corners / 2) as f64;

    let mut samples = Vec::with_capacity((2 * region.radius).pow(ndim as u32));
    let mut corner_vals = [0.0f64; 8];
    for dz in z_range {
        for dy in -r..r {
            for dx in -r..r {
                let base = [c[0] + dx, c[1] + dy, c[2] + dz];
                for (mask, val) in corner_vals.iter_mut().enumerate().take(n_corners) {
                    let p = [
                        base[0] + (mask & 1) as i64,
                        base[1] + ((mask >> 1) & 1) as i64,
                        base[2] + ((mask >> 2) & 1) as i64,
                    ];
                    *val = field.get_mirrored(p) as f64;
                }

                let mut g = [0.0f64; 3];
                for (axis, ga) in g.iter_mut().enumerate().take(ndim) {
                    let bit = 1usize << axis;
                    let mut sum = 0.0;
                    for mask in (0..n_corners).filter(|m| m & bit == 0) {
                        sum += corner_vals[mask | bit] - corner_vals[mask];
                    }
                    *ga = sum / pairs;
                }

                let mut position = Vector3::new(base[0] as f64 + 0.5, base[1] as f64 + 0.5, 0.0);
                let mut gradient = Vector3::new(g[0], g[1], 0.0);
                if ndim == 3 {
                    position.z = (base[2] as f64 + 0.5) * region.anisotropy;
                    gradient.z = g[2] / region.anisotropy;
                }
                if let Some(s) = GradientSample::from_gradient(position, gradient) {
                    samples.push(s);
                }
            }
        }
    }
    samples
}
