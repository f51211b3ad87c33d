//! Shared synthetic inputs for unit tests.

use nalgebra::Vector3;

use crate::field::ScalarField;
use crate::radial::GradientSample;

/// Render isotropic Gaussian blobs on a constant background.
///
/// `dims` has 2 or 3 entries; every center has one coordinate per axis.
/// Voxel `i` sits at coordinate `i`.
pub(crate) fn render_blobs<C: AsRef<[f64]>>(
    dims: &[usize],
    centers: &[C],
    sigma: f64,
    amplitude: f64,
    background: f64,
) -> ScalarField {
    let w = dims[0];
    let h = dims[1];
    let d = dims.get(2).copied().unwrap_or(1);
    let two_s2 = 2.0 * sigma * sigma;

    let mut data = vec![background as f32; w * h * d];
    for c in centers {
        let c = c.as_ref();
        let cz = c.get(2).copied().unwrap_or(0.0);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let dx = x as f64 - c[0];
                    let dy = y as f64 - c[1];
                    let dz = z as f64 - cz;
                    let v = amplitude * (-(dx * dx + dy * dy + dz * dz) / two_s2).exp();
                    data[x + w * (y + h * z)] += v as f32;
                }
            }
        }
    }
    ScalarField::from_dims(dims, data).expect("valid synthetic field")
}

/// Gradient samples at `center + offset` whose lines all pass exactly through
/// `center`.
pub(crate) fn radiating_samples(center: Vector3<f64>, offsets: &[[f64; 3]]) -> Vec<GradientSample> {
    offsets
        .iter()
        .map(|o| {
            let p = center + Vector3::new(o[0], o[1], o[2]);
            GradientSample::from_gradient(p, center - p).expect("non-zero gradient")
        })
        .collect()
}

/// Gradient samples on a jittered grid of half-width `r` around `center`,
/// restricted to the xy plane when `ndim == 2`.
pub(crate) fn star_samples(center: Vector3<f64>, r: i32, ndim: usize) -> Vec<GradientSample> {
    let z_span = if ndim == 3 { r } else { 0 };
    let mut offsets = Vec::new();
    for z in -z_span..=z_span {
        for y in -r..=r {
            for x in -r..=r {
                if x != 0 || y != 0 || z != 0 {
                    offsets.push([x as f64 + 0.25, y as f64 - 0.15, z as f64]);
                }
            }
        }
    }
    radiating_samples(center, &offsets)
}
