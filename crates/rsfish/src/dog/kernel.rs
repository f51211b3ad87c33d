//! Sampled 1D Gaussian kernels and separable convolution.

use rayon::prelude::*;

use crate::field::{mirror_index, ScalarField};

/// Normalized, symmetric 1D Gaussian kernel.
#[derive(Debug, Clone)]
pub(crate) struct GaussianKernel {
    pub(crate) radius: usize,
    pub(crate) weights: Vec<f64>,
}

impl GaussianKernel {
    /// Sample `exp(-x²/2σ²)` on `[-r, r]` with `r = max(1, ceil(3σ))` and
    /// normalize to unit sum.
    pub(crate) fn new(sigma: f64) -> Self {
        debug_assert!(sigma > 0.0 && sigma.is_finite());
        let radius = ((3.0 * sigma).ceil() as usize).max(1);
        let two_s2 = 2.0 * sigma * sigma;
        let mut weights: Vec<f64> = (-(radius as i64)..=radius as i64)
            .map(|i| (-((i * i) as f64) / two_s2).exp())
            .collect();
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }
        Self { radius, weights }
    }
}

/// Convolve `field` along every axis with a Gaussian of the given per-axis sigma.
///
/// Axes with unit extent are skipped. Rows of the output are computed in
/// parallel; each output sample depends only on the input, so the result does
/// not depend on the number of worker threads.
pub(crate) fn gaussian_smooth(field: &ScalarField, sigmas: [f64; 3]) -> ScalarField {
    let dims = field.dims3();
    let mut current = field.as_slice().to_vec();
    for (axis, &sigma) in sigmas.iter().enumerate() {
        if dims[axis] <= 1 {
            continue;
        }
        let kernel = GaussianKernel::new(sigma);
        current = convolve_axis(&current, dims, axis, &kernel);
    }
    field.with_data(current)
}

fn convolve_axis(src: &[f32], dims: [usize; 3], axis: usize, kernel: &GaussianKernel) -> Vec<f32> {
    let [w, h, _] = dims;
    let n = dims[axis];
    let stride = match axis {
        0 => 1,
        1 => w,
        _ => w * h,
    };
    let r = kernel.radius as i64;

    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(w).enumerate().for_each(|(row, dst)| {
        let y = row % h;
        let z = row / h;
        let row_base = w * (y + h * z);
        for (x, d) in dst.iter_mut().enumerate() {
            let pos = [x, y, z][axis] as i64;
            let line_base = row_base + x - pos as usize * stride;
            let mut acc = 0.0f64;
            for (k, &wk) in kernel.weights.iter().enumerate() {
                let j = mirror_index(pos + k as i64 - r, n);
                acc += wk * src[line_base + j * stride] as f64;
            }
            *d = acc as f32;
        }
    });
    out
}
