//! Closed-form weighted least-squares intersection of gradient lines.
//!
//! For lines `(p_i, d_i)` with weights `w_i`, the point minimizing
//! `Σ w_i |(I − d_i d_iᵀ)(x − p_i)|²` solves
//! `(Σ w_i P_i) x = Σ w_i P_i p_i` with `P_i = I − d_i d_iᵀ`.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use super::{FitError, GradientSample};

/// Smallest accepted `λ_min / λ_max` of the normal matrix.
const MIN_EIGEN_RATIO: f64 = 1e-6;

/// Result of a radial-symmetry fit in the isotropic frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialFit {
    /// Least-squares intersection point.
    pub position: Vector3<f64>,
    /// Weighted mean perpendicular distance of the input lines to `position`.
    pub residual: f64,
}

/// Perpendicular distance between `point` and the gradient line of `sample`.
#[inline]
pub fn line_distance(sample: &GradientSample, point: &Vector3<f64>) -> f64 {
    let v = point - sample.position;
    (v - sample.direction * v.dot(&sample.direction)).norm()
}

/// Fit the intersection point of all `samples`.
///
/// `ndim` is the number of real axes; at least `ndim` lines are required.
pub fn fit_radial_center(samples: &[GradientSample], ndim: usize) -> Result<RadialFit, FitError> {
    fit_lines(samples.iter(), ndim)
}

/// Fit the intersection point of the samples selected by `indices`.
pub fn fit_radial_center_indexed(
    samples: &[GradientSample],
    indices: &[usize],
    ndim: usize,
) -> Result<RadialFit, FitError> {
    fit_lines(indices.iter().map(|&i| &samples[i]), ndim)
}

fn fit_lines<'a, I>(lines: I, ndim: usize) -> Result<RadialFit, FitError>
where
    I: Iterator<Item = &'a GradientSample> + Clone,
{
    let mut a = Matrix3::<f64>::zeros();
    let mut b = Vector3::<f64>::zeros();
    let mut n = 0usize;
    let mut w_sum = 0.0f64;
    for s in lines.clone() {
        let p = Matrix3::identity() - s.direction * s.direction.transpose();
        a += p * s.weight;
        b += (p * s.position) * s.weight;
        w_sum += s.weight;
        n += 1;
    }
    if n < ndim {
        return Err(FitError::InsufficientSamples { needed: ndim, got: n });
    }
    if !(w_sum.is_finite() && w_sum > 0.0) {
        return Err(FitError::Degenerate);
    }

    let eig = SymmetricEigen::new(a);
    let lambda_max = eig.eigenvalues.max();
    let lambda_min = eig.eigenvalues.min();
    if !lambda_min.is_finite()
        || !lambda_max.is_finite()
        || lambda_min <= MIN_EIGEN_RATIO * lambda_max
    {
        return Err(FitError::Degenerate);
    }

    let position = a
        .cholesky()
        .map(|c| c.solve(&b))
        .ok_or(FitError::Degenerate)?;
    if !position.iter().all(|v| v.is_finite()) {
        return Err(FitError::Degenerate);
    }

    let residual = lines
        .map(|s| s.weight * line_distance(s, &position))
        .sum::<f64>()
        / w_sum;
    Ok(RadialFit { position, residual })
}
