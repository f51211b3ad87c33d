//! Dense 2D/3D intensity field with mirror boundary extension.
//!
//! Samples are stored x-fastest (`x + y·w + z·w·h`). Two-dimensional fields
//! are kept internally as a single z-slice so that every stage can iterate
//! over `[x, y, z]` uniformly; [`ScalarField::ndim`] tells which axes are real.

/// Errors raised when building a field from caller data.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Only 2D and 3D fields are supported.
    UnsupportedDimensionality(usize),
    /// One of the axes has zero extent.
    EmptyExtent {
        /// Axis index with zero extent.
        axis: usize,
    },
    /// Sample buffer does not match the product of the extents.
    LengthMismatch {
        /// Expected number of samples.
        expected: usize,
        /// Provided number of samples.
        got: usize,
    },
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedDimensionality(n) => {
                write!(f, "unsupported dimensionality {} (expected 2 or 3)", n)
            }
            Self::EmptyExtent { axis } => write!(f, "axis {} has zero extent", axis),
            Self::LengthMismatch { expected, got } => {
                write!(f, "sample count mismatch: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Read-only n-dimensional field of real intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    dims: [usize; 3],
    ndim: usize,
    data: Vec<f32>,
}

impl ScalarField {
    /// Build a field from per-axis extents (`[w, h]` or `[w, h, d]`) and samples.
    pub fn from_dims(dims: &[usize], data: Vec<f32>) -> Result<Self, FieldError> {
        let ndim = dims.len();
        if !(2..=3).contains(&ndim) {
            return Err(FieldError::UnsupportedDimensionality(ndim));
        }
        if let Some(axis) = dims.iter().position(|&n| n == 0) {
            return Err(FieldError::EmptyExtent { axis });
        }
        let mut full = [1usize; 3];
        full[..ndim].copy_from_slice(dims);
        let expected = full.iter().product::<usize>();
        if data.len() != expected {
            return Err(FieldError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            dims: full,
            ndim,
            data,
        })
    }

    /// Build a 2D field (`width × height`, row-major).
    pub fn new_2d(width: usize, height: usize, data: Vec<f32>) -> Result<Self, FieldError> {
        Self::from_dims(&[width, height], data)
    }

    /// Build a 3D field (`width × height × depth`, x-fastest).
    pub fn new_3d(
        width: usize,
        height: usize,
        depth: usize,
        data: Vec<f32>,
    ) -> Result<Self, FieldError> {
        Self::from_dims(&[width, height, depth], data)
    }

    /// Number of real axes (2 or 3).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Extent of each real axis.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.ndim]
    }

    /// Extents padded to three axes (`depth == 1` for 2D fields).
    #[inline]
    pub(crate) fn dims3(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the field holds no samples (never the case for a valid field).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw sample buffer, x-fastest.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub(crate) fn index(&self, pos: [usize; 3]) -> usize {
        pos[0] + self.dims[0] * (pos[1] + self.dims[1] * pos[2])
    }

    /// In-bounds sample access.
    #[inline]
    pub fn get(&self, pos: [usize; 3]) -> f32 {
        self.data[self.index(pos)]
    }

    /// Sample access with mirror-single extension outside the field.
    #[inline]
    pub fn get_mirrored(&self, pos: [i64; 3]) -> f32 {
        let p = [
            mirror_index(pos[0], self.dims[0]),
            mirror_index(pos[1], self.dims[1]),
            mirror_index(pos[2], self.dims[2]),
        ];
        self.data[self.index(p)]
    }

    /// N-linear interpolation at a real-valued position (one coordinate per
    /// real axis). Neighbours outside the field are mirrored.
    pub fn interpolate(&self, position: &[f64]) -> f64 {
        let mut base = [0i64; 3];
        let mut frac = [0.0f64; 3];
        for (axis, &c) in position.iter().take(self.ndim).enumerate() {
            let f = c.floor();
            base[axis] = f as i64;
            frac[axis] = c - f;
        }

        let corners = 1usize << self.ndim;
        let mut acc = 0.0f64;
        for corner in 0..corners {
            let mut w = 1.0f64;
            let mut p = base;
            for axis in 0..self.ndim {
                if corner & (1 << axis) != 0 {
                    p[axis] += 1;
                    w *= frac[axis];
                } else {
                    w *= 1.0 - frac[axis];
                }
            }
            if w != 0.0 {
                acc += w * self.get_mirrored(p) as f64;
            }
        }
        acc
    }

    /// Minimum and maximum finite sample values, or `None` when no sample is finite.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut range: Option<(f32, f32)> = None;
        for &v in self.data.iter().filter(|v| v.is_finite()) {
            range = Some(match range {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        range
    }

    /// Copy rescaled to `(v - min) / (max - min)`; a flat range maps to zero.
    pub(crate) fn normalized(&self, min: f64, max: f64) -> Self {
        let range = max - min;
        let data = if range > 0.0 && range.is_finite() {
            self.data
                .iter()
                .map(|&v| ((v as f64 - min) / range) as f32)
                .collect()
        } else {
            vec![0.0; self.data.len()]
        };
        self.with_data(data)
    }

    /// New field with the same shape and the given samples.
    pub(crate) fn with_data(&self, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            dims: self.dims,
            ndim: self.ndim,
            data,
        }
    }
}

/// Reflect an index into `0..n` without repeating the border sample
/// (`-1 → 1`, `n → n - 2`).
#[inline]
pub(crate) fn mirror_index(i: i64, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as i64 - 1);
    let mut m = i.rem_euclid(period);
    if m >= n as i64 {
        m = period - m;
    }
    m as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mirror_index_reflects_without_repeating_border() {
        assert_eq!(mirror_index(-1, 5), 1);
        assert_eq!(mirror_index(-2, 5), 2);
        assert_eq!(mirror_index(5, 5), 3);
        assert_eq!(mirror_index(6, 5), 2);
        assert_eq!(mirror_index(8, 5), 0);
        assert_eq!(mirror_index(-7, 1), 0);
        assert_eq!(mirror_index(3, 5), 3);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(
            ScalarField::from_dims(&[4], vec![0.0; 4]),
            Err(FieldError::UnsupportedDimensionality(1))
        );
        assert_eq!(
            ScalarField::new_2d(0, 3, Vec::new()),
            Err(FieldError::EmptyExtent { axis: 0 })
        );
        assert_eq!(
            ScalarField::new_3d(2, 2, 2, vec![0.0; 7]),
            Err(FieldError::LengthMismatch {
                expected: 8,
                got: 7
            })
        );
    }

    #[test]
    fn mirrored_reads_match_in_bounds_samples() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let f = ScalarField::new_2d(4, 3, data).expect("valid field");
        assert_eq!(f.ndim(), 2);
        assert_eq!(f.dims(), &[4, 3]);
        assert_eq!(f.get_mirrored([-1, 0, 0]), f.get([1, 0, 0]));
        assert_eq!(f.get_mirrored([4, 2, 0]), f.get([2, 2, 0]));
        assert_eq!(f.get_mirrored([0, -1, 5]), f.get([0, 1, 0]));
    }

    #[test]
    fn interpolation_is_exact_on_linear_ramp() {
        let (w, h, d) = (5usize, 4usize, 3usize);
        let mut data = Vec::with_capacity(w * h * d);
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    data.push(x as f32 + 2.0 * y as f32 + 3.0 * z as f32);
                }
            }
        }
        let f = ScalarField::new_3d(w, h, d, data).expect("valid field");
        let v = f.interpolate(&[1.25, 2.5, 0.75]);
        assert_relative_eq!(v, 1.25 + 5.0 + 2.25, epsilon = 1e-9);
        assert_relative_eq!(f.interpolate(&[4.0, 3.0, 2.0]), 16.0, epsilon = 1e-9);
    }

    #[test]
    fn normalization_maps_range_to_unit_interval() {
        let f = ScalarField::new_2d(2, 2, vec![10.0, 20.0, 30.0, 50.0]).expect("valid field");
        assert_eq!(f.min_max(), Some((10.0, 50.0)));
        let n = f.normalized(10.0, 50.0);
        assert_eq!(n.as_slice(), &[0.0, 0.25, 0.5, 1.0]);

        let flat = f.normalized(3.0, 3.0);
        assert!(flat.as_slice().iter().all(|&v| v == 0.0));
    }
}
