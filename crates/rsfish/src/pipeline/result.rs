/// One localized spot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Spot {
    /// Sub-voxel position, one coordinate per axis (`x, y[, z]`), in voxels.
    pub position: Vec<f64>,
    /// Interpolated raw intensity at `position` minus `background`.
    pub intensity: f64,
    /// Background value subtracted from the intensity (0 when disabled).
    pub background: f64,
    /// Weighted mean line distance of the inliers to the fitted center.
    pub residual: f64,
    /// Number of gradient samples supporting the fit.
    pub num_inliers: usize,
    /// DoG response of the seeding peak.
    pub dog_value: f32,
}

/// Detection outcome for one requested threshold.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThresholdResult {
    /// DoG threshold of this branch.
    pub threshold: f64,
    /// Spots in peak order.
    pub spots: Vec<Spot>,
    /// Set when the branch failed; `spots` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ThresholdResult {
    /// `true` when the branch completed.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}
