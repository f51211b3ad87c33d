use crate::background::BackgroundConfig;
use crate::dog::DogConfig;
use crate::ransac::{RansacConfig, RansacMode};

/// Invalid configuration, reported before any computation starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// DoG sigma must be finite and positive.
    InvalidSigma(f64),
    /// Anisotropy factor must be finite and positive.
    InvalidAnisotropy(f64),
    /// No detection threshold was requested.
    EmptyThresholds,
    /// Thresholds must be finite and positive.
    InvalidThreshold(f64),
    /// Support radius must be at least 1.
    ZeroSupportRadius,
    /// An inlier ratio is outside `(0, 1]`.
    InvalidInlierRatio { field: &'static str, value: f64 },
    /// A max-error tolerance is not finite and positive.
    InvalidMaxError { field: &'static str, value: f64 },
    /// RANSAC needs at least one iteration.
    ZeroIterations,
    /// Multiconsensus needs at least one inlier per spot.
    ZeroMinInliers,
    /// Standard-deviation factors must be finite and non-negative.
    InvalidStdevFactor(f64),
    /// Intensity range must be finite with `min < max`.
    InvalidIntensityRange([f64; 2]),
    /// Intensity threshold must be finite.
    InvalidIntensityThreshold(f64),
    /// Worker count must be at least 1.
    ZeroThreads,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSigma(v) => write!(f, "sigma must be finite and > 0 (got {})", v),
            Self::InvalidAnisotropy(v) => {
                write!(f, "anisotropy must be finite and > 0 (got {})", v)
            }
            Self::EmptyThresholds => write!(f, "at least one threshold is required"),
            Self::InvalidThreshold(v) => {
                write!(f, "thresholds must be finite and > 0 (got {})", v)
            }
            Self::ZeroSupportRadius => write!(f, "support radius must be >= 1"),
            Self::InvalidInlierRatio { field, value } => {
                write!(f, "{} must be in (0, 1] (got {})", field, value)
            }
            Self::InvalidMaxError { field, value } => {
                write!(f, "{} must be finite and > 0 (got {})", field, value)
            }
            Self::ZeroIterations => write!(f, "RANSAC iterations must be >= 1"),
            Self::ZeroMinInliers => write!(f, "multiconsensus min inliers must be >= 1"),
            Self::InvalidStdevFactor(v) => {
                write!(f, "stddev factors must be finite and >= 0 (got {})", v)
            }
            Self::InvalidIntensityRange([lo, hi]) => {
                write!(f, "intensity range must be finite with min < max (got [{}, {}])", lo, hi)
            }
            Self::InvalidIntensityThreshold(v) => {
                write!(f, "intensity threshold must be finite (got {})", v)
            }
            Self::ZeroThreads => write!(f, "num_threads must be >= 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level spot detection configuration.
///
/// Defaults follow the RS-FISH command-line defaults.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Difference-of-Gaussian parameters.
    pub dog: DogConfig,
    /// Ratio of z voxel spacing to xy voxel spacing.
    pub anisotropy: f64,
    /// DoG thresholds; one result is produced per entry, in this order.
    pub thresholds: Vec<f64>,
    /// Fixed `[min, max]` intensity normalization range; computed from the
    /// image when `None`.
    pub intensity_range: Option<[f64; 2]>,
    /// Half-width (voxels) of the gradient support region around each peak.
    pub support_radius: usize,
    /// Outlier-robust refinement.
    pub ransac: RansacConfig,
    /// Local background subtraction.
    pub background: BackgroundConfig,
    /// Spots with a lower background-subtracted intensity are dropped.
    pub intensity_threshold: f64,
    /// Worker threads for the run.
    pub num_threads: usize,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            dog: DogConfig::default(),
            anisotropy: 1.0,
            thresholds: vec![0.007],
            intensity_range: None,
            support_radius: 3,
            ransac: RansacConfig::default(),
            background: BackgroundConfig::default(),
            intensity_threshold: 0.0,
            num_threads: 1,
        }
    }
}

impl DetectConfig {
    /// Smallest requested threshold, used for the single peak extraction pass.
    pub fn min_threshold(&self) -> Option<f64> {
        self.thresholds.iter().copied().reduce(f64::min)
    }

    /// Check every parameter; the first violation is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dog.sigma.is_finite() && self.dog.sigma > 0.0) {
            return Err(ConfigError::InvalidSigma(self.dog.sigma));
        }
        if !(self.anisotropy.is_finite() && self.anisotropy > 0.0) {
            return Err(ConfigError::InvalidAnisotropy(self.anisotropy));
        }
        if self.thresholds.is_empty() {
            return Err(ConfigError::EmptyThresholds);
        }
        if let Some(&t) = self.thresholds.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        if self.support_radius == 0 {
            return Err(ConfigError::ZeroSupportRadius);
        }

        check_ratio("ransac.inlier_ratio", self.ransac.inlier_ratio)?;
        check_max_error("ransac.max_error", self.ransac.max_error)?;
        if self.ransac.mode != RansacMode::Off && self.ransac.num_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.ransac.mode == RansacMode::MultiConsensus {
            let multi = &self.ransac.multi;
            if multi.min_num_inliers == 0 {
                return Err(ConfigError::ZeroMinInliers);
            }
            for v in [multi.n_times_stdev_initial, multi.n_times_stdev_final] {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(ConfigError::InvalidStdevFactor(v));
                }
            }
        }

        check_ratio("background.inlier_ratio", self.background.inlier_ratio)?;
        check_max_error("background.max_error", self.background.max_error)?;

        if let Some([lo, hi]) = self.intensity_range {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(ConfigError::InvalidIntensityRange([lo, hi]));
            }
        }
        if !self.intensity_threshold.is_finite() {
            return Err(ConfigError::InvalidIntensityThreshold(self.intensity_threshold));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        Ok(())
    }
}

fn check_ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidInlierRatio { field, value })
    }
}

fn check_max_error(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMaxError { field, value })
    }
}
