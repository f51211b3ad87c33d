//! High-level detection API.
//!
//! [`SpotDetector`] is the primary entry point. It wraps a [`DetectConfig`]
//! and runs the full pipeline on a [`ScalarField`].

use crate::detector::{ConfigError, DetectConfig};
use crate::field::{FieldError, ScalarField};
use crate::peaks::PeakSet;
use crate::pipeline::{self, ThresholdResult};

/// Errors that abort a detection run before any result is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    /// Configuration failed validation.
    Config(ConfigError),
    /// Input field has an unsupported shape.
    Field(FieldError),
    /// The worker pool could not be created.
    ThreadPool(String),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {}", e),
            Self::Field(e) => write!(f, "invalid field: {}", e),
            Self::ThreadPool(msg) => write!(f, "failed to build worker pool: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Field(e) => Some(e),
            Self::ThreadPool(_) => None,
        }
    }
}

impl From<ConfigError> for DetectError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<FieldError> for DetectError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

/// Primary detection interface.
///
/// Create once, detect on many fields.
///
/// # Examples
///
/// ```
/// use rsfish::{ScalarField, SpotDetector};
///
/// let field = ScalarField::new_2d(32, 32, vec![0.0; 32 * 32]).unwrap();
/// let results = SpotDetector::new().detect(&field).unwrap();
/// assert_eq!(results.len(), 1);
/// assert!(results[0].spots.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SpotDetector {
    config: DetectConfig,
}

impl SpotDetector {
    /// Detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: DetectConfig) -> Self {
        Self { config }
    }

    /// Access the current configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut DetectConfig {
        &mut self.config
    }

    /// Detect spots; one result per configured threshold, in configured order.
    pub fn detect(&self, field: &ScalarField) -> Result<Vec<ThresholdResult>, DetectError> {
        pipeline::detect_spots(field, &self.config)
    }

    /// Raw dimensions and samples in one call.
    pub fn detect_raw(&self, dims: &[usize], data: Vec<f32>) -> Result<Vec<ThresholdResult>, DetectError> {
        let field = ScalarField::from_dims(dims, data)?;
        self.detect(&field)
    }

    /// DoG candidates at the lowest configured threshold, without refinement.
    ///
    /// Useful for threshold tuning: `PeakSet::filter` gives the count for any
    /// higher threshold.
    pub fn detect_peaks(&self, field: &ScalarField) -> Result<PeakSet, DetectError> {
        pipeline::detect_peaks(field, &self.config)
    }
}
