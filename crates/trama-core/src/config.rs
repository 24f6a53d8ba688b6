//! Engine configuration.
//!
//! A [`GraphConfig`] is built once before rendering starts and owned by
//! the render context. There is no global mutable state: everything a
//! node needs at render time (sample rate, its reciprocal, the
//! control-rate period) travels with the context.

use core::fmt;

/// Default number of samples per control-rate period.
pub const DEFAULT_CONTROL_BLOCK_SIZE: usize = 64;

/// Immutable per-engine configuration.
///
/// `block_size` is an estimate used for pre-sizing buffers; the actual
/// size of each render pass is taken from the host buffers, and event
/// units regularly prepare sub-blocks smaller than this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphConfig {
    sample_rate: f64,
    reciprocal_sample_rate: f64,
    block_size: usize,
    control_block_size: usize,
}

impl GraphConfig {
    /// Creates a configuration with the default control-rate period.
    ///
    /// # Errors
    /// Returns an error if `sample_rate` is not a positive finite
    /// number or `block_size` is zero.
    pub fn new(sample_rate: f64, block_size: usize) -> Result<Self, ConfigError> {
        Self::with_control_block_size(sample_rate, block_size, DEFAULT_CONTROL_BLOCK_SIZE)
    }

    /// Creates a configuration with an explicit control-rate period.
    ///
    /// # Errors
    /// Returns an error if any argument is out of range.
    pub fn with_control_block_size(
        sample_rate: f64,
        block_size: usize,
        control_block_size: usize,
    ) -> Result<Self, ConfigError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        if block_size == 0 {
            return Err(ConfigError::InvalidBlockSize(block_size));
        }
        if control_block_size == 0 {
            return Err(ConfigError::InvalidControlBlockSize(control_block_size));
        }
        Ok(Self {
            sample_rate,
            reciprocal_sample_rate: sample_rate.recip(),
            block_size,
            control_block_size,
        })
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Cached `1.0 / sample_rate`.
    #[must_use]
    pub fn reciprocal_sample_rate(&self) -> f64 {
        self.reciprocal_sample_rate
    }

    /// Estimated samples per render pass.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Samples per control-rate period.
    #[must_use]
    pub fn control_block_size(&self) -> usize {
        self.control_block_size
    }
}

/// Errors from [`GraphConfig`] construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Sample rate was zero, negative, or not finite.
    InvalidSampleRate(f64),
    /// Block size was zero.
    InvalidBlockSize(usize),
    /// Control-rate block size was zero.
    InvalidControlBlockSize(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSampleRate(rate) => {
                write!(f, "sample rate must be positive and finite, got {rate}")
            }
            ConfigError::InvalidBlockSize(size) => {
                write!(f, "block size must be non-zero, got {size}")
            }
            ConfigError::InvalidControlBlockSize(size) => {
                write!(f, "control block size must be non-zero, got {size}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_arguments() {
        assert!(GraphConfig::new(44_100.0, 512).is_ok());
        assert_eq!(
            GraphConfig::new(0.0, 512),
            Err(ConfigError::InvalidSampleRate(0.0))
        );
        assert_eq!(
            GraphConfig::new(44_100.0, 0),
            Err(ConfigError::InvalidBlockSize(0))
        );
        assert_eq!(
            GraphConfig::with_control_block_size(44_100.0, 512, 0),
            Err(ConfigError::InvalidControlBlockSize(0))
        );
    }

    #[test]
    fn caches_reciprocal() {
        let config = GraphConfig::new(48_000.0, 256).unwrap();
        assert!((config.reciprocal_sample_rate() - 1.0 / 48_000.0).abs() < 1e-15);
        assert_eq!(config.control_block_size(), DEFAULT_CONTROL_BLOCK_SIZE);
    }
}
