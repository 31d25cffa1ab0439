//! Core types for the multichannel transceiver DSP chain
//!
//! All signal arithmetic in this crate runs on interleaved complex
//! baseband samples in single precision. This module defines the sample
//! aliases, the error type shared by every DSP stage, and a handful of
//! helpers for building test and calibration signals.

use num_complex::Complex32;
use std::f32::consts::PI;

/// A single complex baseband sample (I = real, Q = imaginary).
pub type IQSample = Complex32;

/// A real-valued sample.
pub type Sample = f32;

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;

/// Errors surfaced by the DSP core.
///
/// Length-contract violations and invalid channel selections are
/// programming errors on the caller's side; they leave the filter state
/// untouched so the stream can continue once the call is corrected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DspError {
    #[error("invalid length {len}: not a multiple of {mult}")]
    LengthNotMultiple { len: usize, mult: usize },

    #[error("input/output block count mismatch: {input} vs {output}")]
    BlockMismatch { input: usize, output: usize },

    #[error("block length {0} exceeds maximum output block")]
    BlockTooLarge(usize),

    #[error("length mismatch: {a} vs {b}")]
    LengthMismatch { a: usize, b: usize },

    #[error("insufficient headroom: have {have}, need {need}")]
    InsufficientHeadroom { have: usize, need: usize },

    #[error("window [{start}, {start}+{len}) exceeds buffer of {cap}")]
    WindowOutOfBounds { start: usize, len: usize, cap: usize },

    #[error("invalid decimation index {idx} for rate {decim}")]
    InvalidDecimation { idx: usize, decim: usize },

    #[error("invalid channel {0}")]
    InvalidChannel(usize),

    #[error("channel {0} already active")]
    ChannelActive(usize),

    #[error("channel {0} not active")]
    ChannelInactive(usize),

    #[error("filter taps must be declared real-only")]
    TapsNotReal,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("device transfer short: {got} of {want} samples")]
    DeviceShort { got: usize, want: usize },
}

/// Helper functions for working with complex samples.
pub mod complex_ops {
    use super::*;

    /// Create a complex sample from magnitude and phase.
    #[inline]
    pub fn from_polar(magnitude: f32, phase: f32) -> IQSample {
        IQSample::new(magnitude * phase.cos(), magnitude * phase.sin())
    }

    /// Complex exponential at a normalized frequency (cycles per sample).
    ///
    /// Returns `e^(j·2π·freq·idx)`; the building block for test tones.
    #[inline]
    pub fn cis(freq: f32, idx: usize) -> IQSample {
        let phase = 2.0 * PI * freq * idx as f32;
        IQSample::new(phase.cos(), phase.sin())
    }

    /// Average power (mean |z|²) of a sample block.
    pub fn average_power(samples: &[IQSample]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32
    }

    /// Root-mean-square amplitude of a sample block.
    pub fn rms(samples: &[IQSample]) -> f32 {
        average_power(samples).sqrt()
    }

    /// Power ratio in decibels.
    pub fn power_db(power: f32, reference: f32) -> f32 {
        10.0 * (power / reference).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_polar() {
        let c = complex_ops::from_polar(1.0, PI / 4.0);
        assert_relative_eq!(c.re, 0.70710677, epsilon = 1e-6);
        assert_relative_eq!(c.im, 0.70710677, epsilon = 1e-6);
    }

    #[test]
    fn test_cis_unit_magnitude() {
        for i in 0..64 {
            let c = complex_ops::cis(0.13, i);
            assert_relative_eq!(c.norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_average_power() {
        let samples = vec![
            IQSample::new(1.0, 0.0),
            IQSample::new(0.0, 1.0),
            IQSample::new(-1.0, 0.0),
            IQSample::new(0.0, -1.0),
        ];
        assert_relative_eq!(complex_ops::average_power(&samples), 1.0, epsilon = 1e-6);
        assert_relative_eq!(complex_ops::rms(&samples), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_power() {
        assert_eq!(complex_ops::average_power(&[]), 0.0);
    }
}
