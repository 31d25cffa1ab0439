//! Polyphase prototype filters and their partition banks
//!
//! A bank is built once from a lowpass prototype of length
//! `partitions · partition_len`: a normalized sinc, optionally shaped by
//! a 4-term Blackman-Harris window, normalized so the summed prototype
//! gain equals the partition count (unity DC gain per branch). The
//! prototype is then decomposed by striding (partition `n` takes
//! `proto[k·P + n]`) and each partition is time-reversed so the
//! convolution kernels can run a forward multiply-accumulate.
//!
//! The resampler banks default to the plain boxcar sinc; the
//! channelizer banks default to the windowed form.

use crate::cxvec::{sinc, CxVec};
use crate::types::{IQSample, Sample};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Prototype shaping policy, chosen per instance at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterDesign {
    /// Truncated sinc with no window.
    Boxcar,
    /// Sinc shaped by a 4-term Blackman-Harris window.
    BlackmanHarris,
}

// 4-term Blackman-Harris coefficients.
const A0: f32 = 0.35875;
const A1: f32 = 0.48829;
const A2: f32 = 0.14128;
const A3: f32 = 0.01168;

/// A fixed set of time-reversed polyphase partition filters.
#[derive(Debug, Clone)]
pub struct FilterBank {
    partitions: Vec<CxVec>,
    partition_len: usize,
    design: FilterDesign,
}

impl FilterBank {
    /// Build `num_partitions` sub-filters of `partition_len` taps each.
    pub fn new(num_partitions: usize, partition_len: usize, design: FilterDesign) -> Self {
        let proto = Self::prototype(num_partitions, partition_len, design);
        let m = num_partitions;

        let mut partitions: Vec<CxVec> = (0..m).map(|_| CxVec::real_taps(partition_len)).collect();
        for (n, part) in partitions.iter_mut().enumerate() {
            for (k, tap) in part.data_mut().iter_mut().enumerate() {
                *tap = IQSample::new(proto[k * m + n], 0.0);
            }
            part.reverse();
        }

        Self {
            partitions,
            partition_len,
            design,
        }
    }

    /// The normalized prototype filter the bank decomposes.
    ///
    /// Gain is scaled so the coefficients sum to `num_partitions`.
    pub fn prototype(num_partitions: usize, partition_len: usize, design: FilterDesign) -> Vec<Sample> {
        let len = num_partitions * partition_len;
        let midpt = (len / 2) as f32;
        let mut proto: Vec<Sample> = (0..len)
            .map(|i| {
                let s = sinc((i as f32 - midpt) / num_partitions as f32);
                match design {
                    FilterDesign::Boxcar => s,
                    FilterDesign::BlackmanHarris => {
                        let x = i as f32 / (len - 1) as f32;
                        s * (A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
                            - A3 * (6.0 * PI * x).cos())
                    }
                }
            })
            .collect();

        let sum: f32 = proto.iter().sum();
        let scale = num_partitions as f32 / sum;
        for p in proto.iter_mut() {
            *p *= scale;
        }
        proto
    }

    #[inline]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub fn partition_len(&self) -> usize {
        self.partition_len
    }

    #[inline]
    pub fn design(&self) -> FilterDesign {
        self.design
    }

    /// Partition `n`, time-reversed, real-only.
    #[inline]
    pub fn partition(&self, n: usize) -> &CxVec {
        &self.partitions[n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_prototype_gain() {
        for design in [FilterDesign::Boxcar, FilterDesign::BlackmanHarris] {
            let proto = FilterBank::prototype(8, 16, design);
            let sum: f32 = proto.iter().sum();
            assert_relative_eq!(sum, 8.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_partitions_are_strided_reversed_prototype() {
        let m = 8;
        let l = 12;
        let bank = FilterBank::new(m, l, FilterDesign::BlackmanHarris);
        let proto = FilterBank::prototype(m, l, FilterDesign::BlackmanHarris);
        for n in 0..m {
            let part = bank.partition(n);
            assert!(part.is_real_only());
            for k in 0..l {
                assert_relative_eq!(
                    part.data()[k].re,
                    proto[(l - 1 - k) * m + n],
                    epsilon = 1e-6
                );
                assert_eq!(part.data()[k].im, 0.0);
            }
        }
    }

    #[test]
    fn test_branch_dc_gain_is_unity() {
        let bank = FilterBank::new(4, 16, FilterDesign::BlackmanHarris);
        for n in 0..4 {
            let gain: f32 = bank.partition(n).data().iter().map(|t| t.re).sum();
            assert_relative_eq!(gain, 1.0, epsilon = 0.15);
        }
    }

    #[test]
    fn test_boxcar_identity_partition() {
        // P=1, 4 taps: the prototype is a sampled sinc with its peak at
        // the midpoint, so the single reversed partition is a delayed
        // delta.
        let bank = FilterBank::new(1, 4, FilterDesign::Boxcar);
        let part = bank.partition(0);
        assert_relative_eq!(part.data()[1].re, 1.0, epsilon = 1e-4);
        assert_relative_eq!(part.data()[0].re, 0.0, epsilon = 1e-4);
        assert_relative_eq!(part.data()[3].re, 0.0, epsilon = 1e-4);
    }
}
