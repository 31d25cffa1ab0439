//! Batched M-point DFT plans
//!
//! Thin wrapper over `rustfft` that plans a fixed-length transform once
//! and then executes it over every consecutive M-sample group of an
//! interleaved buffer. The channelizer lays its M branch streams out
//! time-major (`buf[j*M + branch]`), so one execute call transforms all
//! `chunk` positions of a block in place.
//!
//! Plans are per-instance state: each channelizer and combiner owns its
//! own plan and scratch buffer, and nothing in this module is global.

use crate::types::{DspError, DspResult, IQSample};
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Transform direction, fixed at plan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// A reusable DFT plan over interleaved M-sample groups.
pub struct DftPlan {
    size: usize,
    direction: Direction,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<IQSample>,
}

impl fmt::Debug for DftPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DftPlan")
            .field("size", &self.size)
            .field("direction", &self.direction)
            .finish()
    }
}

impl DftPlan {
    /// Plan a transform of `size` points. Creation amortizes over many
    /// executes; keep the plan alive with the filter bank it serves.
    pub fn new(size: usize, direction: Direction) -> Self {
        let mut planner = FftPlanner::new();
        let fft = match direction {
            Direction::Forward => planner.plan_fft_forward(size),
            Direction::Inverse => planner.plan_fft_inverse(size),
        };
        let scratch = vec![IQSample::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            size,
            direction,
            fft,
            scratch,
        }
    }

    /// Transform size in points.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Transform every consecutive `size`-sample group of `buf` in
    /// place. The buffer length must be a multiple of the plan size.
    /// Inverse plans normalize by 1/size; forward plans do not scale.
    ///
    /// Returns the number of groups transformed.
    pub fn execute(&mut self, buf: &mut [IQSample]) -> DspResult<usize> {
        if buf.len() % self.size != 0 {
            return Err(DspError::LengthNotMultiple {
                len: buf.len(),
                mult: self.size,
            });
        }
        self.fft.process_with_scratch(buf, &mut self.scratch);
        if self.direction == Direction::Inverse {
            let scale = 1.0 / self.size as f32;
            for s in buf.iter_mut() {
                *s *= scale;
            }
        }
        Ok(buf.len() / self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_delta_is_flat() {
        let mut plan = DftPlan::new(4, Direction::Forward);
        let mut buf = vec![IQSample::new(0.0, 0.0); 4];
        buf[0] = IQSample::new(1.0, 0.0);
        assert_eq!(plan.execute(&mut buf).unwrap(), 1);
        for s in &buf {
            assert_relative_eq!(s.re, 1.0, epsilon = 1e-6);
            assert_relative_eq!(s.im, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_inverse_normalizes() {
        // Inverse of [4, 0, 0, 0] is [1, 1, 1, 1].
        let mut plan = DftPlan::new(4, Direction::Inverse);
        let mut buf = vec![IQSample::new(0.0, 0.0); 4];
        buf[0] = IQSample::new(4.0, 0.0);
        plan.execute(&mut buf).unwrap();
        for s in &buf {
            assert_relative_eq!(s.re, 1.0, epsilon = 1e-6);
            assert_relative_eq!(s.im, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_batched_groups_are_independent() {
        let mut plan = DftPlan::new(4, Direction::Forward);
        let mut buf = vec![IQSample::new(0.0, 0.0); 12];
        buf[0] = IQSample::new(1.0, 0.0); // group 0: delta
        buf[5] = IQSample::new(1.0, 0.0); // group 1: shifted delta
        assert_eq!(plan.execute(&mut buf).unwrap(), 3);
        // Group 0 flat, group 2 all zero.
        for k in 0..4 {
            assert_relative_eq!(buf[k].re, 1.0, epsilon = 1e-6);
            assert_relative_eq!(buf[8 + k].norm(), 0.0, epsilon = 1e-6);
        }
        // Group 1: twiddle magnitudes all one.
        for k in 0..4 {
            assert_relative_eq!(buf[4 + k].norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejects_ragged_buffer() {
        let mut plan = DftPlan::new(8, Direction::Forward);
        let mut buf = vec![IQSample::new(0.0, 0.0); 12];
        assert!(plan.execute(&mut buf).is_err());
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        let mut fwd = DftPlan::new(8, Direction::Forward);
        let mut inv = DftPlan::new(8, Direction::Inverse);
        let orig: Vec<IQSample> = (0..8)
            .map(|i| IQSample::new(i as f32, -(i as f32) * 0.5))
            .collect();
        let mut buf = orig.clone();
        fwd.execute(&mut buf).unwrap();
        inv.execute(&mut buf).unwrap();
        for (a, b) in buf.iter().zip(&orig) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-4);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-4);
        }
    }
}
