//! Complex signal vectors with convolution headroom
//!
//! Every stage of the transceiver chain passes samples around in a
//! [`CxVec`]: an owned buffer of complex samples with a *headroom*
//! prefix reserved in front of the logical data. Causal FIR kernels read
//! up to `taps - 1` samples to the left of logical index zero, so a
//! caller copies filter history into the headroom before convolving and
//! the kernel never needs a bounds branch in its inner loop.
//!
//! ```text
//!   buf: [ h h h h | d d d d d d d d d d ... ]
//!          headroom   data (start..start+len)
//! ```
//!
//! The buffer is owned by exactly one `CxVec`. Windowing (`set_window`,
//! `shift_start`) re-aims the data region inside the buffer without
//! copying, which is how the radio layer slides per-channel cursors.
//!
//! ## Example
//!
//! ```rust
//! use rustrx_core::cxvec::CxVec;
//! use rustrx_core::types::IQSample;
//!
//! let mut v = CxVec::with_headroom(8, 4);
//! assert_eq!(v.len(), 8);
//! assert_eq!(v.headroom(), 4);
//! v.data_mut()[0] = IQSample::new(1.0, -1.0);
//! v.reset();
//! assert_eq!(v.data()[0], IQSample::new(0.0, 0.0));
//! ```

use crate::types::{DspError, DspResult, IQSample};
use std::f32::consts::PI;

/// Normalized sinc, `sin(πx)/(πx)`, with `sinc(0) = 1`.
///
/// Basis of every prototype filter in the crate.
#[inline]
pub fn sinc(x: f32) -> f32 {
    if x == 0.0 {
        return 1.0;
    }
    (PI * x).sin() / (PI * x)
}

/// An owned complex vector with headroom for causal convolution.
#[derive(Debug, Clone)]
pub struct CxVec {
    buf: Vec<IQSample>,
    start: usize,
    len: usize,
    real_only: bool,
}

impl CxVec {
    /// Allocate a zeroed vector of `len` samples with no headroom.
    pub fn new(len: usize) -> Self {
        Self::with_headroom(len, 0)
    }

    /// Allocate a zeroed vector of `len` samples preceded by `headroom`
    /// history slots.
    pub fn with_headroom(len: usize, headroom: usize) -> Self {
        Self {
            buf: vec![IQSample::new(0.0, 0.0); headroom + len],
            start: headroom,
            len,
            real_only: false,
        }
    }

    /// Allocate a zeroed tap vector declared real-only, as the
    /// convolution kernels require.
    pub fn real_taps(len: usize) -> Self {
        Self {
            buf: vec![IQSample::new(0.0, 0.0); len],
            start: 0,
            len,
            real_only: true,
        }
    }

    /// Build a vector from existing samples (no headroom).
    pub fn from_samples(samples: &[IQSample]) -> Self {
        Self {
            buf: samples.to_vec(),
            start: 0,
            len: samples.len(),
            real_only: false,
        }
    }

    /// Number of live samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Headroom slots in front of the data region.
    #[inline]
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// Total allocated slots, headroom included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether the imaginary parts are declared zero.
    #[inline]
    pub fn is_real_only(&self) -> bool {
        self.real_only
    }

    /// The live data region.
    #[inline]
    pub fn data(&self) -> &[IQSample] {
        &self.buf[self.start..self.start + self.len]
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [IQSample] {
        &mut self.buf[self.start..self.start + self.len]
    }

    /// The headroom region preceding the data.
    #[inline]
    pub fn headroom_mut(&mut self) -> &mut [IQSample] {
        &mut self.buf[..self.start]
    }

    /// Copy `hist` into the trailing slots of the headroom so that a
    /// following convolution reads it as the left extension of the data.
    pub fn load_history(&mut self, hist: &[IQSample]) -> DspResult<()> {
        if hist.len() > self.start {
            return Err(DspError::InsufficientHeadroom {
                have: self.start,
                need: hist.len(),
            });
        }
        let start = self.start;
        self.buf[start - hist.len()..start].copy_from_slice(hist);
        Ok(())
    }

    /// Last `n` live samples; the usual source of saved history.
    pub fn tail(&self, n: usize) -> DspResult<&[IQSample]> {
        if n > self.len {
            return Err(DspError::LengthMismatch { a: n, b: self.len });
        }
        Ok(&self.data()[self.len - n..])
    }

    /// Last `n` samples of the stream as extended by the headroom: the
    /// slice ending at the end of the data region, reaching left into
    /// the headroom when the block is shorter than `n`.
    pub fn trailing(&self, n: usize) -> DspResult<&[IQSample]> {
        let end = self.start + self.len;
        if n > end {
            return Err(DspError::InsufficientHeadroom {
                have: end,
                need: n,
            });
        }
        Ok(&self.buf[end - n..end])
    }

    /// The convolution span for a block convolution producing `out_len`
    /// samples with `taps` coefficients: the slice starting `taps - 1`
    /// samples left of logical zero, `out_len + taps - 1` long.
    pub fn conv_span(&self, out_len: usize, taps: usize) -> DspResult<&[IQSample]> {
        if taps == 0 || self.start + 1 < taps {
            return Err(DspError::InsufficientHeadroom {
                have: self.start,
                need: taps.saturating_sub(1),
            });
        }
        if out_len > self.len {
            return Err(DspError::LengthMismatch {
                a: out_len,
                b: self.len,
            });
        }
        Ok(&self.buf[self.start + 1 - taps..self.start + out_len])
    }

    /// The `taps`-sample window ending at logical index `cursor`, used
    /// by the single-point convolution.
    pub fn tap_window(&self, cursor: usize, taps: usize) -> DspResult<&[IQSample]> {
        if cursor >= self.len {
            return Err(DspError::LengthMismatch {
                a: cursor,
                b: self.len,
            });
        }
        if taps == 0 || self.start + cursor + 1 < taps {
            return Err(DspError::InsufficientHeadroom {
                have: self.start + cursor,
                need: taps.saturating_sub(1),
            });
        }
        let end = self.start + cursor + 1;
        Ok(&self.buf[end - taps..end])
    }

    /// Zero the entire buffer, headroom included.
    pub fn reset(&mut self) {
        self.buf.fill(IQSample::new(0.0, 0.0));
    }

    /// Copy the data region of `src` into this vector. Headroom is not
    /// copied. Lengths must match.
    pub fn copy_from(&mut self, src: &CxVec) -> DspResult<usize> {
        if src.len != self.len {
            return Err(DspError::LengthMismatch {
                a: src.len,
                b: self.len,
            });
        }
        let n = self.len;
        self.data_mut().copy_from_slice(src.data());
        Ok(n)
    }

    /// Re-aim the data region inside the buffer.
    pub fn set_window(&mut self, start: usize, len: usize) -> DspResult<()> {
        if start + len > self.buf.len() {
            return Err(DspError::WindowOutOfBounds {
                start,
                len,
                cap: self.buf.len(),
            });
        }
        self.start = start;
        self.len = len;
        Ok(())
    }

    /// Shift the logical start by a signed offset, keeping the length.
    pub fn shift_start(&mut self, delta: isize) -> DspResult<()> {
        let new_start = self.start as isize + delta;
        if new_start < 0 {
            return Err(DspError::InsufficientHeadroom {
                have: self.start,
                need: delta.unsigned_abs(),
            });
        }
        let new_start = new_start as usize;
        if new_start + self.len > self.buf.len() {
            return Err(DspError::WindowOutOfBounds {
                start: new_start,
                len: self.len,
                cap: self.buf.len(),
            });
        }
        self.start = new_start;
        Ok(())
    }

    /// Move the data in `[n, count)` down to logical index 0. Used by
    /// the transmit path to rewind unsent samples after a push.
    pub fn shift_tail(&mut self, n: usize, count: usize) -> DspResult<()> {
        if n > count || count > self.len {
            return Err(DspError::LengthMismatch { a: n, b: count });
        }
        self.data_mut().copy_within(n..count, 0);
        Ok(())
    }

    /// Reverse the data region in place.
    pub fn reverse(&mut self) {
        self.data_mut().reverse();
    }

    /// Reverse and conjugate the data region in place. For real-only
    /// vectors this is identical to [`reverse`](Self::reverse).
    pub fn reverse_conj(&mut self) {
        self.data_mut().reverse();
        for s in self.data_mut() {
            s.im = -s.im;
        }
    }

    /// Keep every `decim`-th sample starting at `idx`, writing into
    /// `out`. Returns the number of output samples.
    pub fn decimate_into(&self, out: &mut CxVec, idx: usize, decim: usize) -> DspResult<usize> {
        if decim == 0 || idx >= decim {
            return Err(DspError::InvalidDecimation { idx, decim });
        }
        if self.len % decim != 0 {
            return Err(DspError::LengthNotMultiple {
                len: self.len,
                mult: decim,
            });
        }
        let n = self.len / decim;
        if out.len < n {
            return Err(DspError::LengthMismatch { a: n, b: out.len });
        }
        let src = self.data();
        let dst = out.data_mut();
        for i in 0..n {
            dst[i] = src[decim * i + idx];
        }
        Ok(n)
    }
}

/// Element-wise `a - b` into `out`. All three must share a length.
pub fn subtract(a: &CxVec, b: &CxVec, out: &mut CxVec) -> DspResult<usize> {
    if a.len() != b.len() || b.len() != out.len() {
        return Err(DspError::LengthMismatch {
            a: a.len(),
            b: b.len(),
        });
    }
    let (xs, ys) = (a.data(), b.data());
    for (o, (x, y)) in out.data_mut().iter_mut().zip(xs.iter().zip(ys)) {
        *o = x - y;
    }
    Ok(a.len())
}

/// Interleave M vectors into one wideband slice: `out[i*M + n] = ins[n][i]`.
pub fn interleave(ins: &[CxVec], out: &mut [IQSample]) -> DspResult<usize> {
    let m = ins.len();
    let per = ins[0].len();
    for v in ins {
        if v.len() != per {
            return Err(DspError::LengthMismatch {
                a: v.len(),
                b: per,
            });
        }
    }
    if out.len() != per * m {
        return Err(DspError::LengthMismatch {
            a: out.len(),
            b: per * m,
        });
    }
    for (n, v) in ins.iter().enumerate() {
        for (i, &s) in v.data().iter().enumerate() {
            out[i * m + n] = s;
        }
    }
    Ok(per)
}

/// Deinterleave with forward loading: channel `n` receives the samples
/// at positions `i*M + n`.
pub fn deinterleave_fw(input: &[IQSample], outs: &mut [CxVec]) -> DspResult<usize> {
    let m = outs.len();
    if input.len() % m != 0 {
        return Err(DspError::LengthNotMultiple {
            len: input.len(),
            mult: m,
        });
    }
    let per = input.len() / m;
    for v in outs.iter() {
        if v.len() != per {
            return Err(DspError::LengthMismatch {
                a: v.len(),
                b: per,
            });
        }
    }
    for (n, v) in outs.iter_mut().enumerate() {
        for (i, s) in v.data_mut().iter_mut().enumerate() {
            *s = input[i * m + n];
        }
    }
    Ok(per)
}

/// Deinterleave with reverse loading: channel `M-1-n` receives the
/// samples at positions `i*M + n`. This is the input commutator order
/// required by the analysis filter bank.
pub fn deinterleave_rv(input: &[IQSample], outs: &mut [CxVec]) -> DspResult<usize> {
    let m = outs.len();
    if input.len() % m != 0 {
        return Err(DspError::LengthNotMultiple {
            len: input.len(),
            mult: m,
        });
    }
    let per = input.len() / m;
    for v in outs.iter() {
        if v.len() != per {
            return Err(DspError::LengthMismatch {
                a: v.len(),
                b: per,
            });
        }
    }
    for (n, v) in outs.iter_mut().enumerate() {
        for (i, s) in v.data_mut().iter_mut().enumerate() {
            *s = input[i * m + (m - 1 - n)];
        }
    }
    Ok(per)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(len: usize) -> CxVec {
        let samples: Vec<IQSample> = (0..len)
            .map(|i| IQSample::new(i as f32, -(i as f32)))
            .collect();
        CxVec::from_samples(&samples)
    }

    #[test]
    fn test_sinc_values() {
        assert_eq!(sinc(0.0), 1.0);
        assert_relative_eq!(sinc(1.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(sinc(0.5), 2.0 / PI, epsilon = 1e-6);
    }

    #[test]
    fn test_headroom_layout() {
        let mut v = CxVec::with_headroom(6, 3);
        assert_eq!(v.capacity(), 9);
        assert_eq!(v.headroom(), 3);
        let hist = vec![IQSample::new(1.0, 1.0); 3];
        v.load_history(&hist).unwrap();
        assert_eq!(v.headroom_mut()[2], IQSample::new(1.0, 1.0));
        assert_eq!(v.data()[0], IQSample::new(0.0, 0.0));
    }

    #[test]
    fn test_load_history_overflow() {
        let mut v = CxVec::with_headroom(6, 2);
        let hist = vec![IQSample::new(0.0, 0.0); 3];
        assert!(matches!(
            v.load_history(&hist),
            Err(DspError::InsufficientHeadroom { .. })
        ));
    }

    #[test]
    fn test_copy_length_mismatch() {
        let src = ramp(5);
        let mut dst = CxVec::new(4);
        assert!(dst.copy_from(&src).is_err());
    }

    #[test]
    fn test_subtract() {
        let a = ramp(4);
        let b = ramp(4);
        let mut out = CxVec::new(4);
        assert_eq!(subtract(&a, &b, &mut out).unwrap(), 4);
        for s in out.data() {
            assert_eq!(*s, IQSample::new(0.0, 0.0));
        }
    }

    #[test]
    fn test_decimate() {
        let v = ramp(12);
        let mut out = CxVec::new(4);
        assert_eq!(v.decimate_into(&mut out, 1, 3).unwrap(), 4);
        assert_eq!(out.data()[0].re, 1.0);
        assert_eq!(out.data()[3].re, 10.0);
    }

    #[test]
    fn test_decimate_rejects_bad_args() {
        let v = ramp(12);
        let mut out = CxVec::new(4);
        assert!(v.decimate_into(&mut out, 3, 3).is_err());
        let v = ramp(10);
        assert!(v.decimate_into(&mut out, 0, 3).is_err());
    }

    #[test]
    fn test_reverse_involution() {
        let orig = ramp(9);
        let mut v = orig.clone();
        v.reverse();
        v.reverse();
        assert_eq!(v.data(), orig.data());
    }

    #[test]
    fn test_reverse_conj_on_real_equals_reverse() {
        let samples: Vec<IQSample> = (0..8).map(|i| IQSample::new(i as f32, 0.0)).collect();
        let mut a = CxVec::from_samples(&samples);
        let mut b = CxVec::from_samples(&samples);
        a.reverse();
        b.reverse_conj();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_shift_start_bounds() {
        let mut v = CxVec::with_headroom(4, 2);
        assert!(v.shift_start(-2).is_ok());
        assert!(v.shift_start(-1).is_err());
        assert!(v.shift_start(2).is_ok());
        assert!(v.shift_start(1).is_err());
    }

    #[test]
    fn test_set_window() {
        let mut v = CxVec::new(10);
        v.data_mut()[7] = IQSample::new(7.0, 0.0);
        v.set_window(7, 3).unwrap();
        assert_eq!(v.data()[0].re, 7.0);
        assert!(v.set_window(8, 3).is_err());
    }

    #[test]
    fn test_shift_tail() {
        let mut v = ramp(8);
        v.shift_tail(5, 8).unwrap();
        assert_eq!(v.data()[0].re, 5.0);
        assert_eq!(v.data()[2].re, 7.0);
    }

    #[test]
    fn test_interleave_deinterleave_roundtrip() {
        let m = 4;
        let per = 6;
        let orig = ramp(m * per);
        let mut chans: Vec<CxVec> = (0..m).map(|_| CxVec::new(per)).collect();
        deinterleave_fw(orig.data(), &mut chans).unwrap();
        let mut back = CxVec::new(m * per);
        interleave(&chans, back.data_mut()).unwrap();
        assert_eq!(back.data(), orig.data());
    }

    #[test]
    fn test_deinterleave_rv_is_fw_reversed() {
        let m = 5;
        let per = 4;
        let input = ramp(m * per);
        let mut fw: Vec<CxVec> = (0..m).map(|_| CxVec::new(per)).collect();
        let mut rv: Vec<CxVec> = (0..m).map(|_| CxVec::new(per)).collect();
        deinterleave_fw(input.data(), &mut fw).unwrap();
        deinterleave_rv(input.data(), &mut rv).unwrap();
        for n in 0..m {
            assert_eq!(rv[n].data(), fw[m - 1 - n].data());
        }
    }

    #[test]
    fn test_deinterleave_rejects_ragged_length() {
        let input = ramp(10);
        let mut chans: Vec<CxVec> = (0..4).map(|_| CxVec::new(2)).collect();
        assert!(deinterleave_fw(input.data(), &mut chans).is_err());
    }

    #[test]
    fn test_conv_span_and_tap_window() {
        let mut v = CxVec::with_headroom(8, 4);
        for (i, s) in v.data_mut().iter_mut().enumerate() {
            *s = IQSample::new(i as f32, 0.0);
        }
        let span = v.conv_span(8, 4).unwrap();
        assert_eq!(span.len(), 8 + 3);
        let w = v.tap_window(0, 4).unwrap();
        assert_eq!(w.len(), 4);
        assert_eq!(w[3].re, 0.0);
        assert!(v.tap_window(0, 5).is_ok());
        assert!(v.tap_window(0, 6).is_err());
    }
}
