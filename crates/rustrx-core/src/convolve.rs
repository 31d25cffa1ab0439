//! Complex-by-real FIR convolution kernels
//!
//! The filter banks in this crate convolve complex signals against
//! real-valued taps stored in time-reversed order, so the hot loop is a
//! plain multiply-accumulate over a sliding window:
//!
//! ```text
//! y[i] = Σ  x[i + k - (L-1)] · h[k]      k = 0..L
//! ```
//!
//! The window reads *into the headroom* of the input vector, left of
//! logical index zero; callers load filter history there first (see
//! [`CxVec::load_history`]).
//!
//! A [`Kernel`] picks a backend once at construction: an SSE3 path on
//! x86 when the CPU supports it, otherwise portable scalar code. Both
//! backends special-case the tap counts the polyphase banks actually
//! use (4, 8, 12, 16 and 20; the last covers 10-tap partitions after
//! real/imag interleaving) and fall back to a generic loop for anything
//! else.

use crate::cxvec::CxVec;
use crate::types::{DspError, DspResult, IQSample};

/// Convolution backend, fixed at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Scalar,
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Sse3,
}

/// A dispatched convolution kernel.
///
/// Cheap to copy; every filter stage holds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    backend: Backend,
}

impl Kernel {
    /// Pick the fastest backend the running CPU supports.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if is_x86_feature_detected!("sse3") {
                return Self {
                    backend: Backend::Sse3,
                };
            }
        }
        Self {
            backend: Backend::Scalar,
        }
    }

    /// The portable scalar backend, the reference for all others.
    pub fn scalar() -> Self {
        Self {
            backend: Backend::Scalar,
        }
    }

    /// Backend name, for logs and bench labels.
    pub fn name(&self) -> &'static str {
        match self.backend {
            Backend::Scalar => "scalar",
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Backend::Sse3 => "sse3",
        }
    }

    fn run(&self, x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        debug_assert_eq!(x.len(), y.len() + h.len() - 1);
        match self.backend {
            Backend::Scalar => match h.len() {
                4 => conv_scalar_fixed::<4>(x, h, y),
                8 => conv_scalar_fixed::<8>(x, h, y),
                12 => conv_scalar_fixed::<12>(x, h, y),
                16 => conv_scalar_fixed::<16>(x, h, y),
                20 => conv_scalar_fixed::<20>(x, h, y),
                _ => conv_scalar_generic(x, h, y),
            },
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect() only selects Sse3 after confirming support,
            // and run() is only reached with a span sized by conv_span().
            Backend::Sse3 => unsafe {
                match h.len() {
                    4 => sse::conv4(x, h, y),
                    8 => sse::conv8(x, h, y),
                    12 => sse::conv12(x, h, y),
                    16 => sse::conv16(x, h, y),
                    20 => sse::conv20(x, h, y),
                    _ => conv_scalar_generic(x, h, y),
                }
            },
        }
    }
}

/// Block convolution: fills the whole of `output` from `input`.
///
/// `taps` must be declared real-only and stored time-reversed. The
/// input must be at least as long as the output and carry `taps - 1`
/// samples of headroom.
pub fn convolve(
    input: &CxVec,
    taps: &CxVec,
    output: &mut CxVec,
    kernel: Kernel,
) -> DspResult<usize> {
    if !taps.is_real_only() {
        return Err(DspError::TapsNotReal);
    }
    if input.len() < output.len() {
        return Err(DspError::LengthMismatch {
            a: input.len(),
            b: output.len(),
        });
    }
    let out_len = output.len();
    let span = input.conv_span(out_len, taps.len())?;
    kernel.run(span, taps.data(), output.data_mut());
    Ok(out_len)
}

/// Single-point convolution: the window of `taps` samples ending at
/// logical index `cursor` of `input`, against `taps`.
///
/// This is the commutator step of the rational resampler, which picks
/// its input cursor and polyphase branch per output sample.
pub fn single_convolve(
    input: &CxVec,
    cursor: usize,
    taps: &CxVec,
    kernel: Kernel,
) -> DspResult<IQSample> {
    if !taps.is_real_only() {
        return Err(DspError::TapsNotReal);
    }
    let span = input.tap_window(cursor, taps.len())?;
    let mut out = [IQSample::new(0.0, 0.0)];
    kernel.run(span, taps.data(), &mut out);
    Ok(out[0])
}

/// Generic scalar kernel for arbitrary tap counts.
fn conv_scalar_generic(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
    let l = h.len();
    for (i, out) in y.iter_mut().enumerate() {
        let win = &x[i..i + l];
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for (s, t) in win.iter().zip(h) {
            re += s.re * t.re;
            im += s.im * t.re;
        }
        *out = IQSample::new(re, im);
    }
}

/// Scalar kernel specialized on the tap count so the compiler can keep
/// the taps in registers and vectorize the window loop.
fn conv_scalar_fixed<const L: usize>(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
    let mut hr = [0.0f32; L];
    for (t, s) in hr.iter_mut().zip(h) {
        *t = s.re;
    }
    for (i, out) in y.iter_mut().enumerate() {
        let win = &x[i..i + L];
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for k in 0..L {
            re += win[k].re * hr[k];
            im += win[k].im * hr[k];
        }
        *out = IQSample::new(re, im);
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod sse {
    //! SSE3 kernels. Four complex taps pack into one register of real
    //! parts; the inner loop runs `Q` such quads per output sample.

    use crate::types::IQSample;
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    // Shuffle controls picking the real (even) and imaginary (odd)
    // lanes out of two interleaved-complex registers. The pair order
    // within a quad is permuted, identically for signal and taps, so
    // the dot product is unaffected.
    const REALS: i32 = 0x22;
    const IMAGS: i32 = 0x77;

    /// Quad-loop core shared by the sized kernels. Monomorphizes per
    /// tap count and inlines into its feature-enabled caller.
    #[inline(always)]
    unsafe fn conv_quads<const Q: usize>(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        debug_assert_eq!(h.len(), 4 * Q);
        let xp = x.as_ptr() as *const f32;
        let hp = h.as_ptr() as *const f32;
        let yp = y.as_mut_ptr() as *mut f32;

        let mut taps = [_mm_setzero_ps(); Q];
        for (q, t) in taps.iter_mut().enumerate() {
            let lo = _mm_loadu_ps(hp.add(8 * q));
            let hi = _mm_loadu_ps(hp.add(8 * q + 4));
            *t = _mm_shuffle_ps::<REALS>(lo, hi);
        }

        for i in 0..y.len() {
            let base = xp.add(2 * i);
            let mut acc_re = _mm_setzero_ps();
            let mut acc_im = _mm_setzero_ps();
            for (q, t) in taps.iter().enumerate() {
                let lo = _mm_loadu_ps(base.add(8 * q));
                let hi = _mm_loadu_ps(base.add(8 * q + 4));
                let re = _mm_shuffle_ps::<REALS>(lo, hi);
                let im = _mm_shuffle_ps::<IMAGS>(lo, hi);
                acc_re = _mm_add_ps(acc_re, _mm_mul_ps(re, *t));
                acc_im = _mm_add_ps(acc_im, _mm_mul_ps(im, *t));
            }
            // [re01, re23, im01, im23] -> [re, im, re, im]
            let sums = _mm_hadd_ps(acc_re, acc_im);
            let sums = _mm_hadd_ps(sums, sums);
            *yp.add(2 * i) = _mm_cvtss_f32(sums);
            *yp.add(2 * i + 1) = _mm_cvtss_f32(_mm_shuffle_ps::<0x01>(sums, sums));
        }
    }

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn conv4(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        conv_quads::<1>(x, h, y)
    }

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn conv8(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        conv_quads::<2>(x, h, y)
    }

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn conv12(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        conv_quads::<3>(x, h, y)
    }

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn conv16(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        conv_quads::<4>(x, h, y)
    }

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn conv20(x: &[IQSample], h: &[IQSample], y: &mut [IQSample]) {
        conv_quads::<5>(x, h, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_signal(rng: &mut StdRng, len: usize, headroom: usize) -> CxVec {
        let mut v = CxVec::with_headroom(len, headroom);
        for s in v.headroom_mut() {
            *s = IQSample::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        }
        for s in v.data_mut() {
            *s = IQSample::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        }
        v
    }

    fn random_taps(rng: &mut StdRng, len: usize) -> CxVec {
        let mut t = CxVec::real_taps(len);
        for s in t.data_mut() {
            *s = IQSample::new(rng.gen_range(-1.0..1.0), 0.0);
        }
        t
    }

    #[test]
    fn test_rejects_complex_taps() {
        let input = CxVec::with_headroom(8, 4);
        let taps = CxVec::new(4);
        let mut out = CxVec::new(8);
        assert_eq!(
            convolve(&input, &taps, &mut out, Kernel::scalar()),
            Err(DspError::TapsNotReal)
        );
    }

    #[test]
    fn test_rejects_short_input() {
        let input = CxVec::with_headroom(4, 4);
        let taps = CxVec::real_taps(4);
        let mut out = CxVec::new(8);
        assert!(convolve(&input, &taps, &mut out, Kernel::scalar()).is_err());
    }

    #[test]
    fn test_rejects_missing_headroom() {
        let input = CxVec::with_headroom(8, 2);
        let taps = CxVec::real_taps(4);
        let mut out = CxVec::new(8);
        assert!(matches!(
            convolve(&input, &taps, &mut out, Kernel::scalar()),
            Err(DspError::InsufficientHeadroom { .. })
        ));
    }

    #[test]
    fn test_delta_taps_pass_through() {
        // Reversed delta at the last tap position reproduces the input.
        let mut rng = StdRng::seed_from_u64(7);
        let input = random_signal(&mut rng, 16, 4);
        let mut taps = CxVec::real_taps(4);
        taps.data_mut()[3] = IQSample::new(1.0, 0.0);
        let mut out = CxVec::new(16);
        convolve(&input, &taps, &mut out, Kernel::scalar()).unwrap();
        for (o, i) in out.data().iter().zip(input.data()) {
            assert_relative_eq!(o.re, i.re, epsilon = 1e-6);
            assert_relative_eq!(o.im, i.im, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reads_headroom_history() {
        let mut input = CxVec::with_headroom(4, 4);
        input
            .load_history(&[IQSample::new(2.0, 0.0); 4])
            .unwrap();
        let mut taps = CxVec::real_taps(4);
        // Reversed taps [0,0,0,1] put all weight at x[i - 3].
        taps.data_mut()[0] = IQSample::new(1.0, 0.0);
        let mut out = CxVec::new(4);
        convolve(&input, &taps, &mut out, Kernel::scalar()).unwrap();
        assert_relative_eq!(out.data()[0].re, 2.0, epsilon = 1e-6);
        assert_relative_eq!(out.data()[2].re, 2.0, epsilon = 1e-6);
        assert_relative_eq!(out.data()[3].re, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_matches_generic() {
        let mut rng = StdRng::seed_from_u64(11);
        for l in [4usize, 8, 12, 16, 20] {
            let input = random_signal(&mut rng, 64, l);
            let taps = random_taps(&mut rng, l);
            let mut fixed = CxVec::new(64);
            let mut generic = CxVec::new(64);
            convolve(&input, &taps, &mut fixed, Kernel::scalar()).unwrap();
            let span = input.conv_span(64, l).unwrap();
            conv_scalar_generic(span, taps.data(), generic.data_mut());
            for (a, b) in fixed.data().iter().zip(generic.data()) {
                assert_relative_eq!(a.re, b.re, epsilon = 1e-5);
                assert_relative_eq!(a.im, b.im, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_detected_matches_scalar_per_tap_count() {
        let mut rng = StdRng::seed_from_u64(23);
        let detected = Kernel::detect();
        for l in [4usize, 6, 8, 12, 16, 20] {
            let input = random_signal(&mut rng, 128, l);
            let taps = random_taps(&mut rng, l);
            let mut fast = CxVec::new(128);
            let mut reference = CxVec::new(128);
            convolve(&input, &taps, &mut fast, detected).unwrap();
            convolve(&input, &taps, &mut reference, Kernel::scalar()).unwrap();
            for (a, b) in fast.data().iter().zip(reference.data()) {
                assert_relative_eq!(a.re, b.re, epsilon = 1e-4);
                assert_relative_eq!(a.im, b.im, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_single_matches_block() {
        let mut rng = StdRng::seed_from_u64(31);
        let input = random_signal(&mut rng, 32, 8);
        let taps = random_taps(&mut rng, 8);
        let mut block = CxVec::new(32);
        let kernel = Kernel::detect();
        convolve(&input, &taps, &mut block, kernel).unwrap();
        for i in [0usize, 5, 31] {
            let s = single_convolve(&input, i, &taps, kernel).unwrap();
            assert_relative_eq!(s.re, block.data()[i].re, epsilon = 1e-5);
            assert_relative_eq!(s.im, block.data()[i].im, epsilon = 1e-5);
        }
    }
}
