//! Rational-ratio polyphase resampler
//!
//! Converts between sample rates at an arbitrary P/Q ratio with bounded
//! per-block latency and continuous phase across blocks. The prototype
//! lowpass is decomposed into P polyphase partitions; two precomputed
//! commutator tables then route every output sample to the input cursor
//! it consumes and the partition that produces it:
//!
//! ```text
//! input_index[i] = ⌊Q·i / P⌋        which input sample feeds output i
//! output_path[i] = (Q·i) mod P      which polyphase branch produces it
//! ```
//!
//! The resampler serves M independent channel lanes that share the
//! filter bank but keep per-lane history, so a single instance can
//! stand behind an M-channel filter bank. Lanes are switched on and off
//! without disturbing the history of the others.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustrx_core::cxvec::CxVec;
//! use rustrx_core::resampler::Resampler;
//!
//! // 400 kHz channel rate down to the GSM rate: 65/96.
//! let mut resamp = Resampler::new(65, 96, 16, 1).unwrap();
//! resamp.activate(0).unwrap();
//!
//! let mut input = [CxVec::with_headroom(96, 16)];
//! let mut output = [CxVec::new(65)];
//! let n = resamp.rotate(&mut input, &mut output).unwrap();
//! assert_eq!(n, 65);
//! ```

use crate::convolve::{single_convolve, Kernel};
use crate::cxvec::CxVec;
use crate::filterbank::{FilterBank, FilterDesign};
use crate::types::{DspError, DspResult};
use tracing::error;

/// Largest output block a single rotate call may produce.
pub const MAX_OUTPUT_LEN: usize = 4096;

/// Multi-lane rational resampler.
#[derive(Debug)]
pub struct Resampler {
    p: usize,
    q: usize,
    filt_len: usize,
    bank: FilterBank,
    history: Vec<CxVec>,
    active: Vec<bool>,
    input_index: Vec<usize>,
    output_path: Vec<usize>,
    kernel: Kernel,
}

impl Resampler {
    /// Build a resampler at ratio `p/q` with `filt_len` taps per
    /// polyphase partition, serving `num_chans` lanes. The prototype is
    /// a boxcar sinc; use [`with_design`](Self::with_design) to window
    /// it.
    pub fn new(p: usize, q: usize, filt_len: usize, num_chans: usize) -> DspResult<Self> {
        Self::with_design(p, q, filt_len, num_chans, FilterDesign::Boxcar)
    }

    /// Build with an explicit prototype design policy.
    pub fn with_design(
        p: usize,
        q: usize,
        filt_len: usize,
        num_chans: usize,
        design: FilterDesign,
    ) -> DspResult<Self> {
        if p == 0 || q == 0 || filt_len == 0 || num_chans == 0 {
            return Err(DspError::InvalidConfig(format!(
                "resampler p={p} q={q} filt_len={filt_len} chans={num_chans}"
            )));
        }

        let bank = FilterBank::new(p, filt_len, design);
        let history = (0..num_chans).map(|_| CxVec::new(filt_len)).collect();

        let mut input_index = vec![0usize; MAX_OUTPUT_LEN];
        let mut output_path = vec![0usize; MAX_OUTPUT_LEN];
        for i in 0..MAX_OUTPUT_LEN {
            input_index[i] = (q * i) / p;
            output_path[i] = (q * i) % p;
        }

        Ok(Self {
            p,
            q,
            filt_len,
            bank,
            history,
            active: vec![false; num_chans],
            input_index,
            output_path,
            kernel: Kernel::detect(),
        })
    }

    #[inline]
    pub fn p(&self) -> usize {
        self.p
    }

    #[inline]
    pub fn q(&self) -> usize {
        self.q
    }

    #[inline]
    pub fn filt_len(&self) -> usize {
        self.filt_len
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_active(&self, chan: usize) -> bool {
        self.active.get(chan).copied().unwrap_or(false)
    }

    /// Mark a lane live. Activation does not reset its history.
    pub fn activate(&mut self, chan: usize) -> DspResult<()> {
        if chan >= self.active.len() {
            return Err(DspError::InvalidChannel(chan));
        }
        if self.active[chan] {
            return Err(DspError::ChannelActive(chan));
        }
        self.active[chan] = true;
        Ok(())
    }

    /// Mark a lane idle. Its history is retained for reactivation.
    pub fn deactivate(&mut self, chan: usize) -> DspResult<()> {
        if chan >= self.active.len() {
            return Err(DspError::InvalidChannel(chan));
        }
        if !self.active[chan] {
            return Err(DspError::ChannelInactive(chan));
        }
        self.active[chan] = false;
        Ok(())
    }

    fn check_vec_len(&self, input: &CxVec, output: &CxVec) -> DspResult<()> {
        if input.len() % self.q != 0 {
            error!(len = input.len(), q = self.q, "input not a multiple of Q");
            return Err(DspError::LengthNotMultiple {
                len: input.len(),
                mult: self.q,
            });
        }
        if output.len() % self.p != 0 {
            error!(len = output.len(), p = self.p, "output not a multiple of P");
            return Err(DspError::LengthNotMultiple {
                len: output.len(),
                mult: self.p,
            });
        }
        if input.len() / self.q != output.len() / self.p {
            return Err(DspError::BlockMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        if output.len() > MAX_OUTPUT_LEN {
            return Err(DspError::BlockTooLarge(output.len()));
        }
        if input.headroom() < self.filt_len {
            return Err(DspError::InsufficientHeadroom {
                have: input.headroom(),
                need: self.filt_len,
            });
        }
        Ok(())
    }

    /// Resample one lane. The input must carry `filt_len` samples of
    /// headroom; the saved lane history is spliced there before the
    /// commutator runs, and the trailing `filt_len` stream samples are
    /// saved afterwards.
    fn rotate_one(&mut self, chan: usize, input: &mut CxVec, output: &mut CxVec) -> DspResult<usize> {
        self.check_vec_len(input, output)?;
        if output.is_empty() {
            return Ok(0);
        }

        input.load_history(self.history[chan].data())?;

        for i in 0..output.len() {
            let n = self.input_index[i];
            let path = self.output_path[i];
            output.data_mut()[i] = single_convolve(input, n, self.bank.partition(path), self.kernel)?;
        }

        let tail = input.trailing(self.filt_len)?;
        self.history[chan].data_mut().copy_from_slice(tail);

        Ok(output.len())
    }

    /// Resample every active lane; idle lanes are skipped and their
    /// output contents are left untouched. Returns the output block
    /// length of the rotated lanes.
    pub fn rotate(&mut self, inputs: &mut [CxVec], outputs: &mut [CxVec]) -> DspResult<usize> {
        if inputs.len() != self.active.len() || outputs.len() != self.active.len() {
            return Err(DspError::LengthMismatch {
                a: inputs.len(),
                b: self.active.len(),
            });
        }

        let mut len = 0;
        for chan in 0..self.active.len() {
            if self.active[chan] {
                len = self.rotate_one(chan, &mut inputs[chan], &mut outputs[chan])?;
            }
        }
        Ok(len)
    }
}
