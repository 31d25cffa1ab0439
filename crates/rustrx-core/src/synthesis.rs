//! Polyphase synthesis combiner
//!
//! Mirror of the analysis channelizer: M per-channel baseband streams
//! are brought up to the branch rate by the inner resampler, combined
//! across channels by a batched M-point DFT, shaped by the partition
//! filter bank with per-branch history, and interleaved into a single
//! wideband stream.
//!
//! ```text
//! M channels → [P/Q resampler] → [M-point DFT] → [branch filters] → wideband
//! ```
//!
//! The DFT direction matches the analysis path; the commutator
//! orientation is what flips the physical sense, so a channel fed at
//! baseband lands at `-n · fs/M` in the combined output, exactly where
//! the analysis path would find it.

use crate::cxvec::{interleave, CxVec};
use crate::filterbank::FilterDesign;
use crate::mpath::MpathCore;
use crate::types::{DspError, DspResult};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Construction parameters for the synthesis combiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Number of channels M.
    pub num_channels: usize,
    /// Taps per channelizing partition.
    pub chan_filt_len: usize,
    /// Taps per resampling partition.
    pub resamp_filt_len: usize,
    /// Output rate numerator of the inner resampler (branch-rate side).
    pub p: usize,
    /// Input rate denominator of the inner resampler (channel-rate side).
    pub q: usize,
    /// Block granularity multiplier.
    pub mul: usize,
    /// Prototype design for the channelizing bank.
    pub design: FilterDesign,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        // Transmit mirror of the receive default: GSM rate up to
        // 400 kHz channel spacing.
        Self {
            num_channels: 4,
            chan_filt_len: 16,
            resamp_filt_len: 16,
            p: 96,
            q: 65,
            mul: 2,
            design: FilterDesign::BlackmanHarris,
        }
    }
}

/// M-channel transmit combiner.
#[derive(Debug)]
pub struct Synthesis {
    core: MpathCore,
}

impl Synthesis {
    pub fn new(config: SynthesisConfig) -> DspResult<Self> {
        let chunk_len = config.p * config.mul;
        let core = MpathCore::new(
            config.num_channels,
            config.chan_filt_len,
            config.resamp_filt_len,
            config.p,
            config.q,
            config.mul,
            chunk_len,
            config.design,
        )?;
        Ok(Self { core })
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.core.m
    }

    /// Channel samples consumed per chunk: `Q·mul`.
    #[inline]
    pub fn input_block(&self) -> usize {
        self.core.q * self.core.mul
    }

    /// Wideband samples produced per chunk, per branch: `P·mul`.
    #[inline]
    pub fn output_block(&self) -> usize {
        self.core.chunk_len
    }

    /// Headroom the per-channel input vectors must carry for the inner
    /// resampler's history splice.
    #[inline]
    pub fn input_headroom(&self) -> usize {
        self.core.resampler.filt_len()
    }

    pub fn activate(&mut self, chan: usize) -> DspResult<()> {
        self.core.resampler.activate(chan)
    }

    pub fn deactivate(&mut self, chan: usize) -> DspResult<()> {
        self.core.resampler.deactivate(chan)
    }

    #[inline]
    pub fn is_active(&self, chan: usize) -> bool {
        self.core.resampler.is_active(chan)
    }

    /// Combine the active channel streams into one wideband block.
    ///
    /// Every input must hold the same multiple of `Q·mul` samples with
    /// resampler headroom in front; the output holds the matching
    /// multiple of `M·P·mul`. Idle channels contribute silence. Returns
    /// the wideband output length.
    pub fn rotate(&mut self, inputs: &mut [CxVec], output: &mut CxVec) -> DspResult<usize> {
        let m = self.core.m;
        let in_block = self.input_block();
        let out_chunk = m * self.core.chunk_len;

        if inputs.len() != m {
            return Err(DspError::LengthMismatch {
                a: inputs.len(),
                b: m,
            });
        }
        if inputs[0].len() % in_block != 0 {
            error!(len = inputs[0].len(), block = in_block, "bad synthesis input length");
            return Err(DspError::LengthNotMultiple {
                len: inputs[0].len(),
                mult: in_block,
            });
        }
        let chunks = inputs[0].len() / in_block;
        for v in inputs.iter() {
            if v.len() != chunks * in_block {
                return Err(DspError::LengthMismatch {
                    a: v.len(),
                    b: chunks * in_block,
                });
            }
        }
        if output.len() % out_chunk != 0 {
            error!(len = output.len(), chunk = out_chunk, "bad synthesis output length");
            return Err(DspError::LengthNotMultiple {
                len: output.len(),
                mult: out_chunk,
            });
        }
        if output.len() / out_chunk != chunks {
            return Err(DspError::BlockMismatch {
                input: inputs[0].len(),
                output: output.len(),
            });
        }
        for (c, v) in inputs.iter().enumerate() {
            if self.core.resampler.is_active(c) && v.headroom() < self.input_headroom() {
                return Err(DspError::InsufficientHeadroom {
                    have: v.headroom(),
                    need: self.input_headroom(),
                });
            }
        }
        if chunks == 0 {
            return Ok(0);
        }

        let saved: Vec<(usize, usize)> = inputs
            .iter()
            .map(|v| (v.headroom(), v.len()))
            .collect();

        let result = self.rotate_chunks(inputs, output, &saved, chunks, in_block, out_chunk);

        for (v, &(start, len)) in inputs.iter_mut().zip(&saved) {
            v.set_window(start, len)?;
        }
        result?;

        Ok(chunks * out_chunk)
    }

    fn rotate_chunks(
        &mut self,
        inputs: &mut [CxVec],
        output: &mut CxVec,
        saved: &[(usize, usize)],
        chunks: usize,
        in_block: usize,
        out_chunk: usize,
    ) -> DspResult<()> {
        for c in 0..chunks {
            self.core.reset_staging();

            for (v, &(start, _)) in inputs.iter_mut().zip(saved) {
                v.set_window(start + c * in_block, in_block)?;
            }
            self.core
                .resampler
                .rotate(inputs, &mut self.core.filt_out)?;

            self.core.dft_to_inputs()?;
            self.core.convolve_bank()?;

            let span = &mut output.data_mut()[c * out_chunk..(c + 1) * out_chunk];
            interleave(&self.core.filt_out, span)?;
        }
        Ok(())
    }
}
