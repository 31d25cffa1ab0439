//! Polyphase analysis channelizer
//!
//! Splits one wideband baseband stream into M uniformly spaced channel
//! streams by aliasing: a reverse-order input commutator loads M
//! polyphase branches, each branch runs its partition of the prototype
//! lowpass with history carried across calls, and a batched M-point DFT
//! rotates every bin to baseband. An inner rational resampler then
//! brings each channel from the branch rate to the per-channel rate.
//!
//! ```text
//! wideband ─┬→ [branch M-1] ─┐
//!           ├→ [branch ...] ─┤→ [M-point DFT] → [P/Q resampler] → M channels
//!           └→ [branch 0]   ─┘
//! ```
//!
//! Channel `n` is centered at `-n · fs/M`: the commutator/DFT pair maps
//! a tone at that frequency to a baseband-centered stream on channel
//! `n`. Only active channels are resampled and written; idle lanes cost
//! nothing at the output stage and their buffers are never touched.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustrx_core::channelizer::{Channelizer, ChannelizerConfig};
//! use rustrx_core::cxvec::CxVec;
//!
//! let mut chan = Channelizer::new(ChannelizerConfig::default()).unwrap();
//! chan.activate(0).unwrap();
//!
//! // One chunk of wideband input: M * Q * mul samples.
//! let input = CxVec::new(chan.num_channels() * chan.input_block());
//! let mut outs: Vec<CxVec> = (0..chan.num_channels())
//!     .map(|_| CxVec::new(chan.output_block()))
//!     .collect();
//! chan.rotate(&input, &mut outs).unwrap();
//! ```

use crate::cxvec::{deinterleave_rv, CxVec};
use crate::filterbank::FilterDesign;
use crate::mpath::MpathCore;
use crate::types::{DspError, DspResult};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Construction parameters for the analysis channelizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelizerConfig {
    /// Number of channels M.
    pub num_channels: usize,
    /// Taps per channelizing partition.
    pub chan_filt_len: usize,
    /// Taps per resampling partition.
    pub resamp_filt_len: usize,
    /// Output rate numerator of the inner resampler.
    pub p: usize,
    /// Input rate denominator of the inner resampler.
    pub q: usize,
    /// Block granularity multiplier.
    pub mul: usize,
    /// Prototype design for the channelizing bank.
    pub design: FilterDesign,
}

impl Default for ChannelizerConfig {
    fn default() -> Self {
        // 4 channels at 400 kHz spacing down to the GSM symbol rate.
        Self {
            num_channels: 4,
            chan_filt_len: 16,
            resamp_filt_len: 16,
            p: 65,
            q: 96,
            mul: 2,
            design: FilterDesign::BlackmanHarris,
        }
    }
}

/// M-channel aliasing receiver.
#[derive(Debug)]
pub struct Channelizer {
    core: MpathCore,
}

impl Channelizer {
    pub fn new(config: ChannelizerConfig) -> DspResult<Self> {
        let chunk_len = config.q * config.mul;
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

    /// Wideband samples consumed per chunk, per branch: `Q·mul`.
    #[inline]
    pub fn input_block(&self) -> usize {
        self.core.chunk_len
    }

    /// Channel samples produced per chunk: `P·mul`.
    #[inline]
    pub fn output_block(&self) -> usize {
        self.core.p * self.core.mul
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

    /// Channelize a wideband block into the active channel outputs.
    ///
    /// `input.len()` must be a multiple of `M·Q·mul`; each output must
    /// hold the matching multiple of `P·mul`. Inactive channel buffers
    /// are not written. Returns the per-channel output length.
    pub fn rotate(&mut self, input: &CxVec, outputs: &mut [CxVec]) -> DspResult<usize> {
        let m = self.core.m;
        let in_chunk = m * self.core.chunk_len;
        let out_block = self.output_block();

        if outputs.len() != m {
            return Err(DspError::LengthMismatch {
                a: outputs.len(),
                b: m,
            });
        }
        if input.len() % in_chunk != 0 {
            error!(len = input.len(), chunk = in_chunk, "bad channelizer input length");
            return Err(DspError::LengthNotMultiple {
                len: input.len(),
                mult: in_chunk,
            });
        }
        let chunks = input.len() / in_chunk;
        for out in outputs.iter() {
            if out.len() % out_block != 0 {
                error!(len = out.len(), block = out_block, "bad channelizer output length");
                return Err(DspError::LengthNotMultiple {
                    len: out.len(),
                    mult: out_block,
                });
            }
            if out.len() / out_block != chunks {
                return Err(DspError::BlockMismatch {
                    input: input.len(),
                    output: out.len(),
                });
            }
        }
        if chunks == 0 {
            return Ok(0);
        }

        // Remember caller windows, then slide them chunk by chunk so
        // the fixed-size staging can stream arbitrary multiples.
        let saved: Vec<(usize, usize)> = outputs
            .iter()
            .map(|v| (v.headroom(), v.len()))
            .collect();

        let result = self.rotate_chunks(input, outputs, &saved, chunks, in_chunk, out_block);

        for (v, &(start, len)) in outputs.iter_mut().zip(&saved) {
            v.set_window(start, len)?;
        }
        result?;

        Ok(chunks * out_block)
    }

    fn rotate_chunks(
        &mut self,
        input: &CxVec,
        outputs: &mut [CxVec],
        saved: &[(usize, usize)],
        chunks: usize,
        in_chunk: usize,
        out_block: usize,
    ) -> DspResult<()> {
        for c in 0..chunks {
            self.core.reset_staging();

            let wideband = &input.data()[c * in_chunk..(c + 1) * in_chunk];
            deinterleave_rv(wideband, &mut self.core.filt_in)?;

            self.core.convolve_bank()?;
            self.core.dft_in_place(true)?;

            for (out, &(start, _)) in outputs.iter_mut().zip(saved) {
                out.set_window(start + c * out_block, out_block)?;
            }
            self.core
                .resampler
                .rotate(&mut self.core.filt_out, outputs)?;
        }
        Ok(())
    }
}
