//! Shared M-path filter bank core
//!
//! The analysis channelizer and the synthesis combiner are the same
//! machine run in opposite directions: an M-partition filter bank with
//! per-branch history, a batched M-point DFT over time-major staging,
//! and an inner rational resampler bridging the branch rate and the
//! per-channel rate. This module holds that shared state; the thin
//! wrappers in [`channelizer`](crate::channelizer) and
//! [`synthesis`](crate::synthesis) sequence it. The direction is fixed
//! at construction, so no dispatch is involved.

use crate::convolve::{convolve, Kernel};
use crate::cxvec::{deinterleave_fw, interleave, CxVec};
use crate::dft::{DftPlan, Direction};
use crate::filterbank::{FilterBank, FilterDesign};
use crate::resampler::Resampler;
use crate::types::{DspError, DspResult, IQSample};

/// State shared by the analysis and synthesis wrappers.
#[derive(Debug)]
pub(crate) struct MpathCore {
    pub(crate) m: usize,
    pub(crate) filt_len: usize,
    pub(crate) p: usize,
    pub(crate) q: usize,
    pub(crate) mul: usize,
    /// Per-branch samples handled by one pass of the staging buffers.
    pub(crate) chunk_len: usize,
    pub(crate) bank: FilterBank,
    /// Per-branch convolution history, `filt_len` samples each.
    pub(crate) history: Vec<CxVec>,
    /// Branch filter inputs: headroom `filt_len`, data `chunk_len`.
    pub(crate) filt_in: Vec<CxVec>,
    /// Branch filter outputs, with resampler headroom in front so the
    /// analysis path can feed them straight into the inner resampler.
    pub(crate) filt_out: Vec<CxVec>,
    /// Time-major interleaved DFT staging, `m * chunk_len` samples.
    pub(crate) dft_buf: Vec<IQSample>,
    pub(crate) dft: DftPlan,
    pub(crate) resampler: Resampler,
    pub(crate) kernel: Kernel,
}

impl MpathCore {
    /// Build the shared core. `chunk_len` is `Q·mul` for analysis and
    /// `P·mul` for synthesis; the inner resampler runs at `p/q` over
    /// all M lanes.
    pub(crate) fn new(
        m: usize,
        filt_len: usize,
        resamp_len: usize,
        p: usize,
        q: usize,
        mul: usize,
        chunk_len: usize,
        design: FilterDesign,
    ) -> DspResult<Self> {
        if m == 0 || filt_len == 0 || mul == 0 {
            return Err(DspError::InvalidConfig(format!(
                "m-path m={m} filt_len={filt_len} mul={mul}"
            )));
        }

        let bank = FilterBank::new(m, filt_len, design);
        let resampler = Resampler::new(p, q, resamp_len, m)?;

        let history = (0..m).map(|_| CxVec::new(filt_len)).collect();
        let filt_in = (0..m)
            .map(|_| CxVec::with_headroom(chunk_len, filt_len))
            .collect();
        let filt_out = (0..m)
            .map(|_| CxVec::with_headroom(chunk_len, resamp_len))
            .collect();
        let dft_buf = vec![IQSample::new(0.0, 0.0); m * chunk_len];

        Ok(Self {
            m,
            filt_len,
            p,
            q,
            mul,
            chunk_len,
            bank,
            history,
            filt_in,
            filt_out,
            dft_buf,
            dft: DftPlan::new(m, Direction::Forward),
            resampler,
            kernel: Kernel::detect(),
        })
    }

    /// Zero the staging buffers, headroom included.
    pub(crate) fn reset_staging(&mut self) {
        for v in &mut self.filt_in {
            v.reset();
        }
        for v in &mut self.filt_out {
            v.reset();
        }
        self.dft_buf.fill(IQSample::new(0.0, 0.0));
    }

    /// Run every branch through its partition filter, splicing saved
    /// history in front and retaining the trailing `filt_len` samples
    /// for the next call.
    pub(crate) fn convolve_bank(&mut self) -> DspResult<()> {
        for i in 0..self.m {
            self.filt_in[i].load_history(self.history[i].data())?;
            convolve(
                &self.filt_in[i],
                self.bank.partition(i),
                &mut self.filt_out[i],
                self.kernel,
            )?;
            let tail = self.filt_in[i].trailing(self.filt_len)?;
            self.history[i].data_mut().copy_from_slice(tail);
        }
        Ok(())
    }

    /// Batched M-point DFT across the branch outputs, in place.
    /// `normalize` applies the 1/M analysis scaling.
    pub(crate) fn dft_in_place(&mut self, normalize: bool) -> DspResult<()> {
        interleave(&self.filt_out, &mut self.dft_buf)?;
        self.dft.execute(&mut self.dft_buf)?;
        if normalize {
            let scale = 1.0 / self.m as f32;
            for s in self.dft_buf.iter_mut() {
                *s *= scale;
            }
        }
        deinterleave_fw(&self.dft_buf, &mut self.filt_out)?;
        Ok(())
    }

    /// Batched M-point DFT from the branch outputs into the branch
    /// filter inputs, as the synthesis direction requires.
    pub(crate) fn dft_to_inputs(&mut self) -> DspResult<()> {
        interleave(&self.filt_out, &mut self.dft_buf)?;
        self.dft.execute(&mut self.dft_buf)?;
        deinterleave_fw(&self.dft_buf, &mut self.filt_in)?;
        Ok(())
    }
}
