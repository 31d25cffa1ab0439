//! Radio-side buffer orchestration
//!
//! Stages samples between the device and the channelizer through three
//! rate domains:
//!
//! ```text
//! device rate ──[outer resampler]── branch rate ──[channelizer]── channel rate
//!   (outer)                          (middle)                      (inner, per channel)
//! ```
//!
//! A pull reads one device chunk, downsamples it into the middle
//! buffer, channelizes into the per-channel receive rings and advances
//! the receive cursor. A push is the mirror: once enough transmit
//! samples are queued, one chunk is synthesized, upsampled and written
//! to the device, and the unsent remainder slides to the front of each
//! ring.
//!
//! The device sits behind the [`RadioDevice`] trait: interleaved
//! float32 I/Q, 64-bit tick timestamps, and sticky overrun/underrun
//! flags that accumulate here until the caller reads them. All calls on
//! one interface are strictly sequential; parallelism lives across
//! instances, never inside one.

use crate::channelizer::{Channelizer, ChannelizerConfig};
use crate::cxvec::CxVec;
use crate::filterbank::FilterDesign;
use crate::params::{receive_offset, RadioParam, CHAN_RATE};
use crate::resampler::Resampler;
use crate::synthesis::{Synthesis, SynthesisConfig};
use crate::types::{DspError, DspResult, IQSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Four GSM burst periods at one sample per symbol (4 × 156.25).
const FRAME_LEN: usize = 625;

/// Outcome of one device transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoStatus {
    /// Complex samples actually transferred.
    pub count: usize,
    /// Receive queue grew without being drained.
    pub overrun: bool,
    /// Transmit side went idle.
    pub underrun: bool,
}

/// The seam to the radio hardware.
///
/// Implementations deliver interleaved complex float32 baseband at the
/// device rate. Timestamps count device-rate ticks and advance by
/// exactly the number of samples transferred.
pub trait RadioDevice {
    fn read_samples(&mut self, buf: &mut [IQSample], timestamp: u64) -> IoStatus;
    fn write_samples(&mut self, buf: &[IQSample], timestamp: u64) -> IoStatus;
}

/// Rates, filter lengths and block granularity for one radio interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Channelizer width M.
    pub num_channels: usize,
    /// Taps per channelizing partition.
    pub chan_filt_len: usize,
    /// Taps per inner resampling partition.
    pub resamp_filt_len: usize,
    /// Taps per outer resampling partition.
    pub outer_filt_len: usize,
    /// Inner ratio: channel rate × p/q = GSM rate.
    pub inner_p: usize,
    pub inner_q: usize,
    /// Outer ratio: device rate × p/q = branch rate.
    pub outer_p: usize,
    pub outer_q: usize,
    /// Channelizer block multiplier.
    pub mul: usize,
    /// Outer resampler block multiplier.
    pub outer_mul: usize,
    /// GSM samples per symbol (1 or 2).
    pub sps: usize,
    /// Prototype design for the channelizing banks.
    pub design: FilterDesign,
}

impl Default for RadioConfig {
    fn default() -> Self {
        // 4 carriers at 400 kHz spacing on a 64/65 device ratio.
        Self {
            num_channels: 4,
            chan_filt_len: 16,
            resamp_filt_len: 16,
            outer_filt_len: 16,
            inner_p: 65,
            inner_q: 96,
            outer_p: 64,
            outer_q: 65,
            mul: 2,
            outer_mul: 3,
            sps: 1,
            design: FilterDesign::BlackmanHarris,
        }
    }
}

impl RadioConfig {
    fn validate(&self) -> DspResult<()> {
        if self.num_channels == 0 {
            return Err(DspError::InvalidConfig("zero channels".into()));
        }
        if self.sps == 0 || self.sps > 2 {
            return Err(DspError::InvalidConfig(format!(
                "samples per symbol {} not in 1..=2",
                self.sps
            )));
        }
        // The channelizer chunk and the outer resampler chunk meet at
        // the middle buffer and must agree exactly.
        if self.inner_q * self.mul != self.outer_p * self.outer_mul {
            return Err(DspError::InvalidConfig(format!(
                "chunk mismatch: inner_q*mul = {} vs outer_p*outer_mul = {}",
                self.inner_q * self.mul,
                self.outer_p * self.outer_mul
            )));
        }
        Ok(())
    }
}

/// Staged buffer pump between a radio device and the channelizer pair.
#[derive(Debug)]
pub struct RadioInterface<D: RadioDevice> {
    device: D,
    m: usize,
    chan: Channelizer,
    synth: Synthesis,
    dnsampler: Resampler,
    upsampler: Resampler,

    outer_rx: CxVec,
    middle_rx: CxVec,
    outer_tx: CxVec,
    middle_tx: CxVec,
    inner_rx: Vec<CxVec>,
    inner_tx: Vec<CxVec>,

    /// Per-channel samples moved by one pull or push.
    inner_chunk: usize,
    ring_len: usize,
    tx_headroom: usize,

    rcv_cursor: usize,
    send_cursor: usize,
    read_ts: u64,
    write_ts: u64,
    overrun: bool,
    underrun: bool,
    chan_active: Vec<bool>,
    receive_offset: f64,
}

impl<D: RadioDevice> RadioInterface<D> {
    pub fn new(config: RadioConfig, device: D) -> DspResult<Self> {
        config.validate()?;

        let m = config.num_channels;
        let chan = Channelizer::new(ChannelizerConfig {
            num_channels: m,
            chan_filt_len: config.chan_filt_len,
            resamp_filt_len: config.resamp_filt_len,
            p: config.inner_p,
            q: config.inner_q,
            mul: config.mul,
            design: config.design,
        })?;
        let synth = Synthesis::new(SynthesisConfig {
            num_channels: m,
            chan_filt_len: config.chan_filt_len,
            resamp_filt_len: config.resamp_filt_len,
            p: config.inner_q,
            q: config.inner_p,
            mul: config.mul,
            design: config.design,
        })?;

        let mut dnsampler =
            Resampler::new(config.outer_p, config.outer_q, config.outer_filt_len, 1)?;
        let mut upsampler =
            Resampler::new(config.outer_q, config.outer_p, config.outer_filt_len, 1)?;
        dnsampler.activate(0)?;
        upsampler.activate(0)?;

        let outer_chunk = m * config.outer_q * config.outer_mul;
        let middle_chunk = m * config.outer_p * config.outer_mul;
        let inner_chunk = config.inner_p * config.mul;
        let ring_len = 2 * FRAME_LEN * config.sps;
        let tx_headroom = config.resamp_filt_len;

        let inner_rx = (0..m).map(|_| CxVec::new(ring_len)).collect();
        let inner_tx = (0..m)
            .map(|_| CxVec::with_headroom(ring_len, tx_headroom))
            .collect();

        let receive_offset = receive_offset(RadioParam {
            num_chans: m,
            chan_rate: CHAN_RATE,
            sps: config.sps,
            resamp_filt_len: config.resamp_filt_len,
            chan_filt_len: config.chan_filt_len,
        });

        Ok(Self {
            device,
            m,
            chan,
            synth,
            dnsampler,
            upsampler,
            outer_rx: CxVec::with_headroom(outer_chunk, config.outer_filt_len),
            middle_rx: CxVec::new(middle_chunk),
            outer_tx: CxVec::new(outer_chunk),
            middle_tx: CxVec::with_headroom(middle_chunk, config.outer_filt_len),
            inner_rx,
            inner_tx,
            inner_chunk,
            ring_len,
            tx_headroom,
            rcv_cursor: 0,
            send_cursor: 0,
            read_ts: 0,
            write_ts: 0,
            overrun: false,
            underrun: false,
            chan_active: vec![false; m],
            receive_offset,
        })
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.m
    }

    /// Calibrated receive-timing offset for this configuration, in
    /// seconds.
    #[inline]
    pub fn receive_offset(&self) -> f64 {
        self.receive_offset
    }

    #[inline]
    pub fn read_timestamp(&self) -> u64 {
        self.read_ts
    }

    #[inline]
    pub fn write_timestamp(&self) -> u64 {
        self.write_ts
    }

    /// Sticky receive-overrun flag; reading resets it.
    pub fn take_overrun(&mut self) -> bool {
        std::mem::take(&mut self.overrun)
    }

    /// Sticky transmit-underrun flag; reading resets it.
    pub fn take_underrun(&mut self) -> bool {
        std::mem::take(&mut self.underrun)
    }

    pub fn activate_chan(&mut self, num: usize) -> DspResult<()> {
        if num >= self.m {
            return Err(DspError::InvalidChannel(num));
        }
        if self.chan_active[num] {
            return Err(DspError::ChannelActive(num));
        }
        self.chan.activate(num)?;
        self.synth.activate(num)?;
        self.chan_active[num] = true;
        Ok(())
    }

    pub fn deactivate_chan(&mut self, num: usize) -> DspResult<()> {
        if num >= self.m {
            return Err(DspError::InvalidChannel(num));
        }
        if !self.chan_active[num] {
            return Err(DspError::ChannelInactive(num));
        }
        self.chan.deactivate(num)?;
        self.synth.deactivate(num)?;
        self.chan_active[num] = false;
        Ok(())
    }

    #[inline]
    pub fn is_active(&self, num: usize) -> bool {
        self.chan_active.get(num).copied().unwrap_or(false)
    }

    /// Receive a device chunk and channelize it into the per-channel
    /// rings. Returns the samples added to each active channel.
    pub fn pull_buffer(&mut self) -> DspResult<usize> {
        let want = self.outer_rx.len();
        let status = self.device.read_samples(self.outer_rx.data_mut(), self.read_ts);
        if status.count != want {
            return Err(DspError::DeviceShort {
                got: status.count,
                want,
            });
        }
        self.overrun |= status.overrun;
        self.underrun |= status.underrun;
        self.read_ts += status.count as u64;

        self.dnsampler.rotate(
            std::slice::from_mut(&mut self.outer_rx),
            std::slice::from_mut(&mut self.middle_rx),
        )?;

        if self.rcv_cursor + self.inner_chunk > self.ring_len {
            return Err(DspError::WindowOutOfBounds {
                start: self.rcv_cursor,
                len: self.inner_chunk,
                cap: self.ring_len,
            });
        }
        for ring in self.inner_rx.iter_mut() {
            ring.set_window(self.rcv_cursor, self.inner_chunk)?;
        }
        let converted = self.chan.rotate(&self.middle_rx, &mut self.inner_rx)?;
        for ring in self.inner_rx.iter_mut() {
            ring.set_window(0, self.ring_len)?;
        }
        self.rcv_cursor += converted;

        debug!(converted, cursor = self.rcv_cursor, "pulled device chunk");
        Ok(converted)
    }

    /// Synthesize and send one device chunk if enough transmit samples
    /// are queued. Returns the device samples written (0 if the queue
    /// is still short of a chunk).
    pub fn push_buffer(&mut self) -> DspResult<usize> {
        if self.send_cursor < self.inner_chunk {
            return Ok(0);
        }

        for ring in self.inner_tx.iter_mut() {
            ring.set_window(self.tx_headroom, self.inner_chunk)?;
        }
        let result = self.synth.rotate(&mut self.inner_tx, &mut self.middle_tx);
        for ring in self.inner_tx.iter_mut() {
            ring.set_window(self.tx_headroom, self.ring_len)?;
        }
        result?;

        self.upsampler.rotate(
            std::slice::from_mut(&mut self.middle_tx),
            std::slice::from_mut(&mut self.outer_tx),
        )?;

        let status = self.device.write_samples(self.outer_tx.data(), self.write_ts);
        if status.count != self.outer_tx.len() {
            return Err(DspError::DeviceShort {
                got: status.count,
                want: self.outer_tx.len(),
            });
        }
        self.underrun |= status.underrun;
        self.write_ts += status.count as u64;

        // Slide unsent samples down so the next push starts at zero.
        for ring in self.inner_tx.iter_mut() {
            ring.shift_tail(self.inner_chunk, self.send_cursor)?;
        }
        self.send_cursor -= self.inner_chunk;

        debug!(sent = status.count, cursor = self.send_cursor, "pushed device chunk");
        Ok(status.count)
    }

    /// Samples waiting in the receive rings.
    #[inline]
    pub fn rx_available(&self) -> usize {
        self.rcv_cursor
    }

    /// Received samples of one channel, oldest first.
    pub fn rx_samples(&self, chan: usize) -> DspResult<&[IQSample]> {
        if chan >= self.m {
            return Err(DspError::InvalidChannel(chan));
        }
        Ok(&self.inner_rx[chan].data()[..self.rcv_cursor])
    }

    /// Drop the oldest `count` received samples from every ring.
    pub fn consume_rx(&mut self, count: usize) -> DspResult<()> {
        if count > self.rcv_cursor {
            return Err(DspError::LengthMismatch {
                a: count,
                b: self.rcv_cursor,
            });
        }
        for ring in self.inner_rx.iter_mut() {
            ring.shift_tail(count, self.rcv_cursor)?;
        }
        self.rcv_cursor -= count;
        Ok(())
    }

    /// Room left in the transmit rings.
    #[inline]
    pub fn tx_space(&self) -> usize {
        self.ring_len - self.send_cursor
    }

    /// Queue one burst per channel at the send cursor. All bursts must
    /// share a length that fits the remaining ring space.
    pub fn queue_tx(&mut self, bursts: &[&[IQSample]]) -> DspResult<usize> {
        if bursts.len() != self.m {
            return Err(DspError::LengthMismatch {
                a: bursts.len(),
                b: self.m,
            });
        }
        let len = bursts[0].len();
        for b in bursts {
            if b.len() != len {
                return Err(DspError::LengthMismatch {
                    a: b.len(),
                    b: len,
                });
            }
        }
        if self.send_cursor + len > self.ring_len {
            return Err(DspError::WindowOutOfBounds {
                start: self.send_cursor,
                len,
                cap: self.ring_len,
            });
        }
        for (ring, burst) in self.inner_tx.iter_mut().zip(bursts) {
            ring.data_mut()[self.send_cursor..self.send_cursor + len].copy_from_slice(burst);
        }
        self.send_cursor += len;
        Ok(len)
    }
}
