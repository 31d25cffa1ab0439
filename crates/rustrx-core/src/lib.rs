//! # Multichannel transceiver DSP core
//!
//! The multirate engine that lets one wide radio device serve several
//! GSM carriers at once: a single high-rate complex baseband stream is
//! split into (or combined from) M independently time-aligned channel
//! streams spaced uniformly in frequency.
//!
//! ## Signal Flow
//!
//! ```text
//! RX: device → [outer P/Q resampler] → [M-path analysis channelizer] → M channels
//! TX: M channels → [M-path synthesis combiner] → [outer P/Q resampler] → device
//! ```
//!
//! Three subsystems carry the algorithmic weight:
//!
//! - a **rational polyphase resampler** ([`resampler`]) converting
//!   between rates at arbitrary P/Q ratios with precomputed commutator
//!   tables and per-lane history,
//! - the **analysis channelizer** ([`channelizer`]) and **synthesis
//!   combiner** ([`synthesis`]), which couple an M-point DFT with an
//!   M-partition prototype filter bank to alias channels to and from
//!   baseband,
//! - a **per-channel activation** layer that lets any subset of the M
//!   lanes run live without disturbing phase continuity on the rest.
//!
//! Everything runs on single-precision complex samples held in
//! headroom-aware vectors ([`cxvec`]), convolved by runtime-dispatched
//! SIMD kernels ([`convolve`]). All state is per-instance; one instance
//! is strictly single-threaded, and parallelism lives across instances.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rustrx_core::channelizer::{Channelizer, ChannelizerConfig};
//! use rustrx_core::cxvec::CxVec;
//!
//! let mut rx = Channelizer::new(ChannelizerConfig::default()).unwrap();
//! rx.activate(0).unwrap();
//!
//! let wideband = CxVec::new(rx.num_channels() * rx.input_block());
//! let mut channels: Vec<CxVec> = (0..rx.num_channels())
//!     .map(|_| CxVec::new(rx.output_block()))
//!     .collect();
//! rx.rotate(&wideband, &mut channels).unwrap();
//! ```

pub mod channelizer;
pub mod convolve;
pub mod cxvec;
pub mod dft;
pub mod filterbank;
pub mod logging;
mod mpath;
pub mod params;
pub mod radio;
pub mod resampler;
pub mod synthesis;
pub mod types;

pub mod prelude {
    //! Common imports for working with the DSP core.
    pub use crate::channelizer::{Channelizer, ChannelizerConfig};
    pub use crate::convolve::Kernel;
    pub use crate::cxvec::CxVec;
    pub use crate::filterbank::{FilterBank, FilterDesign};
    pub use crate::radio::{IoStatus, RadioConfig, RadioDevice, RadioInterface};
    pub use crate::resampler::Resampler;
    pub use crate::synthesis::{Synthesis, SynthesisConfig};
    pub use crate::types::{DspError, DspResult, IQSample, Sample};
}
