#![deny(clippy::wildcard_imports)]

//! Sample-level PCM kernels: buffer reuse, weighted mixing with
//! error-feedback dither, scalar gain, and sample-format conversion.
//! Everything here is allocation-conscious and format-dispatched; DSD
//! payloads are opaque and rejected by every kernel.

pub mod buffer;
pub mod convert;
pub mod dither;
pub mod mix;
pub mod volume;

pub use buffer::PcmBuffer;
pub use convert::{ConvertError, convert_format, remix_channels};
pub use dither::PcmDither;
pub use mix::{MixError, mix};
pub use volume::{GainError, apply_gain};
