//! Reference [`BackendPort`](crate::backend::BackendPort)
//! implementations: a pacing null device, a raw-PCM file writer, and
//! (behind the `cpal` feature) real device output through cpal.

#[cfg(feature = "cpal")]
mod cpal;
mod file;
mod null;

#[cfg(feature = "cpal")]
pub use cpal::CpalBackend;
pub use file::FileBackend;
pub use null::NullBackend;
