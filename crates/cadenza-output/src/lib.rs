#![deny(clippy::wildcard_imports)]

//! The per-output audio worker: one thread per output device, pulling
//! decoded chunks from the upstream pipe, filtering (replay gain,
//! cross-fade, conversion, user filters) and pushing PCM to a backend
//! in real time, driven by a single-slot command mailbox.

pub mod backend;
pub mod backends;
pub mod config;
pub mod control;
pub mod error;
pub mod fail_timer;
pub mod filter;
mod notify;
mod state;
mod worker;

#[cfg(test)]
mod tests;

pub use backend::BackendPort;
pub use config::OutputConfig;
pub use control::{AudioOutputControl, PlayerSignal};
pub use error::{BackendError, OutputError};
pub use fail_timer::FailTimer;
pub use filter::{ConvertFilter, FilterChain, FilterError, PcmFilter, ReplayGainFilter};
