//! Typed errors for the output layer.
//!
//! [`BackendError`] is what device backends produce; [`FilterError`]
//! (in [`crate::filter`]) is what filter stages produce. The worker
//! folds both into [`OutputError`], its classification of what went
//! wrong — every variant is local-recover: the worker logs it, closes
//! what it opened, stamps the fail timer and returns to command
//! dispatch.

use std::io;

use cadenza_audio_core::{AudioFormat, SampleFormat};
use thiserror::Error;

use crate::filter::FilterError;

/// Errors produced by a device backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported audio format {format}")]
    UnsupportedFormat { format: AudioFormat },
    #[error("operation not supported by {plugin}")]
    Unsupported { plugin: &'static str },
    #[error("device failure: {0}")]
    Device(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The worker's failure classification, used for logging.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to enable output: {0}")]
    EnableFailed(BackendError),
    #[error("failed to open filter chain: {0}")]
    FilterOpenFailed(FilterError),
    #[error("failed to open output device: {0}")]
    BackendOpenFailed(BackendError),
    #[error("failed to configure format conversion: {0}")]
    ConvertConfigFailed(FilterError),
    #[error("failed to play: {0}")]
    PlayFailed(BackendError),
    #[error("failed to pause: {0}")]
    PauseFailed(BackendError),
    #[error("failed to filter chunk: {0}")]
    FilterPcmFailed(FilterError),
    #[error("cannot cross-fade sample format {0}")]
    CrossFadeFormatUnsupported(SampleFormat),
}
