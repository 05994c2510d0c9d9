use std::time::Duration;

use cadenza_audio_core::{AudioFormatMask, ReplayGainConfig};

/// Per-output configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Human-readable output name, used in log records and the worker
    /// thread name.
    pub name: String,
    /// Configured format mask; defined fields override the negotiated
    /// output format. Parses from `"rate:bits:channels"` with `*`
    /// wildcards.
    pub format: AudioFormatMask,
    /// Forward song tags to the backend.
    pub tags: bool,
    /// Replay-gain normalization; `None` disables the stage entirely.
    pub replay_gain: Option<ReplayGainConfig>,
    /// How long after a device failure automatic reopen attempts are
    /// suppressed.
    pub reopen_cooldown: Duration,
}

impl OutputConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            format: AudioFormatMask::default(),
            tags: true,
            replay_gain: None,
            reopen_cooldown: Duration::from_secs(10),
        }
    }
}
