/// Loudness normalization values carried by the decoder on each song's
/// chunks, and the policy for turning them into a linear scale.

/// One gain/peak pair, per track or per album.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGainTuple {
    /// Gain adjustment in dB, e.g. -7.5.
    pub gain_db: Option<f32>,
    /// Peak amplitude as a linear value, e.g. 0.98.
    pub peak: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGainInfo {
    pub track: ReplayGainTuple,
    pub album: ReplayGainTuple,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayGainMode {
    #[default]
    Off,
    Track,
    Album,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayGainConfig {
    pub mode: ReplayGainMode,
    /// Applied on top of the tagged gain when info is present.
    pub preamp_db: f32,
    /// Applied instead when a chunk carries no replay-gain info.
    pub missing_preamp_db: f32,
    /// Limit the scale so `scale * peak <= 1.0`.
    pub clipping_prevention: bool,
}

impl Default for ReplayGainConfig {
    fn default() -> Self {
        Self {
            mode: ReplayGainMode::Track,
            preamp_db: 0.0,
            missing_preamp_db: 0.0,
            clipping_prevention: true,
        }
    }
}

pub fn db_to_linear(db: f32) -> f32 {
    10_f32.powf(db / 20.0)
}

impl ReplayGainConfig {
    /// Linear scale for a chunk carrying `info`, or for one without any
    /// replay-gain info when `info` is `None`.
    pub fn scale_for(&self, info: Option<&ReplayGainInfo>) -> f32 {
        if self.mode == ReplayGainMode::Off {
            return 1.0;
        }

        let Some(info) = info else {
            return db_to_linear(self.missing_preamp_db);
        };

        // Album mode falls back to the track values when the album
        // tuple is incomplete.
        let tuple = match self.mode {
            ReplayGainMode::Album if info.album.gain_db.is_some() => info.album,
            _ => info.track,
        };

        let Some(gain_db) = tuple.gain_db else {
            return db_to_linear(self.missing_preamp_db);
        };

        let mut scale = db_to_linear(gain_db + self.preamp_db);
        if self.clipping_prevention {
            if let Some(peak) = tuple.peak {
                if peak > 0.0 && scale * peak > 1.0 {
                    scale = 1.0 / peak;
                }
            }
        }
        scale
    }
}
