use cadenza_audio_core::{AudioFormat, ReplayGainConfig, ReplayGainInfo};
use cadenza_pcm::{PcmBuffer, apply_gain};
use tracing::debug;

use crate::filter::{FilterError, PcmFilter};

/// Applies replay-gain loudness normalization as a scalar gain.
///
/// The worker reconfigures the stage through [`set_info`](Self::set_info)
/// whenever a chunk carries a replay-gain serial it has not applied yet.
pub struct ReplayGainFilter {
    config: ReplayGainConfig,
    format: Option<AudioFormat>,
    scale: f32,
    buffer: PcmBuffer,
}

impl ReplayGainFilter {
    pub fn new(config: ReplayGainConfig) -> Self {
        Self {
            config,
            format: None,
            scale: 1.0,
            buffer: PcmBuffer::new(),
        }
    }

    /// Recomputes the scale for new replay-gain info; `None` means the
    /// current song carries none.
    pub fn set_info(&mut self, info: Option<&ReplayGainInfo>) {
        self.scale = self.config.scale_for(info);
        debug!(scale = self.scale, "replay gain scale");
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl PcmFilter for ReplayGainFilter {
    fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, FilterError> {
        self.format = Some(format);
        Ok(format)
    }

    fn close(&mut self) {
        self.format = None;
    }

    fn filter_pcm<'a>(&'a mut self, src: &'a [u8]) -> Result<&'a [u8], FilterError> {
        // Unity gain stays bit-perfect by not copying at all.
        if self.scale == 1.0 {
            return Ok(src);
        }
        let Some(format) = self.format else {
            return Ok(src);
        };

        let dest = self.buffer.get(src.len());
        dest.copy_from_slice(src);
        apply_gain(dest, format.format, self.scale)?;
        Ok(dest)
    }
}
