use cadenza_audio_core::{AudioFormat, MusicChunk, ReplayGainConfig};
use cadenza_pcm::{PcmBuffer, PcmDither, mix};

use crate::error::OutputError;
use crate::filter::{FilterChain, FilterError, PcmFilter, ReplayGainFilter};

/// Everything between a raw chunk and the bytes handed to the backend:
/// replay gain, cross-fade mixing, and the configured filter chain.
///
/// Two replay-gain filters exist because a cross-fade overlaps two
/// songs with independent gain; each side tracks the serial it last
/// applied so `set_info` runs only on change.
pub(crate) struct ChunkFilter {
    chain: FilterChain,
    replay_gain: Option<ReplayGainFilter>,
    other_replay_gain: Option<ReplayGainFilter>,
    replay_gain_serial: u32,
    other_replay_gain_serial: u32,
    cross_fade_buffer: PcmBuffer,
    cross_fade_dither: PcmDither,
}

impl ChunkFilter {
    pub(crate) fn new(chain: FilterChain, replay_gain: Option<ReplayGainConfig>) -> Self {
        Self {
            chain,
            replay_gain: replay_gain.map(ReplayGainFilter::new),
            other_replay_gain: replay_gain.map(ReplayGainFilter::new),
            replay_gain_serial: 0,
            other_replay_gain_serial: 0,
            cross_fade_buffer: PcmBuffer::new(),
            cross_fade_dither: PcmDither::new(),
        }
    }

    /// Opens the replay-gain stages and the main chain; reports the
    /// chain's output format. Partially opened stages are closed again
    /// on failure.
    pub(crate) fn open(&mut self, in_format: AudioFormat) -> Result<AudioFormat, FilterError> {
        if let Some(filter) = &mut self.replay_gain {
            filter.open(in_format)?;
        }
        if let Some(filter) = &mut self.other_replay_gain {
            if let Err(error) = filter.open(in_format) {
                if let Some(first) = &mut self.replay_gain {
                    first.close();
                }
                return Err(error);
            }
        }

        match self.chain.open(in_format) {
            Ok(out_format) => {
                self.replay_gain_serial = 0;
                self.other_replay_gain_serial = 0;
                // Dither state lives for the session.
                self.cross_fade_dither.reset();
                Ok(out_format)
            }
            Err(error) => {
                if let Some(filter) = &mut self.replay_gain {
                    filter.close();
                }
                if let Some(filter) = &mut self.other_replay_gain {
                    filter.close();
                }
                Err(error)
            }
        }
    }

    pub(crate) fn set_output_format(&mut self, format: AudioFormat) -> Result<(), FilterError> {
        self.chain.set_output_format(format)
    }

    pub(crate) fn close(&mut self) {
        if let Some(filter) = &mut self.replay_gain {
            filter.close();
        }
        if let Some(filter) = &mut self.other_replay_gain {
            filter.close();
        }
        self.chain.close();
    }

    /// Produces the playable bytes for one chunk: replay gain, then the
    /// cross-fade mix when the chunk overlaps the next song, then the
    /// main chain. A zero-length result is valid and means "nothing to
    /// play for this chunk".
    pub(crate) fn filter_chunk<'a>(
        &'a mut self,
        chunk: &'a MusicChunk,
        in_format: AudioFormat,
    ) -> Result<&'a [u8], OutputError> {
        let data = chunk_data(
            chunk,
            self.replay_gain.as_mut(),
            &mut self.replay_gain_serial,
            in_format,
        )?;
        if data.is_empty() {
            return Ok(data);
        }

        let mut data = data;
        if let Some(other) = chunk.other() {
            let other_data = chunk_data(
                other,
                self.other_replay_gain.as_mut(),
                &mut self.other_replay_gain_serial,
                in_format,
            )?;
            if other_data.is_empty() {
                return Ok(&data[..0]);
            }

            // The longer `other` tail is the next song fading in and
            // passes through unmixed; the overlap is the shorter of
            // the two.
            let length = data.len().min(other_data.len());
            let dest = self.cross_fade_buffer.get(other_data.len());
            dest.copy_from_slice(other_data);
            mix(
                &mut self.cross_fade_dither,
                dest,
                &data[..length],
                in_format.format,
                1.0 - chunk.mix_ratio(),
            )
            .map_err(|_| OutputError::CrossFadeFormatUnsupported(in_format.format))?;
            data = dest;
        }

        self.chain
            .filter_pcm(data)
            .map_err(OutputError::FilterPcmFailed)
    }
}

/// Runs one side of a (possibly cross-faded) chunk through its
/// replay-gain filter, reconfiguring the filter when the chunk's serial
/// differs from the last one applied.
fn chunk_data<'a>(
    chunk: &'a MusicChunk,
    replay_gain: Option<&'a mut ReplayGainFilter>,
    serial_cell: &mut u32,
    in_format: AudioFormat,
) -> Result<&'a [u8], OutputError> {
    debug_assert!(chunk.check_format(in_format));

    let data = chunk.data();
    let Some(filter) = replay_gain else {
        return Ok(data);
    };
    if data.is_empty() {
        return Ok(data);
    }

    if chunk.replay_gain_serial() != *serial_cell {
        let info = (chunk.replay_gain_serial() != 0)
            .then(|| chunk.replay_gain_info())
            .flatten();
        filter.set_info(info);
        *serial_cell = chunk.replay_gain_serial();
    }

    filter.filter_pcm(data).map_err(OutputError::FilterPcmFailed)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use cadenza_audio_core::{
        AudioFormat, MusicChunk, ReplayGainConfig, ReplayGainInfo, ReplayGainTuple, SampleFormat,
    };

    use super::ChunkFilter;
    use crate::filter::{FilterChain, FilterError, PcmFilter};

    fn f32_format() -> AudioFormat {
        AudioFormat::new(44_100, SampleFormat::F32, 1)
    }

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    fn f32_samples(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().expect("sample")))
            .collect()
    }

    fn plain_filter() -> ChunkFilter {
        let mut filter = ChunkFilter::new(FilterChain::new(Vec::new()), None);
        filter.open(f32_format()).expect("open");
        filter
            .set_output_format(f32_format())
            .expect("set out format");
        filter
    }

    /// Counts how many times the main chain sees PCM.
    struct CountingFilter {
        calls: Arc<Mutex<usize>>,
    }

    impl PcmFilter for CountingFilter {
        fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, FilterError> {
            Ok(format)
        }

        fn close(&mut self) {}

        fn filter_pcm<'a>(&'a mut self, src: &'a [u8]) -> Result<&'a [u8], FilterError> {
            *self.calls.lock().expect("call counter") += 1;
            Ok(src)
        }
    }

    #[test]
    fn cross_fade_mixes_the_overlap_and_keeps_the_trailer() {
        let mut filter = plain_filter();

        // Primary is longer than `other`: the overlap is clamped to
        // `other`'s length and the result is exactly `other`'s length.
        let other = Arc::new(MusicChunk::new(f32_bytes(&[0.4; 15])));
        let chunk = MusicChunk::new(f32_bytes(&[1.0; 25])).with_other(other, 0.25);

        let out = filter
            .filter_chunk(&chunk, f32_format())
            .expect("filter chunk");
        let samples = f32_samples(out);
        assert_eq!(samples.len(), 15);
        // Primary weight 0.75, other weight 0.25.
        for sample in samples {
            assert!((sample - 0.85).abs() < 1e-6, "sample = {sample}");
        }
    }

    #[test]
    fn cross_fade_trailer_passes_unmixed_when_other_is_longer() {
        let mut filter = plain_filter();

        let other = Arc::new(MusicChunk::new(f32_bytes(&[0.4; 8])));
        let chunk = MusicChunk::new(f32_bytes(&[1.0; 5])).with_other(other, 0.5);

        let out = filter
            .filter_chunk(&chunk, f32_format())
            .expect("filter chunk");
        let samples = f32_samples(out);
        assert_eq!(samples.len(), 8);
        for sample in &samples[..5] {
            assert!((sample - 0.7).abs() < 1e-6, "sample = {sample}");
        }
        for sample in &samples[5..] {
            assert!((sample - 0.4).abs() < 1e-6, "sample = {sample}");
        }
    }

    #[test]
    fn empty_other_side_yields_nothing_and_skips_the_chain() {
        let calls = Arc::new(Mutex::new(0));
        let chain = FilterChain::new(vec![Box::new(CountingFilter {
            calls: Arc::clone(&calls),
        })]);
        let mut filter = ChunkFilter::new(chain, None);
        filter.open(f32_format()).expect("open");
        filter
            .set_output_format(f32_format())
            .expect("set out format");

        let other = Arc::new(MusicChunk::new(Vec::new()));
        let chunk = MusicChunk::new(f32_bytes(&[1.0; 4])).with_other(other, 0.5);

        let out = filter
            .filter_chunk(&chunk, f32_format())
            .expect("filter chunk");
        assert!(out.is_empty());
        assert_eq!(*calls.lock().expect("call counter"), 0);
    }

    #[test]
    fn unchanged_serial_does_not_reapply_replay_gain() {
        let mut filter = ChunkFilter::new(
            FilterChain::new(Vec::new()),
            Some(ReplayGainConfig {
                clipping_prevention: false,
                ..Default::default()
            }),
        );
        filter.open(f32_format()).expect("open");
        filter
            .set_output_format(f32_format())
            .expect("set out format");

        let info = |gain_db| ReplayGainInfo {
            track: ReplayGainTuple {
                gain_db: Some(gain_db),
                peak: None,
            },
            album: ReplayGainTuple::default(),
        };

        // First chunk applies -6.0206 dB (one half).
        let first = MusicChunk::new(f32_bytes(&[0.8])).with_replay_gain(7, info(-6.0206));
        let out = filter.filter_chunk(&first, f32_format()).expect("filter");
        assert!((f32_samples(out)[0] - 0.4).abs() < 1e-4);

        // Same serial with different info: the info must be ignored
        // because the serial has not changed.
        let second = MusicChunk::new(f32_bytes(&[0.8])).with_replay_gain(7, info(12.0));
        let out = filter.filter_chunk(&second, f32_format()).expect("filter");
        assert!((f32_samples(out)[0] - 0.4).abs() < 1e-4);

        // A new serial picks the new info up.
        let third = MusicChunk::new(f32_bytes(&[0.8])).with_replay_gain(8, info(-12.0412));
        let out = filter.filter_chunk(&third, f32_format()).expect("filter");
        assert!((f32_samples(out)[0] - 0.2).abs() < 1e-4);
    }

    #[test]
    fn serial_zero_clears_the_gain() {
        let mut filter = ChunkFilter::new(
            FilterChain::new(Vec::new()),
            Some(ReplayGainConfig::default()),
        );
        filter.open(f32_format()).expect("open");
        filter
            .set_output_format(f32_format())
            .expect("set out format");

        let info = ReplayGainInfo {
            track: ReplayGainTuple {
                gain_db: Some(-6.0206),
                peak: None,
            },
            album: ReplayGainTuple::default(),
        };
        let first = MusicChunk::new(f32_bytes(&[0.8])).with_replay_gain(3, info);
        let out = filter.filter_chunk(&first, f32_format()).expect("filter");
        assert!((f32_samples(out)[0] - 0.4).abs() < 1e-4);

        // Serial zero means "no replay-gain info": back to unity.
        let untagged = MusicChunk::new(f32_bytes(&[0.8]));
        let out = filter.filter_chunk(&untagged, f32_format()).expect("filter");
        assert!((f32_samples(out)[0] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn dsd_cross_fade_is_unsupported() {
        let format = AudioFormat::new(352_800, SampleFormat::Dsd, 2);
        let mut filter = ChunkFilter::new(FilterChain::new(Vec::new()), None);
        filter.open(format).expect("open");

        let other = Arc::new(MusicChunk::new(vec![0x69u8; 8]));
        let chunk = MusicChunk::new(vec![0x69u8; 8]).with_other(other, 0.5);
        assert!(filter.filter_chunk(&chunk, format).is_err());
    }
}
