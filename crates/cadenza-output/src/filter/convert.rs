use cadenza_audio_core::{AudioFormat, SampleFormat};
use cadenza_pcm::{ConvertError, convert_format, remix_channels};

use crate::filter::{FilterError, PcmFilter};

/// The conversion tail of every filter chain.
///
/// Opens as an identity filter; once the device format is known the
/// worker pins it with [`set_out_format`](Self::set_out_format) and the
/// stage converts sample format and channel count from then on.
/// Sample-rate changes are not this stage's job and are rejected.
pub struct ConvertFilter {
    in_format: Option<AudioFormat>,
    out_format: Option<AudioFormat>,
    format_buffer: Vec<u8>,
    remix_buffer: Vec<u8>,
}

impl Default for ConvertFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertFilter {
    pub fn new() -> Self {
        Self {
            in_format: None,
            out_format: None,
            format_buffer: Vec::new(),
            remix_buffer: Vec::new(),
        }
    }

    /// Pins the output format. Fails without touching the session when
    /// the conversion is outside this stage's reach.
    pub fn set_out_format(&mut self, format: AudioFormat) -> Result<(), FilterError> {
        let Some(in_format) = self.in_format else {
            return Err(FilterError::Stage(
                "convert filter is not open".to_string(),
            ));
        };

        if format.sample_rate != in_format.sample_rate {
            return Err(FilterError::RateMismatch {
                from: in_format.sample_rate,
                to: format.sample_rate,
            });
        }
        if (in_format.format == SampleFormat::Dsd || format.format == SampleFormat::Dsd)
            && in_format.format != format.format
        {
            return Err(FilterError::UnsupportedFormat(format));
        }
        match (in_format.channels, format.channels) {
            (from, to) if from == to => {}
            (1, 2) | (2, 1) => {}
            (from, to) => {
                return Err(FilterError::Convert(ConvertError::UnsupportedChannels {
                    from,
                    to,
                }));
            }
        }

        self.out_format = Some(format);
        Ok(())
    }
}

impl PcmFilter for ConvertFilter {
    fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, FilterError> {
        self.in_format = Some(format);
        self.out_format = None;
        Ok(format)
    }

    fn close(&mut self) {
        self.in_format = None;
        self.out_format = None;
    }

    fn filter_pcm<'a>(&'a mut self, src: &'a [u8]) -> Result<&'a [u8], FilterError> {
        let (Some(in_format), Some(out_format)) = (self.in_format, self.out_format) else {
            return Ok(src);
        };
        if in_format == out_format {
            return Ok(src);
        }

        let mut data = src;
        if in_format.format != out_format.format {
            convert_format(
                data,
                in_format.format,
                out_format.format,
                &mut self.format_buffer,
            )?;
            data = &self.format_buffer;
        }
        if in_format.channels != out_format.channels {
            remix_channels(
                data,
                out_format.format,
                in_format.channels,
                out_format.channels,
                &mut self.remix_buffer,
            )?;
            data = &self.remix_buffer;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use cadenza_audio_core::{AudioFormat, SampleFormat};

    use super::ConvertFilter;
    use crate::filter::{FilterError, PcmFilter};

    #[test]
    fn identity_until_configured() {
        let format = AudioFormat::new(44_100, SampleFormat::S16, 2);
        let mut filter = ConvertFilter::new();
        filter.open(format).expect("open");

        let data = [1u8, 2, 3, 4];
        let out = filter.filter_pcm(&data).expect("filter");
        assert_eq!(out.as_ptr(), data.as_ptr());
    }

    #[test]
    fn converts_format_and_channels() {
        let in_format = AudioFormat::new(44_100, SampleFormat::S16, 1);
        let out_format = AudioFormat::new(44_100, SampleFormat::F32, 2);
        let mut filter = ConvertFilter::new();
        filter.open(in_format).expect("open");
        filter.set_out_format(out_format).expect("set out format");

        let src: Vec<u8> = [16_384i16, -16_384]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let out = filter.filter_pcm(&src).expect("filter");

        let samples: Vec<f32> = out
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().expect("sample")))
            .collect();
        assert_eq!(samples.len(), 4);
        assert!((samples[0] - 0.5).abs() < 1e-6);
        assert!((samples[1] - 0.5).abs() < 1e-6);
        assert!((samples[2] + 0.5).abs() < 1e-6);
        assert!((samples[3] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_sample_rate_changes() {
        let mut filter = ConvertFilter::new();
        filter
            .open(AudioFormat::new(44_100, SampleFormat::S16, 2))
            .expect("open");
        let result = filter.set_out_format(AudioFormat::new(48_000, SampleFormat::S16, 2));
        assert!(matches!(
            result,
            Err(FilterError::RateMismatch {
                from: 44_100,
                to: 48_000
            })
        ));
    }
}
