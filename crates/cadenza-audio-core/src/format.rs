use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Encoding of a single sample within a frame.
///
/// `S24P32` is 24-bit audio padded to a 32-bit container, which is how
/// most hardware and drivers exchange 24-bit PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S8,
    S16,
    S24P32,
    S32,
    F32,
    /// Direct Stream Digital; one byte carries eight 1-bit samples.
    /// Opaque to the PCM kernels, which reject it.
    Dsd,
}

impl SampleFormat {
    /// Size of one sample of this format in bytes.
    pub const fn sample_size(self) -> usize {
        match self {
            Self::S8 | Self::Dsd => 1,
            Self::S16 => 2,
            Self::S24P32 | Self::S32 | Self::F32 => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S8 => "8",
            Self::S16 => "16",
            Self::S24P32 => "24",
            Self::S32 => "32",
            Self::F32 => "f",
            Self::Dsd => "dsd",
        };
        f.write_str(name)
    }
}

/// A fully concrete PCM stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub channels: u8,
}

pub const MAX_SAMPLE_RATE: u32 = 768_000;
pub const MAX_CHANNELS: u8 = 8;

impl AudioFormat {
    pub const fn new(sample_rate: u32, format: SampleFormat, channels: u8) -> Self {
        Self {
            sample_rate,
            format,
            channels,
        }
    }

    pub fn valid(self) -> bool {
        self.sample_rate > 0
            && self.sample_rate <= MAX_SAMPLE_RATE
            && self.channels > 0
            && self.channels <= MAX_CHANNELS
    }

    /// Size of one frame (one sample across all channels) in bytes.
    pub fn frame_size(self) -> usize {
        self.format.sample_size() * self.channels as usize
    }

    /// Returns a copy with every field a defined mask field overrides.
    pub fn apply_mask(self, mask: &AudioFormatMask) -> Self {
        Self {
            sample_rate: mask.sample_rate.unwrap_or(self.sample_rate),
            format: mask.format.unwrap_or(self.format),
            channels: mask.channels.unwrap_or(self.channels),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sample_rate, self.format, self.channels)
    }
}

/// A partially defined format, as it appears in output configuration.
///
/// Undefined fields leave the corresponding field of the negotiated
/// format untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioFormatMask {
    pub sample_rate: Option<u32>,
    pub format: Option<SampleFormat>,
    pub channels: Option<u8>,
}

impl AudioFormatMask {
    pub fn is_fully_defined(self) -> bool {
        self.sample_rate.is_some() && self.format.is_some() && self.channels.is_some()
    }

    /// Converts into a concrete format; `None` unless fully defined.
    pub fn into_format(self) -> Option<AudioFormat> {
        Some(AudioFormat {
            sample_rate: self.sample_rate?,
            format: self.format?,
            channels: self.channels?,
        })
    }
}

impl From<AudioFormat> for AudioFormatMask {
    fn from(format: AudioFormat) -> Self {
        Self {
            sample_rate: Some(format.sample_rate),
            format: Some(format.format),
            channels: Some(format.channels),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatParseError {
    #[error("expected \"rate:bits:channels\", got {0:?}")]
    Syntax(String),
    #[error("invalid sample rate: {0:?}")]
    SampleRate(String),
    #[error("invalid sample format: {0:?}")]
    SampleFormat(String),
    #[error("invalid channel count: {0:?}")]
    Channels(String),
}

impl FromStr for AudioFormatMask {
    type Err = FormatParseError;

    /// Parses the `"44100:16:2"` configuration syntax; `*` leaves a
    /// field undefined.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(rate), Some(bits), Some(channels), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(FormatParseError::Syntax(s.to_string()));
        };

        let sample_rate = match rate {
            "*" => None,
            _ => {
                let value: u32 = rate
                    .parse()
                    .map_err(|_| FormatParseError::SampleRate(rate.to_string()))?;
                if value == 0 || value > MAX_SAMPLE_RATE {
                    return Err(FormatParseError::SampleRate(rate.to_string()));
                }
                Some(value)
            }
        };

        let format = match bits {
            "*" => None,
            "8" => Some(SampleFormat::S8),
            "16" => Some(SampleFormat::S16),
            "24" => Some(SampleFormat::S24P32),
            "32" => Some(SampleFormat::S32),
            "f" => Some(SampleFormat::F32),
            "dsd" => Some(SampleFormat::Dsd),
            _ => return Err(FormatParseError::SampleFormat(bits.to_string())),
        };

        let channels = match channels {
            "*" => None,
            _ => {
                let value: u8 = channels
                    .parse()
                    .map_err(|_| FormatParseError::Channels(channels.to_string()))?;
                if value == 0 || value > MAX_CHANNELS {
                    return Err(FormatParseError::Channels(channels.to_string()));
                }
                Some(value)
            }
        };

        Ok(Self {
            sample_rate,
            format,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioFormat, AudioFormatMask, FormatParseError, SampleFormat};

    #[test]
    fn frame_size_counts_all_channels() {
        let format = AudioFormat::new(44_100, SampleFormat::S16, 2);
        assert_eq!(format.frame_size(), 4);

        let format = AudioFormat::new(48_000, SampleFormat::S24P32, 6);
        assert_eq!(format.frame_size(), 24);
    }

    #[test]
    fn validity_bounds() {
        assert!(AudioFormat::new(44_100, SampleFormat::S16, 2).valid());
        assert!(!AudioFormat::new(0, SampleFormat::S16, 2).valid());
        assert!(!AudioFormat::new(44_100, SampleFormat::S16, 0).valid());
        assert!(!AudioFormat::new(44_100, SampleFormat::S16, 9).valid());
        assert!(!AudioFormat::new(1_000_000, SampleFormat::S16, 2).valid());
    }

    #[test]
    fn mask_overrides_defined_fields_only() {
        let format = AudioFormat::new(44_100, SampleFormat::S16, 2);
        let mask = AudioFormatMask {
            sample_rate: Some(48_000),
            format: None,
            channels: None,
        };
        let masked = format.apply_mask(&mask);
        assert_eq!(masked, AudioFormat::new(48_000, SampleFormat::S16, 2));

        let empty = AudioFormatMask::default();
        assert_eq!(format.apply_mask(&empty), format);
    }

    #[test]
    fn parse_concrete_and_wildcard() {
        let mask: AudioFormatMask = "44100:16:2".parse().expect("parse concrete");
        assert!(mask.is_fully_defined());
        assert_eq!(
            mask.into_format(),
            Some(AudioFormat::new(44_100, SampleFormat::S16, 2))
        );

        let mask: AudioFormatMask = "48000:*:2".parse().expect("parse wildcard");
        assert!(!mask.is_fully_defined());
        assert_eq!(mask.sample_rate, Some(48_000));
        assert_eq!(mask.format, None);
        assert_eq!(mask.channels, Some(2));

        let mask: AudioFormatMask = "*:*:*".parse().expect("parse all-wildcard");
        assert_eq!(mask, AudioFormatMask::default());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(
            "44100:16".parse::<AudioFormatMask>(),
            Err(FormatParseError::Syntax(_))
        ));
        assert!(matches!(
            "44100:17:2".parse::<AudioFormatMask>(),
            Err(FormatParseError::SampleFormat(_))
        ));
        assert!(matches!(
            "0:16:2".parse::<AudioFormatMask>(),
            Err(FormatParseError::SampleRate(_))
        ));
        assert!(matches!(
            "44100:16:0".parse::<AudioFormatMask>(),
            Err(FormatParseError::Channels(_))
        ));
    }

    #[test]
    fn display_round_trips_the_config_syntax() {
        let format = AudioFormat::new(44_100, SampleFormat::F32, 2);
        assert_eq!(format.to_string(), "44100:f:2");
    }
}
