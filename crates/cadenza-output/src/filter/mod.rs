mod chunk_filter;
mod convert;
mod replay_gain;

use cadenza_audio_core::AudioFormat;
use cadenza_pcm::{ConvertError, GainError};
use thiserror::Error;

pub(crate) use chunk_filter::ChunkFilter;
pub use convert::ConvertFilter;
pub use replay_gain::ReplayGainFilter;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unsupported audio format {0}")]
    UnsupportedFormat(AudioFormat),
    #[error("sample rate conversion from {from}Hz to {to}Hz is not supported")]
    RateMismatch { from: u32, to: u32 },
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Gain(#[from] GainError),
    #[error("filter stage failure: {0}")]
    Stage(String),
}

/// One stage of the output filter chain.
///
/// `filter_pcm` may return the input slice unchanged or a slice into a
/// stage-owned buffer; either way the result is only valid until the
/// next call, which the borrow makes structural.
pub trait PcmFilter: Send {
    /// Begins a session with the given input format and reports the
    /// format this stage produces.
    fn open(&mut self, format: AudioFormat) -> Result<AudioFormat, FilterError>;

    fn close(&mut self);

    fn filter_pcm<'a>(&'a mut self, src: &'a [u8]) -> Result<&'a [u8], FilterError>;
}

/// The configured filter stack of one output, with the format
/// conversion stage pinned at the tail.
pub struct FilterChain {
    filters: Vec<Box<dyn PcmFilter>>,
    convert: ConvertFilter,
    out_format: Option<AudioFormat>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn PcmFilter>>) -> Self {
        Self {
            filters,
            convert: ConvertFilter::new(),
            out_format: None,
        }
    }

    /// Opens every stage front to back. On failure the already-opened
    /// prefix is closed again and the chain stays closed. Opening an
    /// already-open chain reports the negotiated format unchanged.
    pub fn open(&mut self, in_format: AudioFormat) -> Result<AudioFormat, FilterError> {
        if let Some(format) = self.out_format {
            return Ok(format);
        }

        let mut format = in_format;
        for index in 0..self.filters.len() {
            match self.filters[index].open(format) {
                Ok(out) => format = out,
                Err(error) => {
                    for filter in &mut self.filters[..index] {
                        filter.close();
                    }
                    return Err(error);
                }
            }
        }

        let format = match self.convert.open(format) {
            Ok(format) => format,
            Err(error) => {
                for filter in &mut self.filters {
                    filter.close();
                }
                return Err(error);
            }
        };

        self.out_format = Some(format);
        Ok(format)
    }

    /// Reconfigures the conversion tail to produce `format`, once the
    /// device has settled on its format.
    pub fn set_output_format(&mut self, format: AudioFormat) -> Result<(), FilterError> {
        self.convert.set_out_format(format)
    }

    pub fn close(&mut self) {
        if self.out_format.take().is_none() {
            return;
        }
        for filter in &mut self.filters {
            filter.close();
        }
        self.convert.close();
    }

    pub fn filter_pcm<'a>(&'a mut self, src: &'a [u8]) -> Result<&'a [u8], FilterError> {
        fn run<'a>(
            filters: &'a mut [Box<dyn PcmFilter>],
            data: &'a [u8],
        ) -> Result<&'a [u8], FilterError> {
            match filters.split_first_mut() {
                None => Ok(data),
                Some((first, rest)) => run(rest, first.filter_pcm(data)?),
            }
        }

        let data = run(&mut self.filters, src)?;
        self.convert.filter_pcm(data)
    }
}
