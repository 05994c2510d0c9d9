use cadenza_audio_core::SampleFormat;
use thiserror::Error;

const S24_MAX: i32 = (1 << 23) - 1;
const S24_MIN: i32 = -(1 << 23);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("cannot convert sample format {0}")]
    UnsupportedFormat(SampleFormat),
    #[error("cannot remix {from} channels to {to}")]
    UnsupportedChannels { from: u8, to: u8 },
}

/// Full-scale normalization per format, so every PCM sample round-trips
/// through the same [-1.0, 1.0) space. f64 keeps 32-bit integers exact.
fn sample_to_f64(bytes: &[u8], format: SampleFormat) -> f64 {
    match format {
        SampleFormat::S8 => f64::from(bytes[0] as i8) / 128.0,
        SampleFormat::S16 => {
            f64::from(i16::from_ne_bytes(bytes.try_into().expect("sample size"))) / 32_768.0
        }
        SampleFormat::S24P32 => {
            f64::from(i32::from_ne_bytes(bytes.try_into().expect("sample size")))
                / f64::from(1 << 23)
        }
        SampleFormat::S32 => {
            f64::from(i32::from_ne_bytes(bytes.try_into().expect("sample size")))
                / f64::from(1u32 << 31)
        }
        SampleFormat::F32 => f64::from(f32::from_ne_bytes(
            bytes.try_into().expect("sample size"),
        )),
        SampleFormat::Dsd => unreachable!("dsd rejected before dispatch"),
    }
}

fn f64_to_sample(value: f64, format: SampleFormat, out: &mut Vec<u8>) {
    match format {
        SampleFormat::S8 => {
            let scaled = (value * 128.0).round().clamp(-128.0, 127.0) as i8;
            out.push(scaled as u8);
        }
        SampleFormat::S16 => {
            let scaled =
                (value * 32_768.0)
                    .round()
                    .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            out.extend_from_slice(&scaled.to_ne_bytes());
        }
        SampleFormat::S24P32 => {
            let scaled = (value * f64::from(1 << 23))
                .round()
                .clamp(f64::from(S24_MIN), f64::from(S24_MAX)) as i32;
            out.extend_from_slice(&scaled.to_ne_bytes());
        }
        SampleFormat::S32 => {
            let scaled = (value * f64::from(1u32 << 31))
                .round()
                .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
            out.extend_from_slice(&scaled.to_ne_bytes());
        }
        SampleFormat::F32 => out.extend_from_slice(&(value as f32).to_ne_bytes()),
        SampleFormat::Dsd => unreachable!("dsd rejected before dispatch"),
    }
}

/// Converts every sample of `src` from one format to another into
/// `dest` (cleared first).
pub fn convert_format(
    src: &[u8],
    from: SampleFormat,
    to: SampleFormat,
    dest: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    if from == SampleFormat::Dsd {
        return Err(ConvertError::UnsupportedFormat(from));
    }
    if to == SampleFormat::Dsd {
        return Err(ConvertError::UnsupportedFormat(to));
    }
    debug_assert_eq!(src.len() % from.sample_size(), 0);

    dest.clear();
    dest.reserve(src.len() / from.sample_size() * to.sample_size());
    for bytes in src.chunks_exact(from.sample_size()) {
        f64_to_sample(sample_to_f64(bytes, from), to, dest);
    }
    Ok(())
}

/// Remixes interleaved frames between channel counts into `dest`
/// (cleared first). Mono duplicates into every output channel;
/// stereo downmixes by averaging. Other combinations are unsupported.
pub fn remix_channels(
    src: &[u8],
    format: SampleFormat,
    from: u8,
    to: u8,
    dest: &mut Vec<u8>,
) -> Result<(), ConvertError> {
    if format == SampleFormat::Dsd {
        return Err(ConvertError::UnsupportedFormat(format));
    }
    let sample_size = format.sample_size();
    debug_assert_eq!(src.len() % (sample_size * from as usize), 0);

    dest.clear();
    match (from, to) {
        (1, 2) => {
            // Duplication is format-agnostic, so mono upmix stays
            // bit-perfect.
            for sample in src.chunks_exact(sample_size) {
                dest.extend_from_slice(sample);
                dest.extend_from_slice(sample);
            }
        }
        (2, 1) => {
            for frame in src.chunks_exact(sample_size * 2) {
                let left = sample_to_f64(&frame[..sample_size], format);
                let right = sample_to_f64(&frame[sample_size..], format);
                f64_to_sample((left + right) / 2.0, format, dest);
            }
        }
        (from, to) => return Err(ConvertError::UnsupportedChannels { from, to }),
    }
    Ok(())
}
