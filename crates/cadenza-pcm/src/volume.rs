use cadenza_audio_core::SampleFormat;
use thiserror::Error;

const S24_MAX: i32 = (1 << 23) - 1;
const S24_MIN: i32 = -(1 << 23);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GainError {
    #[error("cannot scale sample format {0}")]
    UnsupportedFormat(SampleFormat),
}

/// Applies a linear gain to an interleaved PCM buffer in place.
///
/// Integer samples round to nearest and clamp at full scale; float
/// samples scale without clamping. A scale of exactly 1.0 is a no-op,
/// keeping unity paths bit-perfect.
pub fn apply_gain(data: &mut [u8], format: SampleFormat, scale: f32) -> Result<(), GainError> {
    debug_assert_eq!(data.len() % format.sample_size(), 0);

    if scale == 1.0 {
        return Ok(());
    }
    let scale = f64::from(scale);

    match format {
        SampleFormat::S8 => {
            for sample in data.iter_mut() {
                let scaled = (f64::from(*sample as i8) * scale).round();
                *sample = scaled.clamp(-128.0, 127.0) as i8 as u8;
            }
        }
        SampleFormat::S16 => {
            for chunk in data.chunks_exact_mut(2) {
                let sample = i16::from_ne_bytes((&*chunk).try_into().expect("sample size"));
                let scaled = (f64::from(sample) * scale).round();
                let scaled = scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
                chunk.copy_from_slice(&scaled.to_ne_bytes());
            }
        }
        SampleFormat::S24P32 => {
            for chunk in data.chunks_exact_mut(4) {
                let sample = i32::from_ne_bytes((&*chunk).try_into().expect("sample size"));
                let scaled = (f64::from(sample) * scale).round();
                let scaled = scaled.clamp(f64::from(S24_MIN), f64::from(S24_MAX)) as i32;
                chunk.copy_from_slice(&scaled.to_ne_bytes());
            }
        }
        SampleFormat::S32 => {
            for chunk in data.chunks_exact_mut(4) {
                let sample = i32::from_ne_bytes((&*chunk).try_into().expect("sample size"));
                let scaled = (f64::from(sample) * scale).round();
                let scaled = scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
                chunk.copy_from_slice(&scaled.to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            let scale = scale as f32;
            for chunk in data.chunks_exact_mut(4) {
                let sample = f32::from_ne_bytes((&*chunk).try_into().expect("sample size"));
                chunk.copy_from_slice(&(sample * scale).to_ne_bytes());
            }
        }
        SampleFormat::Dsd => return Err(GainError::UnsupportedFormat(format)),
    }
    Ok(())
}
