use cadenza_audio_core::SampleFormat;
use thiserror::Error;

use crate::dither::PcmDither;

/// Fixed-point scale used for integer mixing.
const PORTION_BITS: u32 = 10;
const PORTION_ONE: i64 = 1 << PORTION_BITS;

const S24_MAX: i32 = (1 << 23) - 1;
const S24_MIN: i32 = -(1 << 23);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MixError {
    #[error("cannot mix sample format {0}")]
    UnsupportedFormat(SampleFormat),
}

/// Mixes `src` into `dest` in place over `src.len()` bytes:
/// `dest = dest * (1 - portion) + src * portion`, weights summing to 1.
///
/// Bytes of `dest` beyond `src.len()` are left untouched. Integer
/// formats mix in fixed point and quantize through `dither`; the float
/// format mixes directly.
pub fn mix(
    dither: &mut PcmDither,
    dest: &mut [u8],
    src: &[u8],
    format: SampleFormat,
    portion: f32,
) -> Result<(), MixError> {
    debug_assert!(src.len() <= dest.len());
    debug_assert!((0.0..=1.0).contains(&portion));
    debug_assert_eq!(src.len() % format.sample_size(), 0);

    let dest = &mut dest[..src.len()];
    match format {
        SampleFormat::S8 => {
            let portion = portion_fixed(portion);
            for (d, s) in dest.iter_mut().zip(src) {
                let mixed = weigh(i64::from(*d as i8), i64::from(*s as i8), portion);
                *d = dither.quantize(mixed, PORTION_BITS).clamp(-128, 127) as i8 as u8;
            }
        }
        SampleFormat::S16 => {
            let portion = portion_fixed(portion);
            for (d, s) in zip_samples::<2>(dest, src) {
                let a = i64::from(i16::from_ne_bytes(*d));
                let b = i64::from(i16::from_ne_bytes(s));
                let mixed = dither
                    .quantize(weigh(a, b, portion), PORTION_BITS)
                    .clamp(i64::from(i16::MIN), i64::from(i16::MAX));
                *d = (mixed as i16).to_ne_bytes();
            }
        }
        SampleFormat::S24P32 => {
            let portion = portion_fixed(portion);
            for (d, s) in zip_samples::<4>(dest, src) {
                let a = i64::from(i32::from_ne_bytes(*d));
                let b = i64::from(i32::from_ne_bytes(s));
                let mixed = dither
                    .quantize(weigh(a, b, portion), PORTION_BITS)
                    .clamp(i64::from(S24_MIN), i64::from(S24_MAX));
                *d = (mixed as i32).to_ne_bytes();
            }
        }
        SampleFormat::S32 => {
            let portion = portion_fixed(portion);
            for (d, s) in zip_samples::<4>(dest, src) {
                let a = i64::from(i32::from_ne_bytes(*d));
                let b = i64::from(i32::from_ne_bytes(s));
                let mixed = dither
                    .quantize(weigh(a, b, portion), PORTION_BITS)
                    .clamp(i64::from(i32::MIN), i64::from(i32::MAX));
                *d = (mixed as i32).to_ne_bytes();
            }
        }
        SampleFormat::F32 => {
            let keep = 1.0 - portion;
            for (d, s) in zip_samples::<4>(dest, src) {
                let a = f32::from_ne_bytes(*d);
                let b = f32::from_ne_bytes(s);
                *d = (a * keep + b * portion).to_ne_bytes();
            }
        }
        SampleFormat::Dsd => return Err(MixError::UnsupportedFormat(format)),
    }
    Ok(())
}

fn portion_fixed(portion: f32) -> i64 {
    (f64::from(portion) * PORTION_ONE as f64).round() as i64
}

fn weigh(dest: i64, src: i64, portion: i64) -> i64 {
    dest * (PORTION_ONE - portion) + src * portion
}

fn zip_samples<'a, const N: usize>(
    dest: &'a mut [u8],
    src: &'a [u8],
) -> impl Iterator<Item = (&'a mut [u8; N], [u8; N])> {
    let dest = dest
        .chunks_exact_mut(N)
        .map(|chunk| -> &'a mut [u8; N] { chunk.try_into().expect("chunk size") });
    let src = src
        .chunks_exact(N)
        .map(|chunk| -> [u8; N] { chunk.try_into().expect("chunk size") });
    dest.zip(src)
}

#[cfg(test)]
mod tests {
    use cadenza_audio_core::SampleFormat;

    use super::{MixError, mix};
    use crate::dither::PcmDither;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    #[test]
    fn float_mix_is_a_weighted_sum() {
        let mut dither = PcmDither::new();
        let mut dest = f32_bytes(&[0.4, 0.4, -0.4]);
        let src = f32_bytes(&[1.0, -1.0, 1.0]);

        mix(&mut dither, &mut dest, &src, SampleFormat::F32, 0.75).expect("mix f32");

        let mixed: Vec<f32> = dest
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().expect("sample")))
            .collect();
        assert!((mixed[0] - 0.85).abs() < 1e-6);
        assert!((mixed[1] - (-0.65)).abs() < 1e-6);
        assert!((mixed[2] - 0.65).abs() < 1e-6);
    }

    #[test]
    fn integer_mix_matches_the_weighted_sum_within_dither() {
        let mut dither = PcmDither::new();
        let mut dest = i16_bytes(&[10_000, -10_000, 0, 20_000]);
        let src = i16_bytes(&[-2_000, 2_000, 8_000, -8_000]);

        mix(&mut dither, &mut dest, &src, SampleFormat::S16, 0.5).expect("mix s16");

        let expected = [4_000i64, -4_000, 4_000, 6_000];
        for (chunk, want) in dest.chunks_exact(2).zip(expected) {
            let got = i64::from(i16::from_ne_bytes(chunk.try_into().expect("sample")));
            assert!((got - want).abs() <= 2, "got {got}, want {want}");
        }
    }

    #[test]
    fn integer_mix_clamps_at_full_scale() {
        let mut dither = PcmDither::new();
        // Both operands at the rail; dither noise must not wrap.
        let mut dest = i16_bytes(&[i16::MAX; 64]);
        let src = i16_bytes(&[i16::MAX; 64]);

        mix(&mut dither, &mut dest, &src, SampleFormat::S16, 0.5).expect("mix s16");

        for chunk in dest.chunks_exact(2) {
            let got = i16::from_ne_bytes(chunk.try_into().expect("sample"));
            assert!(got >= i16::MAX - 2);
        }
    }

    #[test]
    fn trailer_bytes_are_untouched() {
        let mut dither = PcmDither::new();
        let mut dest = f32_bytes(&[0.5, 0.5, 0.5]);
        let src = f32_bytes(&[0.0]);

        mix(&mut dither, &mut dest, &src, SampleFormat::F32, 1.0).expect("mix f32");

        let tail: Vec<f32> = dest[4..]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().expect("sample")))
            .collect();
        assert_eq!(tail, vec![0.5, 0.5]);
    }

    #[test]
    fn dsd_is_rejected() {
        let mut dither = PcmDither::new();
        let mut dest = vec![0u8; 8];
        let src = vec![0u8; 8];
        assert_eq!(
            mix(&mut dither, &mut dest, &src, SampleFormat::Dsd, 0.5),
            Err(MixError::UnsupportedFormat(SampleFormat::Dsd))
        );
    }
}
