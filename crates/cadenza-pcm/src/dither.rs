/// Error-feedback quantization dither.
///
/// Integer mixes are computed in fixed point with `scale_bits`
/// fractional bits; folding the result back to sample width truncates,
/// and plain truncation correlates the error with the signal. This
/// state adds triangular noise below the quantization step and feeds
/// the residual error forward into the next sample.
#[derive(Debug)]
pub struct PcmDither {
    feedback: i32,
    random: u32,
}

impl Default for PcmDither {
    fn default() -> Self {
        Self {
            feedback: 0,
            random: 0x9d2c_5681,
        }
    }
}

impl PcmDither {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn next_random(&mut self) -> u32 {
        // Numerical Recipes LCG; cheap and good enough for dither noise.
        self.random = self.random.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.random
    }

    /// Quantizes `value`, a fixed-point number with `scale_bits`
    /// fractional bits, down to its integer part.
    pub fn quantize(&mut self, value: i64, scale_bits: u32) -> i64 {
        debug_assert!(scale_bits > 0 && scale_bits < 31);
        let mask = (1i64 << scale_bits) - 1;

        let noise = (self.next_random() as i64 & mask) - (self.next_random() as i64 & mask);
        let shaped = value + i64::from(self.feedback) + noise;
        let quantized = shaped >> scale_bits;

        // Residual below the output step, with the injected noise
        // removed so only the quantization error is shaped.
        self.feedback = (shaped - (quantized << scale_bits) - noise) as i32;
        quantized
    }
}
