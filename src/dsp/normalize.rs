use crate::dsp::db_to_linear;
use crate::types::AudioBuffer;

/// Scales the buffer so its peak amplitude sits at `target_dbfs`.
///
/// A zero-peak (silent) buffer passes through unchanged, and normalizing an
/// already-normalized buffer to the same target is a no-op up to rounding.
pub fn normalize_peak(input: &AudioBuffer, target_dbfs: f32) -> AudioBuffer {
    let peak = input.peak();
    if peak <= 0.0 {
        return input.clone();
    }

    let gain = db_to_linear(target_dbfs) / peak;
    AudioBuffer {
        samples: input.samples.iter().map(|s| s * gain).collect(),
        sample_rate: input.sample_rate,
        channels: input.channels,
        bits_per_sample: input.bits_per_sample,
    }
}
