use crate::config::DspDefaults;
use crate::dsp::{db_to_linear, linear_to_db};
use crate::types::AudioBuffer;

const DEFAULT_ATTACK_MS: f32 = 5.0;
const DEFAULT_RELEASE_MS: f32 = 50.0;

/// Fixed compressor settings. Threshold and ratio come from the engine
/// configuration; attack and release are not exposed as knobs.
#[derive(Clone, Copy, Debug)]
pub struct CompressorParams {
    pub threshold_dbfs: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_dbfs: -20.0,
            ratio: 4.0,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
        }
    }
}

impl CompressorParams {
    pub fn from_defaults(defaults: &DspDefaults) -> Self {
        Self {
            threshold_dbfs: defaults.compression_threshold_dbfs,
            ratio: defaults.compression_ratio,
            ..Default::default()
        }
    }
}

/// Downward dynamic-range compression with an attack/release envelope
/// follower. The envelope is detected on the loudest channel of each frame
/// and the computed gain is applied to all channels, so the stereo image is
/// not skewed.
pub fn compress(input: &AudioBuffer, params: &CompressorParams) -> AudioBuffer {
    if input.samples.is_empty() || params.ratio <= 1.0 {
        return input.clone();
    }

    let ch = input.channels as usize;
    let attack = envelope_coeff(params.attack_ms, input.sample_rate);
    let release = envelope_coeff(params.release_ms, input.sample_rate);
    let slope = 1.0 - 1.0 / params.ratio;

    let mut samples = Vec::with_capacity(input.samples.len());
    let mut env = 0.0f32;

    for frame in input.samples.chunks(ch) {
        let level = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let coeff = if level > env { attack } else { release };
        env = coeff * env + (1.0 - coeff) * level;

        let env_db = linear_to_db(env);
        let gain = if env_db > params.threshold_dbfs {
            db_to_linear((params.threshold_dbfs - env_db) * slope)
        } else {
            1.0
        };

        samples.extend(frame.iter().map(|s| s * gain));
    }

    AudioBuffer {
        samples,
        sample_rate: input.sample_rate,
        channels: input.channels,
        bits_per_sample: input.bits_per_sample,
    }
}

fn envelope_coeff(ms: f32, sample_rate: u32) -> f32 {
    let samples = (ms * 0.001 * sample_rate as f32).max(1.0);
    (-1.0 / samples).exp()
}
