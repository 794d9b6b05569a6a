use approx::assert_abs_diff_eq;
use voxlift_core::dsp::{
    apply_eq, compress, noise_gate, normalize_peak, trim_silence, CompressorParams,
};
use voxlift_core::AudioBuffer;

fn sine(freq: f32, duration_secs: f32, sample_rate: u32, channels: u16, amplitude: f32) -> AudioBuffer {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let v = (2.0 * std::f32::consts::PI * freq * t).sin() * amplitude;
        for _ in 0..channels {
            samples.push(v);
        }
    }
    AudioBuffer::new(samples, sample_rate, channels, 16)
}

fn assert_layout_preserved(input: &AudioBuffer, output: &AudioBuffer) {
    assert_eq!(output.sample_rate, input.sample_rate);
    assert_eq!(output.channels, input.channels);
    assert_eq!(output.bits_per_sample, input.bits_per_sample);
}

// --- EQ ---

#[test]
fn eq_preserves_layout_and_length() {
    let input = sine(1000.0, 1.0, 44_100, 2, 0.5);
    let output = apply_eq(&input, 3.0, -2.0, 1.0);
    assert_layout_preserved(&input, &output);
    assert_eq!(output.frames(), input.frames());
}

#[test]
fn eq_identity_inside_band() {
    // A mid-band tone with all gains at 0 dB must come back unchanged.
    let input = sine(1000.0, 1.0, 44_100, 1, 0.5);
    let output = apply_eq(&input, 0.0, 0.0, 0.0);

    let margin = 4096;
    for i in margin..input.frames() - margin {
        assert_abs_diff_eq!(output.samples[i], input.samples[i], epsilon = 5e-3);
    }
}

#[test]
fn eq_silence_passes_through() {
    let input = AudioBuffer::silent(44_100, 44_100, 2, 16);
    let output = apply_eq(&input, 6.0, -6.0, 12.0);
    assert_eq!(output.frames(), input.frames());
    assert!(output.samples.iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn eq_low_band_cut_attenuates_low_tone() {
    let input = sine(100.0, 1.0, 44_100, 1, 0.5);
    let cut = apply_eq(&input, -12.0, 0.0, 0.0);

    // -12 dB is a factor of ~0.251 in amplitude.
    let margin = 4096;
    let rms = |b: &AudioBuffer| {
        let s = &b.samples[margin..b.samples.len() - margin];
        (s.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>() / s.len() as f64).sqrt() as f32
    };
    let ratio = rms(&cut) / rms(&input);
    assert!(
        (0.2..0.3).contains(&ratio),
        "expected ~0.25 attenuation, got {ratio}"
    );
}

#[test]
fn eq_mid_boost_scales_mid_tone() {
    let input = sine(1000.0, 1.0, 44_100, 1, 0.25);
    let boosted = apply_eq(&input, 0.0, 6.0, 0.0);

    let margin = 4096;
    let rms = |b: &AudioBuffer| {
        let s = &b.samples[margin..b.samples.len() - margin];
        (s.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>() / s.len() as f64).sqrt() as f32
    };
    let ratio = rms(&boosted) / rms(&input);
    assert!(
        (1.9..2.1).contains(&ratio),
        "expected ~2.0 boost, got {ratio}"
    );
}

#[test]
fn eq_extreme_cut_yields_near_silence() {
    // Not an error condition: everything near zero is the correct result.
    let input = sine(1000.0, 0.5, 44_100, 1, 0.5);
    let output = apply_eq(&input, -12.0, -12.0, -12.0);
    assert!(output.peak() < input.peak() * 0.3);
}

// --- Noise gate ---

#[test]
fn gate_all_silent_returns_silent_buffer_of_same_duration() {
    let input = AudioBuffer::silent(2 * 44_100, 44_100, 2, 16);
    let output = noise_gate(&input, -40.0);
    assert_eq!(output.frames(), input.frames());
    assert!(output.samples.iter().all(|s| *s == 0.0));
    assert_layout_preserved(&input, &output);
}

#[test]
fn gate_removes_qualifying_interior_silence() {
    let sr = 44_100;
    let loud = sine(440.0, 1.0, sr, 1, 0.5);
    let gap = AudioBuffer::silent(sr as usize, sr, 1, 16);

    let mut samples = loud.samples.clone();
    samples.extend_from_slice(&gap.samples);
    samples.extend_from_slice(&loud.samples);
    let input = AudioBuffer::new(samples, sr, 1, 16);

    let output = noise_gate(&input, -40.0);

    // 300 blocks of 10 ms; the 100-block silent run shrinks by 10 blocks of
    // padding on each side, so 80 blocks (0.8 s) are removed.
    let block = (sr as usize) / 100;
    assert_eq!(output.frames(), 220 * block);
    assert_layout_preserved(&input, &output);
}

#[test]
fn gate_keeps_continuous_signal_untouched() {
    let input = sine(440.0, 2.0, 44_100, 2, 0.5);
    let output = noise_gate(&input, -40.0);
    assert_eq!(output.frames(), input.frames());
}

#[test]
fn gate_ignores_short_silence_runs() {
    let sr = 44_100;
    let loud = sine(440.0, 1.0, sr, 1, 0.5);
    // 200 ms gap, below the 500 ms minimum run.
    let gap = AudioBuffer::silent(sr as usize / 5, sr, 1, 16);

    let mut samples = loud.samples.clone();
    samples.extend_from_slice(&gap.samples);
    samples.extend_from_slice(&loud.samples);
    let input = AudioBuffer::new(samples, sr, 1, 16);

    let output = noise_gate(&input, -40.0);
    assert_eq!(output.frames(), input.frames());
}

// --- Silence trimmer ---

#[test]
fn trim_all_silent_keeps_duration() {
    let input = AudioBuffer::silent(3 * 44_100, 44_100, 1, 16);
    let output = trim_silence(&input);
    assert_eq!(output.frames(), input.frames());
}

#[test]
fn trim_removes_long_dead_air() {
    let sr = 44_100;
    let loud = sine(440.0, 2.0, sr, 1, 0.5);
    let gap = AudioBuffer::silent(2 * sr as usize, sr, 1, 16);

    let mut samples = loud.samples.clone();
    samples.extend_from_slice(&gap.samples);
    samples.extend_from_slice(&loud.samples);
    let input = AudioBuffer::new(samples, sr, 1, 16);

    let output = trim_silence(&input);

    // 600 blocks; the 200-block gap shrinks by 25 padding blocks per side,
    // removing 150 blocks (1.5 s).
    let block = (sr as usize) / 100;
    assert_eq!(output.frames(), 450 * block);
}

#[test]
fn trim_is_less_aggressive_than_gate_on_short_gaps() {
    let sr = 44_100;
    let loud = sine(440.0, 1.0, sr, 1, 0.5);
    // 700 ms gap: the gate would cut it, the trimmer must not.
    let gap = AudioBuffer::silent(sr as usize * 7 / 10, sr, 1, 16);

    let mut samples = loud.samples.clone();
    samples.extend_from_slice(&gap.samples);
    samples.extend_from_slice(&loud.samples);
    let input = AudioBuffer::new(samples, sr, 1, 16);

    let trimmed = trim_silence(&input);
    assert_eq!(trimmed.frames(), input.frames());

    let gated = noise_gate(&input, -40.0);
    assert!(gated.frames() < input.frames());
}

// --- Compressor ---

#[test]
fn compressor_reduces_level_above_threshold() {
    let input = sine(440.0, 1.0, 44_100, 1, 0.9);
    let output = compress(&input, &CompressorParams::default());
    assert_layout_preserved(&input, &output);
    assert_eq!(output.frames(), input.frames());

    // Judge the steady state, after the attack transient has settled.
    let tail = &output.samples[output.samples.len() / 2..];
    let tail_peak = tail.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(
        tail_peak < 0.35,
        "expected heavy gain reduction, steady-state peak = {tail_peak}"
    );
    assert!(tail_peak > 0.05);
}

#[test]
fn compressor_transparent_below_threshold() {
    // -34 dBFS stays well under the -20 dBFS threshold.
    let input = sine(440.0, 0.5, 44_100, 2, 0.02);
    let output = compress(&input, &CompressorParams::default());
    for (a, b) in input.samples.iter().zip(&output.samples) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn compressor_applies_same_gain_to_both_channels() {
    let sr = 44_100;
    let frames = sr as usize / 2;
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / sr as f32;
        let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        samples.push(v * 0.9);
        samples.push(v * 0.45);
    }
    let input = AudioBuffer::new(samples, sr, 2, 16);
    let output = compress(&input, &CompressorParams::default());

    // The inter-channel ratio survives compression.
    for frame in output.samples.chunks(2) {
        if frame[0].abs() > 1e-3 {
            assert_abs_diff_eq!(frame[1] / frame[0], 0.5, epsilon = 1e-3);
        }
    }
}

// --- Normalizer ---

#[test]
fn normalize_reaches_target_peak() {
    let input = sine(440.0, 1.0, 44_100, 2, 0.5);
    let output = normalize_peak(&input, -3.0);
    let target = 10f32.powf(-3.0 / 20.0);
    assert_abs_diff_eq!(output.peak(), target, epsilon = 1e-4);
    assert_layout_preserved(&input, &output);
}

#[test]
fn normalize_is_idempotent() {
    let input = sine(440.0, 1.0, 44_100, 1, 0.3);
    let once = normalize_peak(&input, -3.0);
    let twice = normalize_peak(&once, -3.0);
    assert_abs_diff_eq!(once.peak(), twice.peak(), epsilon = 1e-6);
}

#[test]
fn normalize_leaves_silence_alone() {
    let input = AudioBuffer::silent(44_100, 44_100, 1, 16);
    let output = normalize_peak(&input, -3.0);
    assert_eq!(output.frames(), input.frames());
    assert!(output.samples.iter().all(|s| *s == 0.0));
}
