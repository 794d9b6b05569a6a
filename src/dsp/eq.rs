use std::sync::Arc;

use num_complex::Complex32;
use rayon::prelude::*;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

use crate::dsp::db_to_linear;
use crate::types::AudioBuffer;

const N_FFT: usize = 4096;
const HOP: usize = 1024;

/// Fixed analysis bands of the three-band equalizer, in Hz.
pub const LOW_BAND_HZ: (f32, f32) = (30.0, 250.0);
pub const MID_BAND_HZ: (f32, f32) = (250.0, 4000.0);
pub const HIGH_BAND_HZ: (f32, f32) = (4000.0, 16_000.0);

/// Three-band equalizer. Splits the signal into the fixed low/mid/high bands,
/// scales each band by `10^(gain/20)` and sums the result. Content outside
/// all three bands is removed, matching band-sum semantics.
///
/// Implemented as per-bin scaling in an overlap-added STFT (Hann window,
/// 4096/1024), which keeps the split exactly complementary at band edges.
pub fn apply_eq(input: &AudioBuffer, low_db: f32, mid_db: f32, high_db: f32) -> AudioBuffer {
    if input.samples.is_empty() {
        return input.clone();
    }

    let gains = bin_gains(input.sample_rate, low_db, mid_db, high_db);
    let window = hann_window(N_FFT);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let ifft = planner.plan_fft_inverse(N_FFT);

    let channels = input.channels as usize;
    let frames = input.frames();

    // Deinterleave, filter each channel independently, reinterleave.
    let planes: Vec<Vec<f32>> = (0..channels)
        .map(|ch| {
            input
                .samples
                .iter()
                .skip(ch)
                .step_by(channels)
                .copied()
                .collect()
        })
        .collect();

    let filtered: Vec<Vec<f32>> = planes
        .par_iter()
        .map(|plane| filter_channel(plane, &gains, &fft, &ifft, &window))
        .collect();

    let mut samples = vec![0.0f32; input.samples.len()];
    for (ch, plane) in filtered.iter().enumerate() {
        for (i, s) in plane.iter().enumerate().take(frames) {
            samples[i * channels + ch] = *s;
        }
    }

    AudioBuffer {
        samples,
        sample_rate: input.sample_rate,
        channels: input.channels,
        bits_per_sample: input.bits_per_sample,
    }
}

/// Per-bin linear gain, mirrored so negative frequencies match and the
/// filtered signal stays real.
fn bin_gains(sample_rate: u32, low_db: f32, mid_db: f32, high_db: f32) -> Vec<f32> {
    let low = db_to_linear(low_db);
    let mid = db_to_linear(mid_db);
    let high = db_to_linear(high_db);
    (0..N_FFT)
        .map(|k| {
            let folded = k.min(N_FFT - k);
            let freq = folded as f32 * sample_rate as f32 / N_FFT as f32;
            if freq >= LOW_BAND_HZ.0 && freq < LOW_BAND_HZ.1 {
                low
            } else if freq >= MID_BAND_HZ.0 && freq < MID_BAND_HZ.1 {
                mid
            } else if freq >= HIGH_BAND_HZ.0 && freq < HIGH_BAND_HZ.1 {
                high
            } else {
                0.0
            }
        })
        .collect()
}

fn hann_window(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// STFT → scale bins → iSTFT with overlap-add and window-sum normalization,
/// center-padded by half a window on both sides.
fn filter_channel(
    signal: &[f32],
    gains: &[f32],
    fft: &Arc<dyn Fft<f32>>,
    ifft: &Arc<dyn Fft<f32>>,
    window: &[f32],
) -> Vec<f32> {
    let t = signal.len();
    let pad = N_FFT / 2;
    let padded_len = pad + t + pad;

    let mut padded = vec![0.0f32; padded_len];
    padded[pad..pad + t].copy_from_slice(signal);

    let n_frames = 1 + t / HOP;
    let mut out = vec![0.0f32; padded_len];
    let mut window_sum = vec![0.0f32; padded_len];
    let mut buf = vec![Complex32::zero(); N_FFT];
    let scale = 1.0 / (N_FFT as f32);

    for fr in 0..n_frames {
        let start = fr * HOP;
        for i in 0..N_FFT {
            buf[i] = Complex32::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        for (bin, gain) in buf.iter_mut().zip(gains) {
            *bin *= *gain;
        }
        ifft.process(&mut buf);
        for i in 0..N_FFT {
            let pos = start + i;
            let w = window[i];
            out[pos] += buf[i].re * w * scale;
            window_sum[pos] += w * w;
        }
    }

    (pad..pad + t)
        .map(|i| {
            if window_sum[i] > 1e-10 {
                out[i] / window_sum[i]
            } else {
                0.0
            }
        })
        .collect()
}
