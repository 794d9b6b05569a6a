use crate::dsp::linear_to_db;
use crate::types::AudioBuffer;

/// Analysis block size for silence detection.
const BLOCK_MS: u64 = 10;

const GATE_MIN_SILENCE_MS: u64 = 500;
const GATE_PADDING_MS: u64 = 100;

const TRIM_MIN_SILENCE_MS: u64 = 1000;
const TRIM_PADDING_MS: u64 = 250;
/// The trimmer keys its threshold off the buffer's own loudness, this far
/// below the measured RMS level.
const TRIM_OFFSET_DB: f32 = 16.0;

/// Parameters of one silence split pass.
#[derive(Clone, Copy, Debug)]
pub struct SilenceSplit {
    pub threshold_dbfs: f32,
    pub min_silence_ms: u64,
    pub padding_ms: u64,
}

/// Noise gate: drops any silence run of at least 500 ms below the threshold,
/// keeping 100 ms of padding at segment edges.
pub fn noise_gate(input: &AudioBuffer, threshold_dbfs: f32) -> AudioBuffer {
    remove_silence(
        input,
        &SilenceSplit {
            threshold_dbfs,
            min_silence_ms: GATE_MIN_SILENCE_MS,
            padding_ms: GATE_PADDING_MS,
        },
    )
}

/// Silence trimmer: removes dead air relative to the buffer's own average
/// level, with a longer minimum run and more padding than the gate so it
/// stays conservative.
pub fn trim_silence(input: &AudioBuffer) -> AudioBuffer {
    remove_silence(
        input,
        &SilenceSplit {
            threshold_dbfs: input.rms_dbfs() - TRIM_OFFSET_DB,
            min_silence_ms: TRIM_MIN_SILENCE_MS,
            padding_ms: TRIM_PADDING_MS,
        },
    )
}

/// Splits the buffer at qualifying silence runs and concatenates the
/// surviving segments in their original order.
///
/// If nothing survives (the entire input is below the threshold) the result
/// is a silent buffer of the original duration, never an empty one.
pub fn remove_silence(input: &AudioBuffer, split: &SilenceSplit) -> AudioBuffer {
    let frames = input.frames();
    if frames == 0 {
        return input.clone();
    }

    let block_frames = ((input.sample_rate as u64 * BLOCK_MS / 1000) as usize).max(1);
    let n_blocks = frames.div_ceil(block_frames);
    let min_blocks = ((split.min_silence_ms / BLOCK_MS) as usize).max(1);
    let pad_blocks = (split.padding_ms / BLOCK_MS) as usize;

    let silent = block_silence_flags(input, block_frames, n_blocks, split.threshold_dbfs);
    let kept = non_silent_block_ranges(&silent, min_blocks);

    if kept.is_empty() {
        return AudioBuffer::silent(
            frames,
            input.sample_rate,
            input.channels,
            input.bits_per_sample,
        );
    }

    let padded = pad_and_merge(&kept, pad_blocks, n_blocks);

    let ch = input.channels as usize;
    let mut samples = Vec::new();
    for (start, end) in padded {
        let start_f = start * block_frames;
        let end_f = (end * block_frames).min(frames);
        samples.extend_from_slice(&input.samples[start_f * ch..end_f * ch]);
    }

    AudioBuffer {
        samples,
        sample_rate: input.sample_rate,
        channels: input.channels,
        bits_per_sample: input.bits_per_sample,
    }
}

/// Per-block RMS classification against the threshold.
fn block_silence_flags(
    input: &AudioBuffer,
    block_frames: usize,
    n_blocks: usize,
    threshold_dbfs: f32,
) -> Vec<bool> {
    let ch = input.channels as usize;
    let frames = input.frames();
    (0..n_blocks)
        .map(|b| {
            let start = b * block_frames;
            let end = ((b + 1) * block_frames).min(frames);
            let slice = &input.samples[start * ch..end * ch];
            let sum: f64 = slice.iter().map(|s| (*s as f64) * (*s as f64)).sum();
            let rms = (sum / slice.len().max(1) as f64).sqrt() as f32;
            linear_to_db(rms) < threshold_dbfs
        })
        .collect()
}

/// Block ranges that survive: the complement of silence runs long enough to
/// qualify for removal. Short silence runs stay attached to their neighbors.
fn non_silent_block_ranges(silent: &[bool], min_blocks: usize) -> Vec<(usize, usize)> {
    let n = silent.len();
    let mut removable: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &is_silent) in silent.iter().enumerate() {
        match (is_silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s >= min_blocks {
                    removable.push((s, i));
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        if n - s >= min_blocks {
            removable.push((s, n));
        }
    }

    let mut kept = Vec::new();
    let mut cursor = 0;
    for (s, e) in removable {
        if s > cursor {
            kept.push((cursor, s));
        }
        cursor = e;
    }
    if cursor < n {
        kept.push((cursor, n));
    }
    kept
}

/// Extends each kept range by the padding on both sides, then merges
/// overlapping neighbors.
fn pad_and_merge(kept: &[(usize, usize)], pad: usize, n_blocks: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(kept.len());
    for &(s, e) in kept {
        let s = s.saturating_sub(pad);
        let e = (e + pad).min(n_blocks);
        match merged.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }
    merged
}
