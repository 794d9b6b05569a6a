//! Parallel chunk coordinator: splits a long input into contiguous chunks,
//! separates them concurrently, and stitches the results back by index.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;

use crate::audio::write_wav;
use crate::cancel::CancelToken;
use crate::config::ParallelConfig;
use crate::error::{EngineError, Result};
use crate::progress::ProgressTracker;
use crate::separation::SeparationBackend;
use crate::types::AudioBuffer;

/// How long the completion-wait loop sleeps before re-checking cancellation.
const COMPLETION_POLL: Duration = Duration::from_millis(200);

/// Partitions a buffer into at most `parts` contiguous, frame-aligned chunks
/// of equal length (the last may be shorter), in time order.
pub fn partition(buffer: &AudioBuffer, parts: usize) -> Vec<AudioBuffer> {
    let frames = buffer.frames();
    let parts = parts.max(1);
    if frames == 0 {
        return vec![buffer.clone()];
    }
    let chunk_frames = frames.div_ceil(parts);
    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    while start < frames {
        let end = (start + chunk_frames).min(frames);
        chunks.push(buffer.slice_frames(start, end));
        start = end;
    }
    chunks
}

/// Concatenates chunks strictly in slice order into one continuous buffer.
/// Index order, not completion order, is the caller's responsibility.
pub fn stitch(chunks: &[AudioBuffer]) -> Result<AudioBuffer> {
    let first = chunks
        .first()
        .ok_or_else(|| anyhow!("no chunks to stitch"))?;
    let mut samples = Vec::with_capacity(chunks.iter().map(|c| c.samples.len()).sum());
    for (index, chunk) in chunks.iter().enumerate() {
        if !chunk.layout_matches(first) {
            return Err(anyhow!(
                "chunk {index} layout mismatch: {} Hz/{} ch vs {} Hz/{} ch",
                chunk.sample_rate,
                chunk.channels,
                first.sample_rate,
                first.channels
            )
            .into());
        }
        samples.extend_from_slice(&chunk.samples);
    }
    Ok(AudioBuffer {
        samples,
        sample_rate: first.sample_rate,
        channels: first.channels,
        bits_per_sample: first.bits_per_sample,
    })
}

/// Runs the separation backend over every chunk concurrently and returns the
/// stitched vocal track.
///
/// Each worker owns one chunk end-to-end in its own temp subdirectory, so
/// backends that derive artifact paths from the input name cannot collide.
/// Jobs may complete in any order; failures are collected rather than
/// abandoning siblings, and cancellation is propagated before results are
/// inspected.
pub(crate) fn separate_in_chunks(
    buffer: &AudioBuffer,
    backend: &dyn SeparationBackend,
    temp_dir: &Path,
    parallel: &ParallelConfig,
    tracker: &ProgressTracker<'_>,
    share: f32,
    cancel: &CancelToken,
) -> Result<AudioBuffer> {
    let workers = parallel.effective_workers();
    let chunks = partition(buffer, workers);
    let total = chunks.len();
    tracker.status(
        format!("Splitting input into {total} chunks across {workers} workers..."),
        None,
    );

    let mut jobs = Vec::with_capacity(total);
    for (index, chunk) in chunks.iter().enumerate() {
        let dir = temp_dir.join(format!("chunk-{index:02}"));
        fs::create_dir_all(&dir)?;
        let wav = dir.join("input.wav");
        write_wav(&wav, chunk)?;
        jobs.push((index, dir, wav));
    }

    let mut slots: Vec<Option<Result<AudioBuffer>>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    std::thread::scope(|scope| {
        let (tx, rx) = crossbeam_channel::bounded::<(usize, Result<AudioBuffer>)>(total);
        for (index, dir, wav) in &jobs {
            let tx = tx.clone();
            let span = tracker.muted_span();
            scope.spawn(move || {
                let result = if cancel.is_cancelled() {
                    Err(EngineError::Cancelled)
                } else {
                    backend.separate(wav, dir, &span, cancel)
                };
                let _ = tx.send((*index, result));
            });
        }
        drop(tx);

        let mut done = 0usize;
        while done < total {
            match rx.recv_timeout(COMPLETION_POLL) {
                Ok((index, result)) => {
                    slots[index] = Some(result);
                    done += 1;
                    tracker.status(format!("Separated chunk {done}/{total}"), None);
                    tracker.progress(done as f32 / total as f32 * share);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    // Workers observe the token themselves and wind down;
                    // the scope join below waits for them.
                    if cancel.is_cancelled() {
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    // Cancellation wins over whatever the individual slots report.
    cancel.checkpoint()?;

    let mut failures = Vec::new();
    let mut separated = Vec::with_capacity(total);
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(chunk)) => separated.push(chunk),
            Some(Err(e)) => failures.push(format!("chunk {index}: {e}")),
            None => failures.push(format!("chunk {index}: worker did not report a result")),
        }
    }
    if !failures.is_empty() {
        return Err(EngineError::ChunkProcessing {
            failed: failures.len(),
            total,
            detail: failures.join("; "),
        });
    }

    stitch(&separated)
}
