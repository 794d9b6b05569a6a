//! The pipeline executor: sequences separation and the effect units for one
//! run, owns the temp-file discipline, and reports progress.

pub mod chunks;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::audio::{export_audio, read_audio, write_wav};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::dsp::{apply_eq, compress, noise_gate, normalize_peak, trim_silence, CompressorParams};
use crate::error::{EngineError, Result};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::separation;
use crate::types::ProcessingOptions;

/// Share of total progress allotted to the separation phase when enabled.
const SEPARATION_SHARE: f32 = 70.0;
/// Post-separation effect stages fill progress up to this point; the rest is
/// normalize + export.
const POST_STAGES_END: f32 = 95.0;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac"];

/// Outcome of a folder run: which files produced output and which failed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct PipelineExecutor {
    config: EngineConfig,
}

impl PipelineExecutor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the full chain on one input file and returns the output path.
    pub fn run(
        &self,
        input: &Path,
        options: &ProcessingOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        let tracker = ProgressTracker::new(sink);
        match self.execute(input, options, &tracker, cancel, false) {
            Ok(path) => {
                tracker.success(format!(
                    "Processing complete. File saved to {}",
                    path.display()
                ));
                Ok(path)
            }
            Err(e) => {
                if e.is_cancelled() {
                    tracker.status("Processing cancelled", None);
                } else {
                    tracker.error(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Same chain over the first `preview_duration_ms` of the input, tagged
    /// `_preview` so it never clobbers a full render.
    pub fn run_preview(
        &self,
        input: &Path,
        options: &ProcessingOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<PathBuf> {
        let tracker = ProgressTracker::new(sink);
        match self.execute(input, options, &tracker, cancel, true) {
            Ok(path) => {
                tracker.success(format!("Preview ready: {}", path.display()));
                Ok(path)
            }
            Err(e) => {
                if e.is_cancelled() {
                    tracker.status("Preview cancelled", None);
                } else {
                    tracker.error(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Applies the same options to every audio file in `folder`.
    ///
    /// One file failing is recorded and logged but does not abort the rest;
    /// cancellation does.
    pub fn run_batch(
        &self,
        folder: &Path,
        options: &ProcessingOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        if !folder.is_dir() {
            return Err(EngineError::InvalidInput(format!(
                "not a folder: {}",
                folder.display()
            )));
        }
        options.validate(&self.config)?;

        let mut files: Vec<PathBuf> = fs::read_dir(folder)
            .with_context(|| format!("failed to list folder: {}", folder.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_audio_extension(p))
            .collect();
        files.sort();

        let tracker = ProgressTracker::new(sink);
        let mut report = BatchReport::default();
        let total = files.len();
        if total == 0 {
            tracker.status("No audio files found in the selected folder", Some(100.0));
            return Ok(report);
        }

        for (i, path) in files.iter().enumerate() {
            cancel.checkpoint()?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracker.status(
                format!("Batch processing {}/{}: {}", i + 1, total, name),
                Some(i as f32 / total as f32 * 100.0),
            );

            // Each file gets its own monotonic progress scope.
            let file_tracker = ProgressTracker::new(sink);
            match self.execute(path, options, &file_tracker, cancel, false) {
                Ok(out) => report.processed.push(out),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    log::warn!("batch item failed: {}: {e}", path.display());
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        tracker.status("Batch processing complete", Some(100.0));
        Ok(report)
    }

    /// Sets up the run context (output dir, temp dir with guaranteed
    /// removal) and delegates to the stage sequence.
    fn execute(
        &self,
        input: &Path,
        options: &ProcessingOptions,
        tracker: &ProgressTracker<'_>,
        cancel: &CancelToken,
        preview: bool,
    ) -> Result<PathBuf> {
        options.validate(&self.config)?;
        if !input.is_file() {
            return Err(EngineError::InvalidInput(format!(
                "input file not found: {}",
                input.display()
            )));
        }
        cancel.checkpoint()?;

        let parent = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let out_dir = parent.join(&self.config.output_directory_name);
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create output dir: {}", out_dir.display()))?;
        let temp_root = out_dir.join(&self.config.temp_directory_name);
        fs::create_dir_all(&temp_root)?;

        // Dropped on every exit path below, which removes the whole tree.
        let temp = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&temp_root)
            .context("failed to create temp dir")?;

        let result = self.process(input, options, tracker, cancel, preview, temp.path(), &out_dir);

        drop(temp);
        // The shared temp root stays only while another run is using it.
        let _ = fs::remove_dir(&temp_root);
        result
    }

    fn process(
        &self,
        input: &Path,
        options: &ProcessingOptions,
        tracker: &ProgressTracker<'_>,
        cancel: &CancelToken,
        preview: bool,
        temp_dir: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        tracker.status("Loading audio...", Some(0.0));
        let mut buffer = read_audio(input).map_err(|e| EngineError::InvalidInput(format!("{e:#}")))?;
        if preview {
            let frames =
                (self.config.preview_duration_ms as f64 / 1000.0 * buffer.sample_rate as f64) as usize;
            buffer = buffer.slice_frames(0, frames.max(1));
        }
        log::info!(
            "pipeline start: {} ({:.1}s, {} Hz, {} ch)",
            input.display(),
            buffer.duration_secs(),
            buffer.sample_rate,
            buffer.channels
        );

        let mut suffix = String::new();
        let sep_share = if options.use_separation {
            SEPARATION_SHARE
        } else {
            0.0
        };

        if options.use_separation {
            cancel.checkpoint()?;
            let spec = self.config.model_spec(&options.separation_model)?;
            let backend = separation::backend_for(spec, options.use_accelerator)?;
            let use_chunks = options.parallel_processing
                && !options.low_memory
                && buffer.duration_secs() > self.config.parallel.min_duration_secs;

            buffer = if use_chunks {
                tracker.status(
                    format!("Separating vocals in parallel ({})...", spec.display_name),
                    Some(0.0),
                );
                chunks::separate_in_chunks(
                    &buffer,
                    backend.as_ref(),
                    temp_dir,
                    &self.config.parallel,
                    tracker,
                    sep_share,
                    cancel,
                )?
            } else {
                tracker.status(
                    format!("Separating vocals ({})...", spec.display_name),
                    Some(0.0),
                );
                let work = temp_dir.join("separation");
                fs::create_dir_all(&work)?;
                let sep_input = work.join("input.wav");
                write_wav(&sep_input, &buffer)?;
                backend.separate(&sep_input, &work, &tracker.span(0.0, sep_share), cancel)?
            };
            suffix.push_str("_vocals");
            tracker.progress(sep_share);
        }

        // Remaining enabled stages advance evenly up to POST_STAGES_END.
        let enabled = [
            options.trim_silence,
            options.use_eq,
            options.use_gate,
            options.use_compression,
        ]
        .iter()
        .filter(|e| **e)
        .count();
        let step = if enabled > 0 {
            (POST_STAGES_END - sep_share) / enabled as f32
        } else {
            0.0
        };
        let mut reached = sep_share;

        if options.trim_silence {
            cancel.checkpoint()?;
            tracker.status("Trimming silence...", None);
            buffer = trim_silence(&buffer);
            suffix.push_str("_trimmed");
            reached += step;
            tracker.progress(reached);
        }

        if options.use_eq {
            cancel.checkpoint()?;
            tracker.status("Applying equalizer...", None);
            buffer = apply_eq(
                &buffer,
                options.eq_low_db,
                options.eq_mid_db,
                options.eq_high_db,
            );
            suffix.push_str("_eq");
            reached += step;
            tracker.progress(reached);
        }

        if options.use_gate {
            cancel.checkpoint()?;
            tracker.status("Applying noise gate...", None);
            buffer = noise_gate(&buffer, options.gate_threshold_dbfs);
            suffix.push_str("_gated");
            reached += step;
            tracker.progress(reached);
        }

        if options.use_compression {
            cancel.checkpoint()?;
            tracker.status("Applying compression...", None);
            buffer = compress(&buffer, &CompressorParams::from_defaults(&self.config.defaults));
            suffix.push_str("_compressed");
            reached += step;
            tracker.progress(reached);
        }

        cancel.checkpoint()?;
        tracker.status("Normalizing and saving...", Some(POST_STAGES_END));
        buffer = normalize_peak(&buffer, self.config.defaults.normalize_target_dbfs);

        let base = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let preview_tag = if preview { "_preview" } else { "" };
        let dest = out_dir.join(format!(
            "{base}{suffix}{preview_tag}.{}",
            options.output_format.extension()
        ));
        export_audio(&buffer, &dest, options.output_format, temp_dir)?;

        tracker.progress(100.0);
        log::info!("pipeline complete: {}", dest.display());
        Ok(dest)
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
