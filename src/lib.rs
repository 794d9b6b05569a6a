//! # voxlift-core
//!
//! Core engine for vocal isolation and enhancement: decodes a mixed track,
//! isolates the vocal stem with a pretrained separation model, applies a
//! configurable DSP chain (silence trim, EQ, noise gate, compression) and
//! writes the peak-normalized result to disk.
//!
//! The embedding front end talks to the engine through four objects: an
//! [`EngineConfig`], a per-run [`ProcessingOptions`], a [`ProgressSink`] for
//! events, and a [`CancelToken`] for cooperative aborts.

pub mod audio;
pub mod cancel;
pub mod config;
pub mod dsp;
pub mod error;
pub mod pipeline;
pub mod presets;
pub mod progress;
pub mod separation;
pub mod types;

pub use crate::{
    audio::{read_audio, write_wav},
    cancel::CancelToken,
    config::EngineConfig,
    error::{EngineError, Result},
    pipeline::{BatchReport, PipelineExecutor},
    presets::{Preset, PresetStore},
    progress::{NullSink, ProgressEvent, ProgressSink},
    types::{AudioBuffer, OutputFormat, ProcessingOptions},
};
