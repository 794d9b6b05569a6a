//! Separation backends: invoke a pretrained source-separation model and
//! return the isolated vocal stem.
//!
//! The fragile parts of the integration (progress scraped from diagnostic
//! text, artifact paths derived from naming conventions) are isolated behind
//! the [`SeparationBackend`] trait so they stay swappable without touching
//! the executor.

pub mod demucs;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::Path;

use crate::cancel::CancelToken;
use crate::config::{SeparationEngine, SeparationModelSpec};
use crate::error::{EngineError, Result};
use crate::progress::ProgressSpan;
use crate::types::AudioBuffer;

pub use demucs::DemucsCli;

/// Compute device a backend should run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn from_preference(use_accelerator: bool) -> Self {
        if use_accelerator {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    pub(crate) fn as_demucs_arg(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

/// One strategy for running the separation model.
///
/// `work_dir` is owned by the caller and unique per job, so concurrently
/// running backends never collide on derived artifact paths. Implementations
/// must poll `cancel` at least once per emitted output line (or on a short
/// idle timeout) and return [`EngineError::Cancelled`] promptly.
pub trait SeparationBackend: Sync {
    fn separate(
        &self,
        input: &Path,
        work_dir: &Path,
        progress: &ProgressSpan<'_>,
        cancel: &CancelToken,
    ) -> Result<AudioBuffer>;
}

/// Resolves the configured engine kind to a backend instance.
pub fn backend_for(
    spec: &SeparationModelSpec,
    use_accelerator: bool,
) -> Result<Box<dyn SeparationBackend + '_>> {
    match spec.engine {
        SeparationEngine::Demucs => Ok(Box::new(DemucsCli::new(
            &spec.name,
            Device::from_preference(use_accelerator),
        ))),
        #[cfg(feature = "onnx")]
        SeparationEngine::Onnx => Ok(Box::new(onnx::OnnxEngine::load(spec, use_accelerator)?)),
        #[cfg(not(feature = "onnx"))]
        SeparationEngine::Onnx => Err(EngineError::Unsupported(format!(
            "model `{}` requires the in-process engine; rebuild with the `onnx` feature",
            spec.name
        ))),
        SeparationEngine::Spleeter => Err(EngineError::Unsupported(
            "spleeter integration is not available in this build; pick a demucs model".into(),
        )),
    }
}
