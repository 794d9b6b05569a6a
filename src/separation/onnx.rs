//! In-process separation over an ONNX export of the model, compiled in with
//! the `onnx` cargo feature.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use ndarray::Array3;
use once_cell::sync::OnceCell;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};

use crate::audio::read_audio;
use crate::cancel::CancelToken;
use crate::config::SeparationModelSpec;
use crate::error::{EngineError, Result};
use crate::progress::ProgressSpan;
use crate::types::AudioBuffer;

use super::SeparationBackend;

static ORT_INIT: OnceCell<()> = OnceCell::new();

/// Runs the separation model in-process: the model file is loaded once,
/// moved to the requested device, and driven window-by-window over the
/// whole input.
pub struct OnnxEngine {
    session: Mutex<Session>,
    input_name: String,
    stems: usize,
    vocals_index: usize,
    window: usize,
}

impl OnnxEngine {
    pub fn load(spec: &SeparationModelSpec, use_accelerator: bool) -> Result<Self> {
        let onnx = spec.onnx.as_ref().ok_or_else(|| {
            EngineError::Unsupported(format!(
                "model `{}` has no onnx parameters configured",
                spec.name
            ))
        })?;

        // Fail fast if the model does not expose a vocals stream at all.
        let vocals_index = onnx
            .stems
            .iter()
            .position(|s| s.eq_ignore_ascii_case("vocals"))
            .ok_or_else(|| {
                EngineError::Separation(format!(
                    "model `{}` does not expose a vocals stem",
                    spec.name
                ))
            })?;

        let session = build_session(&onnx.model_path, use_accelerator)?;
        log::info!(
            "loaded onnx model `{}` ({} stems, window {})",
            spec.name,
            onnx.stems.len(),
            onnx.window
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name: onnx.input.clone(),
            stems: onnx.stems.len(),
            vocals_index,
            window: onnx.window,
        })
    }

    /// One forward pass over a zero-padded window. Input layout [1, 2, W]
    /// planar, output [1, S, 2, W].
    fn run_window(&self, planar: Vec<f32>) -> Result<Array3<f32>> {
        let w = self.window;
        let value: Value = Tensor::from_array((vec![1, 2, w], planar))
            .context("input tensor")?
            .into_dyn();

        let mut session = self.session.lock().expect("session poisoned");
        let outputs = session
            .run(vec![(self.input_name.clone(), value)])
            .map_err(|e| anyhow!("model run failed: {e}"))?;

        let out: Value = outputs
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| anyhow!("model returned no outputs"))?;

        let (_shape, data) = out
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("output tensor: {e}"))?;
        let expected = self.stems * 2 * w;
        if data.len() != expected {
            return Err(anyhow!(
                "unexpected output length {} (expected {expected})",
                data.len()
            )
            .into());
        }
        let arr = Array3::from_shape_vec((self.stems, 2, w), data.to_vec())
            .map_err(|e| anyhow!("output reshape: {e}"))?;
        Ok(arr)
    }
}

impl SeparationBackend for OnnxEngine {
    fn separate(
        &self,
        input: &Path,
        _work_dir: &Path,
        progress: &ProgressSpan<'_>,
        cancel: &CancelToken,
    ) -> Result<AudioBuffer> {
        let audio = read_audio(input)?;
        let (left, right) = stereo_planes(&audio);
        let t = left.len();
        if t == 0 {
            return Err(EngineError::Separation("empty audio".into()));
        }

        let windows = t.div_ceil(self.window);
        let mut out_left = vec![0.0f32; t];
        let mut out_right = vec![0.0f32; t];

        let mut pos = 0usize;
        let mut done = 0usize;
        while pos < t {
            cancel.checkpoint()?;
            let len = (t - pos).min(self.window);

            let mut planar = vec![0.0f32; 2 * self.window];
            planar[..len].copy_from_slice(&left[pos..pos + len]);
            planar[self.window..self.window + len].copy_from_slice(&right[pos..pos + len]);

            let stems = self.run_window(planar)?;
            for i in 0..len {
                out_left[pos + i] = stems[(self.vocals_index, 0, i)];
                out_right[pos + i] = stems[(self.vocals_index, 1, i)];
            }

            pos += len;
            done += 1;
            progress.percent(done as f32 / windows as f32 * 100.0);
        }

        let mut samples = Vec::with_capacity(2 * t);
        for i in 0..t {
            samples.push(out_left[i]);
            samples.push(out_right[i]);
        }

        Ok(AudioBuffer {
            samples,
            sample_rate: audio.sample_rate,
            channels: 2,
            bits_per_sample: audio.bits_per_sample,
        })
    }
}

fn build_session(model_path: &Path, use_accelerator: bool) -> Result<Session> {
    ORT_INIT.get_or_try_init(|| -> anyhow::Result<()> {
        ort::init().commit().map_err(|e| anyhow!("ort init: {e}"))?;
        Ok(())
    })?;

    let result = (|| -> anyhow::Result<Session> {
        let mut builder = SessionBuilder::new()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?;
        if use_accelerator {
            // Falls back to CPU inside ort if no CUDA device is present.
            builder =
                builder.with_execution_providers([CUDAExecutionProvider::default().build()])?;
        }
        Ok(builder.commit_from_file(model_path)?)
    })();

    result.with_context(|| format!("failed to load onnx model: {}", model_path.display()))
        .map_err(EngineError::from)
}

/// Splits interleaved audio into planar stereo; mono inputs are duplicated
/// onto both channels.
fn stereo_planes(audio: &AudioBuffer) -> (Vec<f32>, Vec<f32>) {
    if audio.channels == 1 {
        return (audio.samples.clone(), audio.samples.clone());
    }
    let ch = audio.channels as usize;
    let frames = audio.frames();
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in audio.samples.chunks(ch) {
        left.push(frame[0]);
        right.push(frame[1.min(frame.len() - 1)]);
    }
    (left, right)
}
