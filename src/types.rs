use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Owned, in-memory decoded audio. Samples are interleaved f32 in [-1, 1].
///
/// `bits_per_sample` records the source sample width so derived buffers can
/// be exported at the width they came in with.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(samples.len() % channels.max(1) as usize, 0);
        Self {
            samples,
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// An all-zero buffer of `frames` audio frames with the given layout.
    pub fn silent(frames: usize, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Number of audio frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Peak absolute amplitude, linear.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    pub fn peak_dbfs(&self) -> f32 {
        crate::dsp::linear_to_db(self.peak())
    }

    /// Overall RMS level in dBFS. Silence reports negative infinity, which
    /// compares below every finite threshold.
    pub fn rms_dbfs(&self) -> f32 {
        crate::dsp::linear_to_db(self.rms())
    }

    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Copy of the frame range `[start, end)`, preserving the layout.
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioBuffer {
        let ch = self.channels as usize;
        let end = end.min(self.frames());
        let start = start.min(end);
        AudioBuffer {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// Same sample rate and channel count.
    pub fn layout_matches(&self, other: &AudioBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

/// Container format of the final artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Flac,
    Mp3,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Flac => "flac",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "flac" => Ok(OutputFormat::Flac),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(EngineError::InvalidInput(format!(
                "unknown output format `{other}` (expected wav, flac or mp3)"
            ))),
        }
    }
}

pub const EQ_GAIN_RANGE_DB: (f32, f32) = (-12.0, 12.0);

/// Immutable per-run configuration of the processing chain.
///
/// Constructed once from user input or a loaded preset, validated against the
/// engine configuration, and never mutated during a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub use_separation: bool,
    /// Key into [`EngineConfig::separation_models`].
    pub separation_model: String,
    /// Prefer the accelerator (GPU) for model inference when available.
    pub use_accelerator: bool,
    pub trim_silence: bool,
    pub use_eq: bool,
    pub eq_low_db: f32,
    pub eq_mid_db: f32,
    pub eq_high_db: f32,
    pub use_gate: bool,
    pub gate_threshold_dbfs: f32,
    pub use_compression: bool,
    pub parallel_processing: bool,
    /// Disables the chunked strategy, which holds every chunk in memory.
    pub low_memory: bool,
    pub output_format: OutputFormat,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            use_separation: true,
            separation_model: "htdemucs".into(),
            use_accelerator: false,
            trim_silence: false,
            use_eq: true,
            eq_low_db: 0.0,
            eq_mid_db: 0.0,
            eq_high_db: 0.0,
            use_gate: true,
            gate_threshold_dbfs: -40.0,
            use_compression: true,
            parallel_processing: false,
            low_memory: false,
            output_format: OutputFormat::Wav,
        }
    }
}

impl ProcessingOptions {
    /// Checks field ranges and, when separation is enabled, that the model
    /// key is known to the configuration.
    pub fn validate(&self, config: &EngineConfig) -> Result<()> {
        let (lo, hi) = EQ_GAIN_RANGE_DB;
        for (name, gain) in [
            ("eq_low_db", self.eq_low_db),
            ("eq_mid_db", self.eq_mid_db),
            ("eq_high_db", self.eq_high_db),
        ] {
            if !gain.is_finite() || gain < lo || gain > hi {
                return Err(EngineError::InvalidInput(format!(
                    "{name} = {gain} is outside the supported range [{lo}, {hi}] dB"
                )));
            }
        }
        if !self.gate_threshold_dbfs.is_finite() || self.gate_threshold_dbfs >= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "gate_threshold_dbfs = {} must be a negative dBFS value",
                self.gate_threshold_dbfs
            )));
        }
        if self.use_separation {
            config.model_spec(&self.separation_model)?;
        }
        Ok(())
    }
}
