use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Engine-wide configuration, loaded from a YAML document or built from
/// [`Default`]. Consumed by the core, owned by the embedding application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_models")]
    pub separation_models: BTreeMap<String, SeparationModelSpec>,
    #[serde(default)]
    pub defaults: DspDefaults,
    #[serde(default = "default_output_dir")]
    pub output_directory_name: String,
    #[serde(default = "default_temp_dir")]
    pub temp_directory_name: String,
    #[serde(default = "default_preview_ms")]
    pub preview_duration_ms: u64,
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            separation_models: default_models(),
            defaults: DspDefaults::default(),
            output_directory_name: default_output_dir(),
            temp_directory_name: default_temp_dir(),
            preview_duration_ms: default_preview_ms(),
            parallel: ParallelConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolves a model key to its spec, or reports the key as unsupported.
    pub fn model_spec(&self, key: &str) -> Result<&SeparationModelSpec> {
        self.separation_models.get(key).ok_or_else(|| {
            EngineError::Unsupported(format!("unknown separation model `{key}`"))
        })
    }
}

/// One entry in the separation-model map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeparationModelSpec {
    /// Name the backend is invoked with (e.g. the Demucs `-n` argument).
    pub name: String,
    /// Name shown to the user.
    pub display_name: String,
    #[serde(default)]
    pub engine: SeparationEngine,
    /// Present only for `engine: onnx` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onnx: Option<OnnxModelSpec>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparationEngine {
    /// Out-of-process `demucs` CLI invocation.
    #[default]
    Demucs,
    /// In-process inference, available with the `onnx` cargo feature.
    Onnx,
    /// Recognized in configs but has no integration in this build.
    Spleeter,
}

/// Inference parameters for an in-process ONNX model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnnxModelSpec {
    pub model_path: PathBuf,
    #[serde(default = "default_stems")]
    pub stems: Vec<String>,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_input_name")]
    pub input: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

/// Fixed parameters of the effect units that are not per-run knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DspDefaults {
    #[serde(default = "default_gate_threshold")]
    pub gate_threshold_dbfs: f32,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_dbfs: f32,
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f32,
    #[serde(default = "default_normalize_target")]
    pub normalize_target_dbfs: f32,
}

impl Default for DspDefaults {
    fn default() -> Self {
        Self {
            gate_threshold_dbfs: default_gate_threshold(),
            compression_threshold_dbfs: default_compression_threshold(),
            compression_ratio: default_compression_ratio(),
            normalize_target_dbfs: default_normalize_target(),
        }
    }
}

/// Thresholds for the chunked parallel separation strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Inputs at or below this duration stay on the single-core path.
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
            max_workers: default_max_workers(),
        }
    }
}

impl ParallelConfig {
    /// Worker count for this machine: logical CPUs capped by `max_workers`.
    pub fn effective_workers(&self) -> usize {
        num_cpus::get().min(self.max_workers).max(1)
    }
}

fn default_models() -> BTreeMap<String, SeparationModelSpec> {
    let mut models = BTreeMap::new();
    models.insert(
        "htdemucs".to_string(),
        SeparationModelSpec {
            name: "htdemucs".into(),
            display_name: "Demucs v4 (Hybrid Transformer)".into(),
            engine: SeparationEngine::Demucs,
            onnx: None,
        },
    );
    models.insert(
        "htdemucs_ft".to_string(),
        SeparationModelSpec {
            name: "htdemucs_ft".into(),
            display_name: "Demucs v4 (fine-tuned)".into(),
            engine: SeparationEngine::Demucs,
            onnx: None,
        },
    );
    models.insert(
        "mdx_extra".to_string(),
        SeparationModelSpec {
            name: "mdx_extra".into(),
            display_name: "MDX Extra".into(),
            engine: SeparationEngine::Demucs,
            onnx: None,
        },
    );
    models.insert(
        "spleeter_2stem".to_string(),
        SeparationModelSpec {
            name: "spleeter:2stems".into(),
            display_name: "Spleeter (2 stems)".into(),
            engine: SeparationEngine::Spleeter,
            onnx: None,
        },
    );
    models
}

fn default_output_dir() -> String {
    "processed".into()
}

fn default_temp_dir() -> String {
    "temp_processing".into()
}

fn default_preview_ms() -> u64 {
    15_000
}

fn default_gate_threshold() -> f32 {
    -40.0
}

fn default_compression_threshold() -> f32 {
    -20.0
}

fn default_compression_ratio() -> f32 {
    4.0
}

fn default_normalize_target() -> f32 {
    -3.0
}

fn default_min_duration() -> f64 {
    300.0
}

fn default_max_workers() -> usize {
    8
}

fn default_stems() -> Vec<String> {
    vec![
        "drums".into(),
        "bass".into(),
        "other".into(),
        "vocals".into(),
    ]
}

fn default_window() -> usize {
    441_000
}

fn default_input_name() -> String {
    "mix".into()
}

fn default_sample_rate() -> u32 {
    44_100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_knows_htdemucs() {
        let config = EngineConfig::default();
        let spec = config.model_spec("htdemucs").unwrap();
        assert_eq!(spec.engine, SeparationEngine::Demucs);
        assert_eq!(spec.name, "htdemucs");
    }

    #[test]
    fn unknown_model_key_is_unsupported() {
        let config = EngineConfig::default();
        let err = config.model_spec("nonexistent").unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("output_directory_name: out\n").unwrap();
        assert_eq!(config.output_directory_name, "out");
        assert_eq!(config.temp_directory_name, "temp_processing");
        assert_eq!(config.parallel.max_workers, 8);
        assert!(config.separation_models.contains_key("htdemucs"));
    }
}
