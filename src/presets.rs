use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ProcessingOptions;

/// Named, persisted snapshot of the processing-chain fields of
/// [`ProcessingOptions`]. Transient per-run fields (output format, parallel
/// strategy) are deliberately not part of a preset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub use_separation: bool,
    pub separation_model: String,
    pub use_accelerator: bool,
    pub trim_silence: bool,
    pub use_eq: bool,
    pub eq_low_db: f32,
    pub eq_mid_db: f32,
    pub eq_high_db: f32,
    pub use_gate: bool,
    pub gate_threshold_dbfs: f32,
    pub use_compression: bool,
}

impl From<&ProcessingOptions> for Preset {
    fn from(options: &ProcessingOptions) -> Self {
        Self {
            use_separation: options.use_separation,
            separation_model: options.separation_model.clone(),
            use_accelerator: options.use_accelerator,
            trim_silence: options.trim_silence,
            use_eq: options.use_eq,
            eq_low_db: options.eq_low_db,
            eq_mid_db: options.eq_mid_db,
            eq_high_db: options.eq_high_db,
            use_gate: options.use_gate,
            gate_threshold_dbfs: options.gate_threshold_dbfs,
            use_compression: options.use_compression,
        }
    }
}

impl Preset {
    /// Builds run options from this preset, keeping the transient fields of
    /// `base` as they are.
    pub fn apply_to(&self, base: &ProcessingOptions) -> ProcessingOptions {
        ProcessingOptions {
            use_separation: self.use_separation,
            separation_model: self.separation_model.clone(),
            use_accelerator: self.use_accelerator,
            trim_silence: self.trim_silence,
            use_eq: self.use_eq,
            eq_low_db: self.eq_low_db,
            eq_mid_db: self.eq_mid_db,
            eq_high_db: self.eq_high_db,
            use_gate: self.use_gate,
            gate_threshold_dbfs: self.gate_threshold_dbfs,
            use_compression: self.use_compression,
            ..base.clone()
        }
    }
}

/// Presets persisted as one YAML document mapping name → preset.
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all presets. A store that does not exist yet is empty.
    pub fn load(&self) -> Result<BTreeMap<String, Preset>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read presets: {}", self.path.display()))?;
        let presets = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse presets: {}", self.path.display()))?;
        Ok(presets)
    }

    pub fn get(&self, name: &str) -> Result<Option<Preset>> {
        Ok(self.load()?.remove(name))
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Inserts or overwrites one preset.
    pub fn save(&self, name: &str, preset: &Preset) -> Result<()> {
        let mut presets = self.load()?;
        presets.insert(name.to_string(), preset.clone());
        self.write(&presets)
    }

    /// Returns whether the preset existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut presets = self.load()?;
        let existed = presets.remove(name).is_some();
        if existed {
            self.write(&presets)?;
        }
        Ok(existed)
    }

    fn write(&self, presets: &BTreeMap<String, Preset>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(presets)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write presets: {}", self.path.display()))?;
        Ok(())
    }
}
