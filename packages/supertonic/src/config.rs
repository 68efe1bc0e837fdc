use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use supertonic_domain::{Language, VoiceError};

use crate::stage::StageKind;

// ------------ tts.json -----------------
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AutoencoderSection {
    sample_rate: u32,
    base_chunk_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TextToLatentSection {
    latent_dim: u32,
    chunk_compress_factor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelAsset {
    ae: AutoencoderSection,
    ttl: TextToLatentSection,
}

/// Model geometry shared by every request. Loaded once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    /// Waveform samples per latent frame before compression.
    pub base_chunk_size: u32,
    pub latent_dim_base: u32,
    pub chunk_compress_factor: u32,
}

impl PipelineConfig {
    /// Parse the `tts.json` model asset. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self, VoiceError> {
        let asset: ModelAsset = serde_json::from_str(json)
            .map_err(|e| VoiceError::Initialization(format!("invalid model config: {e}")))?;
        let cfg = Self {
            sample_rate: asset.ae.sample_rate,
            base_chunk_size: asset.ae.base_chunk_size,
            latent_dim_base: asset.ttl.latent_dim,
            chunk_compress_factor: asset.ttl.chunk_compress_factor,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VoiceError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|e| {
            VoiceError::Initialization(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&txt)
    }

    pub fn validate(&self) -> Result<(), VoiceError> {
        let fields = [
            ("sample_rate", self.sample_rate),
            ("base_chunk_size", self.base_chunk_size),
            ("latent_dim", self.latent_dim_base),
            ("chunk_compress_factor", self.chunk_compress_factor),
        ];
        match fields.iter().find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(VoiceError::Initialization(format!(
                "model config `{name}` must be non-zero"
            ))),
            None => Ok(()),
        }
    }

    /// Channels of the latent tensor.
    pub fn latent_dim(&self) -> usize {
        self.latent_dim_base as usize * self.chunk_compress_factor as usize
    }

    /// Waveform samples covered by one latent frame.
    pub fn samples_per_latent_frame(&self) -> usize {
        self.base_chunk_size as usize * self.chunk_compress_factor as usize
    }

    /// Number of samples in `secs` seconds of silence, rounded.
    pub fn samples_for(&self, secs: f32) -> usize {
        (secs * self.sample_rate as f32).round().max(0.0) as usize
    }
}

// ------------ Asset layout -----------------
/// Files the engine needs, resolved under one asset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub root: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model_config(&self) -> PathBuf {
        self.root.join("tts.json")
    }

    pub fn codepoint_table(&self) -> PathBuf {
        self.root.join("unicode_indexer.json")
    }

    pub fn stage_model(&self, kind: StageKind) -> PathBuf {
        self.root.join(kind.model_file())
    }

    pub fn voice_styles(&self) -> PathBuf {
        self.root.join("voice_styles")
    }
}

// ------------ Engine settings -----------------
/// Tunables that are not part of the model assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum characters per synthesized chunk.
    pub max_chunk_len: usize,
    /// Silence inserted between chunks.
    pub silence_secs: f32,
    /// Longest predicted chunk duration accepted from the duration predictor.
    pub max_chunk_secs: f32,
    /// Language used when a request names an unsupported one.
    pub default_language: String,
    pub intra_threads: usize,
    pub inter_threads: usize,
    /// ONNX Runtime graph optimization level, 0 (off) to 3 (all).
    pub optimization_level: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_chunk_len: 300,
            silence_secs: 0.3,
            max_chunk_secs: 60.0,
            default_language: Language::ENGLISH.code().to_string(),
            intra_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            inter_threads: 2,
            optimization_level: 3,
        }
    }
}

impl EngineSettings {
    /// Load a JSON settings file from disk. Missing keys take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let txt = fs::read_to_string(path)?;
        let cfg: EngineSettings = serde_json::from_str(&txt)?;
        Ok(cfg)
    }

    /// Save to disk (pretty‑printed).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.max_chunk_len == 0 {
            return Err(VoiceError::Initialization("max_chunk_len must be > 0".into()));
        }
        if !self.silence_secs.is_finite() || self.silence_secs < 0.0 {
            return Err(VoiceError::Initialization(format!(
                "silence_secs must be a non-negative number, got {}",
                self.silence_secs
            )));
        }
        if !self.max_chunk_secs.is_finite() || self.max_chunk_secs <= 0.0 {
            return Err(VoiceError::Initialization(format!(
                "max_chunk_secs must be a positive number, got {}",
                self.max_chunk_secs
            )));
        }
        if self.optimization_level > 3 {
            return Err(VoiceError::Initialization(format!(
                "optimization_level must be 0..=3, got {}",
                self.optimization_level
            )));
        }
        Ok(())
    }

    /// The default language, or English if the configured code is unsupported.
    pub fn language(&self) -> Language {
        Language::resolve(&self.default_language, Language::ENGLISH)
    }
}
