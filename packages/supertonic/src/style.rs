//! Voice style packs: loading, validation, mixing and export.
//!
//! A voice asset is JSON of the form
//! `{ "style_ttl": {dims, data, type}, "style_dp": {dims, data, type} }`
//! where `data` is nested `[batch][rows][cols]` and `dims` is
//! `[batch, rows, cols]`. Packs are converted to flat `Array3` storage on
//! load and never mutated afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};
use supertonic_domain::{VoiceError, VoiceId, VoiceResult};

use crate::tensor::Tensor;

#[derive(Debug, Serialize, Deserialize)]
struct StyleComponentJson {
    dims: Vec<usize>,
    data: Vec<Vec<Vec<f32>>>,
    #[serde(rename = "type", default = "default_dtype")]
    dtype: String,
}

fn default_dtype() -> String {
    "float32".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct VoiceStyleJson {
    style_ttl: StyleComponentJson,
    style_dp: StyleComponentJson,
}

impl StyleComponentJson {
    fn into_array(self, which: &str) -> VoiceResult<Array3<f32>> {
        let invalid = |msg: String| VoiceError::Validation(format!("{which}: {msg}"));

        let [batch, rows, cols] = <[usize; 3]>::try_from(self.dims.as_slice())
            .map_err(|_| invalid(format!("expected 3 dims, got {:?}", self.dims)))?;
        if batch != 1 {
            return Err(invalid(format!("batch must be 1, got {batch}")));
        }
        if self.data.len() != batch
            || self
                .data
                .iter()
                .any(|b| b.len() != rows || b.iter().any(|r| r.len() != cols))
        {
            return Err(invalid(format!(
                "data does not match dims [{batch}, {rows}, {cols}]"
            )));
        }

        let flat: Vec<f32> = self.data.into_iter().flatten().flatten().collect();
        Array3::from_shape_vec((batch, rows, cols), flat).map_err(|e| invalid(e.to_string()))
    }

    fn from_array(array: &Array3<f32>) -> Self {
        let data = array
            .outer_iter()
            .map(|b| b.outer_iter().map(|r| r.to_vec()).collect())
            .collect();
        Self {
            dims: array.shape().to_vec(),
            data,
            dtype: default_dtype(),
        }
    }
}

/// Immutable pair of style tensors describing one voice.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePack {
    name: VoiceId,
    ttl: Array3<f32>,
    dp: Array3<f32>,
}

impl StylePack {
    /// Build a pack from `[1, rows, cols]` tensors.
    pub fn new(name: VoiceId, ttl: Array3<f32>, dp: Array3<f32>) -> VoiceResult<Self> {
        for (which, t) in [("style_ttl", &ttl), ("style_dp", &dp)] {
            if t.shape()[0] != 1 {
                return Err(VoiceError::Validation(format!(
                    "{which}: batch must be 1, got shape {:?}",
                    t.shape()
                )));
            }
        }
        Ok(Self { name, ttl, dp })
    }

    /// Parse a voice-style JSON document.
    pub fn from_json(name: VoiceId, json: &str) -> VoiceResult<Self> {
        let parsed: VoiceStyleJson = serde_json::from_str(json)
            .map_err(|e| VoiceError::Validation(format!("voice style {name}: {e}")))?;
        let ttl = parsed.style_ttl.into_array("style_ttl")?;
        let dp = parsed.style_dp.into_array("style_dp")?;
        Self::new(name, ttl, dp)
    }

    /// Load a voice-style file; the voice is named after the file stem.
    pub fn from_file<P: AsRef<Path>>(path: P) -> VoiceResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            VoiceError::Initialization(format!("cannot read voice {}: {e}", path.display()))
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(VoiceId::from_file_name)
            .unwrap_or_else(|| VoiceId::new("voice"));
        Self::from_json(name, &json)
    }

    /// Serialize back to the voice-style asset format.
    pub fn to_json(&self) -> VoiceResult<String> {
        let doc = VoiceStyleJson {
            style_ttl: StyleComponentJson::from_array(&self.ttl),
            style_dp: StyleComponentJson::from_array(&self.dp),
        };
        serde_json::to_string(&doc)
            .map_err(|e| VoiceError::Encode(format!("voice style {}: {e}", self.name)))
    }

    /// Mix two voices element-wise: `a * weight + b * (1 - weight)`.
    ///
    /// `weight` is clamped to `[0, 1]`; both packs must have identical dims.
    pub fn interpolate(
        a: &StylePack,
        b: &StylePack,
        weight: f32,
        name: VoiceId,
    ) -> VoiceResult<StylePack> {
        let w = if weight.is_nan() { 0.5 } else { weight.clamp(0.0, 1.0) };
        let mix = |x: &Array3<f32>, y: &Array3<f32>, which: &str| {
            if x.shape() != y.shape() {
                return Err(VoiceError::Validation(format!(
                    "{which}: cannot mix {:?} with {:?}",
                    x.shape(),
                    y.shape()
                )));
            }
            Ok(Zip::from(x).and(y).map_collect(|&p, &q| p * w + q * (1.0 - w)))
        };
        let ttl = mix(&a.ttl, &b.ttl, "style_ttl")?;
        let dp = mix(&a.dp, &b.dp, "style_dp")?;
        Self::new(name, ttl, dp)
    }

    pub fn name(&self) -> &VoiceId {
        &self.name
    }

    pub fn ttl(&self) -> &Array3<f32> {
        &self.ttl
    }

    pub fn dp(&self) -> &Array3<f32> {
        &self.dp
    }

    /// `style_ttl` stage input.
    pub fn ttl_tensor(&self) -> Tensor {
        Tensor::F32(self.ttl.clone().into_dyn())
    }

    /// `style_dp` stage input.
    pub fn dp_tensor(&self) -> Tensor {
        Tensor::F32(self.dp.clone().into_dyn())
    }
}

/// Built-in blends of the four base voices: `(name, a, b, weight of a)`.
pub const PRESET_BLENDS: [(&str, &str, &str, f32); 10] = [
    ("F1_F2_Blend", "F1", "F2", 0.5),
    ("F1_Soft", "F1", "F2", 0.7),
    ("F2_Soft", "F1", "F2", 0.3),
    ("M1_M2_Blend", "M1", "M2", 0.5),
    ("M1_Soft", "M1", "M2", 0.7),
    ("M2_Soft", "M1", "M2", 0.3),
    ("Androgynous_1", "F1", "M1", 0.5),
    ("Androgynous_2", "F2", "M2", 0.5),
    ("Fem_Leaning", "F1", "M1", 0.65),
    ("Masc_Leaning", "F1", "M1", 0.35),
];

/// A directory of `*.json` voice styles.
#[derive(Debug, Clone)]
pub struct VoiceLibrary {
    dir: PathBuf,
}

impl VoiceLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Voices available in the directory, sorted by name.
    pub fn list(&self) -> VoiceResult<Vec<VoiceId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            VoiceError::Initialization(format!(
                "cannot list voice styles in {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut voices: Vec<VoiceId> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .map(|name| VoiceId::from_file_name(&name))
            .collect();
        voices.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(voices)
    }

    /// Path of the asset for `voice`.
    pub fn path_of(&self, voice: &str) -> PathBuf {
        let file = if voice.ends_with(".json") {
            voice.to_string()
        } else {
            format!("{voice}.json")
        };
        self.dir.join(file)
    }

    /// Load a voice by name, with or without the `.json` suffix.
    pub fn load(&self, voice: &str) -> VoiceResult<StylePack> {
        let path = self.path_of(voice);
        if !path.is_file() {
            return Err(VoiceError::Validation(format!("unknown voice `{voice}`")));
        }
        StylePack::from_file(path)
    }

    /// Mix every entry of [`PRESET_BLENDS`] from the base voices in this
    /// directory, in table order. Nothing is written to disk.
    pub fn generate_presets(&self) -> VoiceResult<Vec<StylePack>> {
        let mut bases: Vec<StylePack> = Vec::new();
        for (_, a, b, _) in PRESET_BLENDS {
            for base in [a, b] {
                if !bases.iter().any(|p| p.name().id() == base) {
                    bases.push(self.load(base)?);
                }
            }
        }
        let base = |name: &str| {
            bases
                .iter()
                .find(|p| p.name().id() == name)
                .ok_or_else(|| VoiceError::Validation(format!("unknown voice `{name}`")))
        };

        PRESET_BLENDS
            .iter()
            .map(|&(name, a, b, weight)| {
                StylePack::interpolate(base(a)?, base(b)?, weight, VoiceId::new(name))
            })
            .collect()
    }

    /// Write `pack` into the library as `<name>.json`.
    pub fn save(&self, pack: &StylePack) -> VoiceResult<PathBuf> {
        let path = self.path_of(pack.name().id());
        let json = pack.to_json()?;
        fs::write(&path, json).map_err(|e| {
            VoiceError::Storage(format!("cannot write voice {}: {e}", path.display()))
        })?;
        tracing::info!(voice = %pack.name(), path = %path.display(), "voice style saved");
        Ok(path)
    }
}
