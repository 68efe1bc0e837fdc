//! In-process fakes for the four inference stages.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ndarray::{Array2, Array3};
use supertonic::stage::inputs;
use supertonic::text::CodepointIndexer;
use supertonic::{
    CancelFlag, EngineSettings, Language, NamedTensors, PipelineConfig, Stage, StageError,
    StageKind, StageSet, StylePack, SupertonicTts, Tensor, TextNormalizer, VoiceId,
};

/// 1 kHz output, 4 latent channels, 8 samples per latent frame.
pub fn config() -> PipelineConfig {
    PipelineConfig {
        sample_rate: 1000,
        base_chunk_size: 4,
        latent_dim_base: 2,
        chunk_compress_factor: 2,
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        max_chunk_len: 300,
        silence_secs: 0.3,
        max_chunk_secs: 60.0,
        default_language: "en".into(),
        intra_threads: 1,
        inter_threads: 1,
        optimization_level: 0,
    }
}

pub fn voice() -> StylePack {
    let ttl = Array3::from_elem((1, 2, 3), 0.25_f32);
    let dp = Array3::from_elem((1, 1, 2), 0.5_f32);
    StylePack::new(VoiceId::new("F1"), ttl, dp).expect("batch of one")
}

/// Identity table over ASCII, so stage inputs can be decoded back to text.
pub fn normalizer() -> TextNormalizer {
    TextNormalizer::new(CodepointIndexer::from_table((0..128).collect()), Language::ENGLISH)
}

/// What the fakes observed, shared with the test body.
#[derive(Debug, Default)]
pub struct Log {
    /// Normalized text seen by the duration predictor, one entry per chunk.
    pub texts: Vec<String>,
    /// `(current_step, total_step)` for every denoiser call.
    pub steps: Vec<(f32, f32)>,
    pub vocoder_calls: usize,
}

#[derive(Clone)]
pub struct FakeStages {
    pub log: Arc<Mutex<Log>>,
    /// Seconds reported by the duration predictor.
    pub duration_secs: f32,
    /// Stage that fails on every call.
    pub failing: Option<StageKind>,
    /// Cancelled from inside the first duration-predictor call.
    pub cancel_on_first_chunk: Option<CancelFlag>,
}

impl Default for FakeStages {
    fn default() -> Self {
        Self {
            log: Arc::default(),
            duration_secs: 0.05,
            failing: None,
            cancel_on_first_chunk: None,
        }
    }
}

impl FakeStages {
    pub fn texts(&self) -> Vec<String> {
        self.log.lock().expect("log").texts.clone()
    }

    pub fn steps(&self) -> Vec<(f32, f32)> {
        self.log.lock().expect("log").steps.clone()
    }

    pub fn vocoder_calls(&self) -> usize {
        self.log.lock().expect("log").vocoder_calls
    }

    pub fn engine(&self, settings: EngineSettings) -> SupertonicTts {
        let stages = StageSet::new(StageKind::ALL.map(|kind| {
            Box::new(FakeStage {
                kind,
                fakes: self.clone(),
            }) as Box<dyn Stage>
        }))
        .expect("all four stages");
        SupertonicTts::new(config(), settings, normalizer(), stages).expect("valid engine")
    }
}

struct FakeStage {
    kind: StageKind,
    fakes: FakeStages,
}

fn f32_input<'a>(named: &'a NamedTensors, name: &'static str) -> Result<&'a ndarray::ArrayD<f32>, StageError> {
    named
        .require(name)?
        .as_f32()
        .ok_or(StageError::ElementType(name))
}

impl Stage for FakeStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn run(&mut self, named: NamedTensors) -> Result<NamedTensors, StageError> {
        for name in self.kind.input_names() {
            named.require(*name)?;
        }
        if self.fakes.failing == Some(self.kind) {
            return Err(StageError::Runtime(format!("{} exploded", self.kind)));
        }
        let mut log = self.fakes.log.lock().map_err(|e| StageError::Runtime(e.to_string()))?;

        let output: Tensor = match self.kind {
            StageKind::DurationPredictor => {
                let ids = named
                    .require(inputs::TEXT_IDS)?
                    .as_i64()
                    .ok_or(StageError::ElementType(inputs::TEXT_IDS))?;
                let text = ids
                    .iter()
                    .filter_map(|&id| char::from_u32(id as u32))
                    .collect();
                log.texts.push(text);
                if log.texts.len() == 1
                    && let Some(flag) = &self.fakes.cancel_on_first_chunk
                {
                    flag.cancel();
                }
                Tensor::scalar_f32(self.fakes.duration_secs)
            }
            StageKind::TextEncoder => {
                let tokens = named.require(inputs::TEXT_IDS)?.shape()[1];
                Array3::<f32>::zeros((1, 8, tokens)).into_dyn().into()
            }
            StageKind::LatentDenoiser => {
                let step = f32_input(&named, inputs::CURRENT_STEP)?[[0]];
                let total = f32_input(&named, inputs::TOTAL_STEP)?[[0]];
                log.steps.push((step, total));
                f32_input(&named, inputs::NOISY_LATENT)?.mapv(|v| v + 1.0).into()
            }
            StageKind::Vocoder => {
                log.vocoder_calls += 1;
                let latent = f32_input(&named, inputs::LATENT)?;
                let flat: Vec<f32> = latent.iter().copied().collect();
                let len = flat.len();
                Array2::from_shape_vec((1, len), flat)
                    .map_err(|e| StageError::Runtime(e.to_string()))?
                    .into_dyn()
                    .into()
            }
        };
        Ok(NamedTensors::new().with(self.kind.output_name(), output))
    }
}
