//! Request orchestration: text → chunks → four stages per chunk → waveform.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use supertonic_domain::{
    ChunkTiming, DenoiseSteps, Language, SynthesisMetadata, VocalSpeedMod, VoiceError,
    VoiceResult,
};

use crate::config::{EngineSettings, PipelineConfig};
use crate::denoise::{Conditioning, DenoisingLoop};
use crate::latent::{LatentSampler, LatentShape, resolve_seed};
use crate::stage::{StageKind, StageSet, inputs};
use crate::style::StylePack;
use crate::tensor::{NamedTensors, Tensor};
use crate::text::{TextNormalizer, chunk};
use crate::{assembler, error::StageError};

/// One synthesis request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub style: Option<StylePack>,
    /// Language code; unsupported codes fall back to the engine default.
    pub language: String,
    pub speed: f32,
    pub steps: u32,
    /// Fixed seed for reproducible output; wall-clock time when `None`.
    pub seed: Option<i64>,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
            language: Language::ENGLISH.code().to_string(),
            speed: VocalSpeedMod::default().value(),
            steps: DenoiseSteps::default().value(),
            seed: None,
        }
    }

    pub fn with_style(mut self, style: StylePack) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check everything that can be rejected before any stage runs.
    pub fn validate(&self) -> VoiceResult<(&StylePack, VocalSpeedMod, DenoiseSteps)> {
        if self.text.trim().is_empty() {
            return Err(VoiceError::Validation("text is empty".into()));
        }
        let style = self
            .style
            .as_ref()
            .ok_or_else(|| VoiceError::Validation("no voice style selected".into()))?;
        let speed = VocalSpeedMod::new(self.speed)?;
        let steps = DenoiseSteps::new(self.steps)?;
        Ok((style, speed, steps))
    }
}

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutput {
    pub waveform: Vec<f32>,
    pub sample_rate: u32,
    /// The seed every chunk was sampled with.
    pub seed_used: i64,
    pub metadata: SynthesisMetadata,
}

impl SpeechOutput {
    pub fn duration_secs(&self) -> f64 {
        self.waveform.len() as f64 / self.sample_rate as f64
    }
}

/// Cooperative cancellation, observed between chunks only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct ChunkAudio {
    samples: Vec<f32>,
    predicted_secs: f32,
}

/// The synthesis engine.
///
/// Owns the four stage handles for its whole lifetime. Generation takes
/// `&mut self`, so at most one request is in flight per engine.
#[derive(Debug)]
pub struct SupertonicTts {
    config: PipelineConfig,
    settings: EngineSettings,
    normalizer: TextNormalizer,
    stages: StageSet,
}

impl SupertonicTts {
    pub fn new(
        config: PipelineConfig,
        settings: EngineSettings,
        normalizer: TextNormalizer,
        stages: StageSet,
    ) -> VoiceResult<Self> {
        config.validate()?;
        settings.validate()?;
        tracing::info!(
            sample_rate = config.sample_rate,
            latent_dim = config.latent_dim(),
            "supertonic engine ready"
        );
        Ok(Self {
            config,
            settings,
            normalizer,
            stages,
        })
    }

    /// Load every asset and ONNX session from an asset directory.
    #[cfg(feature = "onnx")]
    pub fn from_assets(
        paths: &crate::config::AssetPaths,
        settings: EngineSettings,
    ) -> VoiceResult<Self> {
        let config = PipelineConfig::load(paths.model_config())?;
        let indexer = crate::text::CodepointIndexer::from_json_file(paths.codepoint_table())?;
        let normalizer = TextNormalizer::new(indexer, settings.language());
        let loader = crate::onnx::OnnxLoader::new(paths.clone(), &settings);
        let stages = StageSet::load(&loader)?;
        Self::new(config, settings, normalizer, stages)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Synthesize `request` to completion.
    pub fn generate(&mut self, request: &GenerationRequest) -> VoiceResult<SpeechOutput> {
        self.generate_with_cancel(request, &CancelFlag::default())
    }

    /// Synthesize `request`, checking `cancel` before each chunk.
    ///
    /// A cancelled request discards the chunks produced so far.
    pub fn generate_with_cancel(
        &mut self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> VoiceResult<SpeechOutput> {
        let (style, speed, steps) = request.validate()?;
        let started = Instant::now();
        let seed = resolve_seed(request.seed);
        let chunks = chunk(&request.text, self.settings.max_chunk_len);
        tracing::info!(
            chunks = chunks.len(),
            seed,
            speed = speed.value(),
            steps = steps.value(),
            voice = %style.name(),
            "generating speech"
        );

        let mut audio = Vec::with_capacity(chunks.len());
        let mut timings = Vec::with_capacity(chunks.len());
        for (index, text) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(chunk = index, "generation cancelled");
                return Err(VoiceError::Cancelled);
            }
            let chunk_started = Instant::now();
            let out = self.synthesize_chunk(text, &request.language, style, speed, steps, seed)?;
            let elapsed_ms = chunk_started.elapsed().as_millis() as u64;
            tracing::debug!(
                chunk = index,
                predicted_secs = out.predicted_secs,
                samples = out.samples.len(),
                elapsed_ms,
                "chunk synthesized"
            );
            timings.push(ChunkTiming {
                index,
                text: text.clone(),
                predicted_secs: out.predicted_secs,
                samples: out.samples.len(),
                elapsed_ms,
            });
            audio.push(out.samples);
        }

        let silence_samples = self.config.samples_for(self.settings.silence_secs);
        let waveform = assembler::assemble(&audio, silence_samples);
        let metadata = SynthesisMetadata {
            sample_rate: self.config.sample_rate,
            chunks: timings,
            silence_samples,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            samples = waveform.len(),
            audio_secs = metadata.audio_duration_secs(),
            elapsed_ms = metadata.elapsed_ms,
            "speech generated"
        );

        Ok(SpeechOutput {
            waveform,
            sample_rate: self.config.sample_rate,
            seed_used: seed,
            metadata,
        })
    }

    fn synthesize_chunk(
        &mut self,
        text: &str,
        language: &str,
        style: &StylePack,
        speed: VocalSpeedMod,
        steps: DenoiseSteps,
        seed: i64,
    ) -> VoiceResult<ChunkAudio> {
        let normalized = self.normalizer.normalize(text, language);
        let text_ids = normalized
            .ids_tensor()
            .map_err(|e| e.at(StageKind::DurationPredictor))?;
        let text_mask = normalized
            .mask_tensor()
            .map_err(|e| e.at(StageKind::DurationPredictor))?;
        let style_ttl = style.ttl_tensor();

        let duration = self.stages.call(
            StageKind::DurationPredictor,
            NamedTensors::new()
                .with(inputs::TEXT_IDS, text_ids.clone())
                .with(inputs::STYLE_DP, style.dp_tensor())
                .with(inputs::TEXT_MASK, text_mask.clone()),
        )?;
        let raw_secs = first_value(&duration, StageKind::DurationPredictor)?;
        let predicted_secs = raw_secs / speed.value();

        let text_emb = self.stages.call(
            StageKind::TextEncoder,
            NamedTensors::new()
                .with(inputs::TEXT_IDS, text_ids)
                .with(inputs::STYLE_TTL, style_ttl.clone())
                .with(inputs::TEXT_MASK, text_mask.clone()),
        )?;
        text_emb
            .expect_dims(StageKind::TextEncoder.output_name(), &[Some(1), None, None])
            .map_err(|e| e.at(StageKind::TextEncoder))?;

        let shape =
            LatentShape::for_duration(predicted_secs, &self.config, self.settings.max_chunk_secs)?;
        let latent = Tensor::F32(LatentSampler::new(seed).sample(&shape).into_dyn());
        let cond = Conditioning {
            text_emb,
            style_ttl,
            text_mask,
            latent_mask: Tensor::ones_f32(&[1, 1, shape.len]),
        };
        let latent = DenoisingLoop::new(steps).run(&mut self.stages, latent, &cond)?;

        let wav = self
            .stages
            .call(StageKind::Vocoder, NamedTensors::new().with(inputs::LATENT, latent))?
            .into_f32(StageKind::Vocoder.output_name())
            .map_err(|e| e.at(StageKind::Vocoder))?;

        Ok(ChunkAudio {
            samples: wav.into_iter().collect(),
            predicted_secs,
        })
    }

    /// Release the stage handles.
    pub fn shutdown(self) {
        tracing::info!("shutting down supertonic engine");
        self.stages.release();
    }
}

fn first_value(tensor: &Tensor, stage: StageKind) -> VoiceResult<f32> {
    let name = stage.output_name();
    let array = tensor
        .as_f32()
        .ok_or_else(|| StageError::ElementType(name).at(stage))?;
    array.iter().next().copied().ok_or_else(|| {
        StageError::Shape {
            name,
            actual: array.shape().to_vec(),
            expected: "at least one element".into(),
        }
        .at(stage)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use supertonic_domain::VoiceId;

    fn style() -> StylePack {
        let ttl = ndarray::Array3::<f32>::zeros((1, 2, 2));
        let dp = ndarray::Array3::<f32>::zeros((1, 1, 2));
        StylePack::new(VoiceId::new("test"), ttl, dp).expect("batch 1")
    }

    #[test]
    fn requests_default_to_app_settings() {
        let req = GenerationRequest::new("hi");
        assert_eq!(req.speed, 1.05);
        assert_eq!(req.steps, 5);
        assert_eq!(req.seed, None);
        assert_eq!(req.language, "en");
    }

    #[test]
    fn invalid_requests_are_rejected_before_inference() {
        let cases = [
            GenerationRequest::new("   ").with_style(style()),
            GenerationRequest::new("text"),
            GenerationRequest::new("text").with_style(style()).with_speed(0.4),
            GenerationRequest::new("text").with_style(style()).with_speed(f32::NAN),
            GenerationRequest::new("text").with_style(style()).with_steps(0),
            GenerationRequest::new("text").with_style(style()).with_steps(21),
        ];
        for req in &cases {
            assert!(matches!(req.validate(), Err(VoiceError::Validation(_))), "{req:?}");
        }

        let ok = GenerationRequest::new("text")
            .with_style(style())
            .with_speed(2.0)
            .with_steps(1);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!other.is_cancelled());
    }
}
