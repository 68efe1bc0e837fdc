//! The inference-stage capability.
//!
//! All four model stages share one call contract (named tensors in, named
//! tensors out), so the orchestrator holds them as a [`StageSet`] indexed by
//! [`StageKind`] rather than as four hard-wired fields.

use std::fmt;
use std::time::Instant;

use supertonic_domain::VoiceError;

use crate::error::StageError;
use crate::tensor::NamedTensors;

/// Graph input names shared by the stage models.
pub mod inputs {
    pub const TEXT_IDS: &str = "text_ids";
    pub const TEXT_MASK: &str = "text_mask";
    pub const STYLE_DP: &str = "style_dp";
    pub const STYLE_TTL: &str = "style_ttl";
    pub const TEXT_EMB: &str = "text_emb";
    pub const NOISY_LATENT: &str = "noisy_latent";
    pub const LATENT_MASK: &str = "latent_mask";
    pub const CURRENT_STEP: &str = "current_step";
    pub const TOTAL_STEP: &str = "total_step";
    pub const LATENT: &str = "latent";
}

/// Identifies one of the four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    DurationPredictor,
    TextEncoder,
    LatentDenoiser,
    Vocoder,
}

impl StageKind {
    /// Stages in execution order.
    pub const ALL: [StageKind; 4] = [
        StageKind::DurationPredictor,
        StageKind::TextEncoder,
        StageKind::LatentDenoiser,
        StageKind::Vocoder,
    ];

    pub const fn index(self) -> usize {
        match self {
            StageKind::DurationPredictor => 0,
            StageKind::TextEncoder => 1,
            StageKind::LatentDenoiser => 2,
            StageKind::Vocoder => 3,
        }
    }

    /// Short name used in logs and error reports.
    pub const fn name(self) -> &'static str {
        match self {
            StageKind::DurationPredictor => "duration_predictor",
            StageKind::TextEncoder => "text_encoder",
            StageKind::LatentDenoiser => "vector_estimator",
            StageKind::Vocoder => "vocoder",
        }
    }

    /// File name of the model asset backing this stage.
    pub const fn model_file(self) -> &'static str {
        match self {
            StageKind::DurationPredictor => "duration_predictor.onnx",
            StageKind::TextEncoder => "text_encoder.onnx",
            StageKind::LatentDenoiser => "vector_estimator.onnx",
            StageKind::Vocoder => "vocoder.onnx",
        }
    }

    /// Name under which the stage's primary output is returned.
    pub const fn output_name(self) -> &'static str {
        match self {
            StageKind::DurationPredictor => "duration",
            StageKind::TextEncoder => "text_emb",
            StageKind::LatentDenoiser => "denoised_latent",
            StageKind::Vocoder => "wav",
        }
    }

    /// Input names the stage consumes, in graph order.
    pub const fn input_names(self) -> &'static [&'static str] {
        match self {
            StageKind::DurationPredictor => {
                &[inputs::TEXT_IDS, inputs::STYLE_DP, inputs::TEXT_MASK]
            }
            StageKind::TextEncoder => &[inputs::TEXT_IDS, inputs::STYLE_TTL, inputs::TEXT_MASK],
            StageKind::LatentDenoiser => &[
                inputs::NOISY_LATENT,
                inputs::TEXT_EMB,
                inputs::STYLE_TTL,
                inputs::TEXT_MASK,
                inputs::LATENT_MASK,
                inputs::CURRENT_STEP,
                inputs::TOTAL_STEP,
            ],
            StageKind::Vocoder => &[inputs::LATENT],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single inference stage.
///
/// Calls take `&mut self`: a stage is not safe for concurrent invocation and
/// the owner serializes access.
pub trait Stage: Send {
    fn kind(&self) -> StageKind;

    /// Run the stage once. The returned collection must contain
    /// [`StageKind::output_name`].
    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors, StageError>;
}

/// Creates stage handles, e.g. from model files on disk.
pub trait StageLoader {
    fn load(&self, kind: StageKind) -> Result<Box<dyn Stage>, StageError>;
}

/// Exactly one handle per [`StageKind`].
pub struct StageSet {
    stages: [Box<dyn Stage>; 4],
}

impl StageSet {
    /// Assemble a set from handles in any order.
    ///
    /// Fails unless every kind is present exactly once.
    pub fn new(stages: impl IntoIterator<Item = Box<dyn Stage>>) -> Result<Self, VoiceError> {
        let mut slots: [Option<Box<dyn Stage>>; 4] = [None, None, None, None];
        for stage in stages {
            let kind = stage.kind();
            let slot = &mut slots[kind.index()];
            if slot.is_some() {
                return Err(VoiceError::Initialization(format!(
                    "stage {kind} supplied more than once"
                )));
            }
            *slot = Some(stage);
        }

        let [dp, te, ve, vo] = slots;
        let missing = |kind: StageKind| {
            VoiceError::Initialization(format!("stage {kind} was not supplied"))
        };
        Ok(Self {
            stages: [
                dp.ok_or_else(|| missing(StageKind::DurationPredictor))?,
                te.ok_or_else(|| missing(StageKind::TextEncoder))?,
                ve.ok_or_else(|| missing(StageKind::LatentDenoiser))?,
                vo.ok_or_else(|| missing(StageKind::Vocoder))?,
            ],
        })
    }

    /// Load all four stages through `loader`, stopping at the first failure.
    pub fn load(loader: &dyn StageLoader) -> Result<Self, VoiceError> {
        let mut loaded = Vec::with_capacity(StageKind::ALL.len());
        for kind in StageKind::ALL {
            let started = Instant::now();
            let stage = loader.load(kind).map_err(|e| e.at(kind))?;
            tracing::debug!(
                stage = kind.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage loaded"
            );
            loaded.push(stage);
        }
        Self::new(loaded)
    }

    /// Invoke one stage and take its primary output.
    pub fn call(
        &mut self,
        kind: StageKind,
        inputs: NamedTensors,
    ) -> Result<crate::tensor::Tensor, VoiceError> {
        let started = Instant::now();
        let mut outputs = self.stages[kind.index()]
            .run(inputs)
            .map_err(|e| e.at(kind))?;
        tracing::trace!(
            stage = kind.name(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "stage call"
        );
        outputs.take(kind.output_name()).map_err(|e| e.at(kind))
    }

    /// Release every handle. Consuming `self` guarantees this happens once.
    pub fn release(self) {
        for stage in self.stages {
            tracing::debug!(stage = stage.kind().name(), "releasing stage");
            drop(stage);
        }
    }
}

impl fmt::Debug for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.kind().name()))
            .finish()
    }
}
