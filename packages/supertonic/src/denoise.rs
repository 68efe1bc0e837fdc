//! Iterative latent refinement.

use supertonic_domain::{DenoiseSteps, VoiceError};

use crate::stage::{StageKind, StageSet, inputs};
use crate::tensor::{NamedTensors, Tensor};

/// Per-chunk tensors that stay fixed across every denoising step.
#[derive(Debug, Clone)]
pub struct Conditioning {
    /// `[1, T, E]`
    pub text_emb: Tensor,
    pub style_ttl: Tensor,
    /// `[1, 1, T]`
    pub text_mask: Tensor,
    /// `[1, 1, latent_len]`, all ones
    pub latent_mask: Tensor,
}

/// Runs the latent denoiser a fixed number of times.
#[derive(Debug, Clone, Copy)]
pub struct DenoisingLoop {
    steps: u32,
}

impl DenoisingLoop {
    pub fn new(steps: DenoiseSteps) -> Self {
        Self {
            steps: steps.value(),
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Call the denoiser with `current_step` = 0..steps and `total_step` =
    /// steps, feeding each output back in as the next `noisy_latent`.
    pub fn run(
        &self,
        stages: &mut StageSet,
        latent: Tensor,
        cond: &Conditioning,
    ) -> Result<Tensor, VoiceError> {
        let expected = latent.shape().to_vec();
        let total = Tensor::scalar_f32(self.steps as f32);
        let mut latent = latent;

        for step in 0..self.steps {
            let step_inputs = NamedTensors::new()
                .with(inputs::NOISY_LATENT, latent)
                .with(inputs::TEXT_EMB, cond.text_emb.clone())
                .with(inputs::STYLE_TTL, cond.style_ttl.clone())
                .with(inputs::TEXT_MASK, cond.text_mask.clone())
                .with(inputs::LATENT_MASK, cond.latent_mask.clone())
                .with(inputs::CURRENT_STEP, Tensor::scalar_f32(step as f32))
                .with(inputs::TOTAL_STEP, total.clone());

            latent = stages.call(StageKind::LatentDenoiser, step_inputs)?;

            let dims: Vec<Option<usize>> = expected.iter().copied().map(Some).collect();
            latent
                .expect_dims(StageKind::LatentDenoiser.output_name(), &dims)
                .map_err(|e| e.at(StageKind::LatentDenoiser))?;
            tracing::trace!(step, total = self.steps, "denoise step");
        }
        Ok(latent)
    }
}
