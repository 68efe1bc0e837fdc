//! Seeded initial latent for the denoising loop.

use ndarray::Array3;
use rand::{Rng, SeedableRng, rngs::StdRng};
use supertonic_domain::VoiceError;

use crate::config::PipelineConfig;
use crate::stage::StageKind;

/// Latent geometry for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatentShape {
    /// Waveform samples implied by the predicted duration.
    pub wave_samples: usize,
    pub dim: usize,
    pub len: usize,
}

impl LatentShape {
    /// Derive the latent shape from a predicted duration in seconds.
    ///
    /// `len` is at least one frame so the denoiser never sees an empty axis.
    /// Durations above `max_secs` are rejected before any allocation.
    pub fn for_duration(
        secs: f32,
        cfg: &PipelineConfig,
        max_secs: f32,
    ) -> Result<Self, VoiceError> {
        let unusable = |why: String| VoiceError::Inference {
            stage: StageKind::DurationPredictor.name(),
            message: why,
        };
        if !secs.is_finite() || secs < 0.0 {
            return Err(unusable(format!(
                "predicted duration {secs} is not a usable length"
            )));
        }
        if secs > max_secs {
            return Err(unusable(format!(
                "predicted duration {secs}s exceeds the {max_secs}s chunk limit"
            )));
        }

        let wave_samples = (secs as f64 * cfg.sample_rate as f64).round() as usize;
        let len = wave_samples.div_ceil(cfg.samples_per_latent_frame()).max(1);
        let dim = cfg.latent_dim();
        let fits = dim
            .checked_mul(len)
            .is_some_and(|n| n <= isize::MAX as usize / std::mem::size_of::<f32>());
        if !fits {
            return Err(unusable(format!("latent [1, {dim}, {len}] is too large")));
        }
        Ok(Self {
            wave_samples,
            dim,
            len,
        })
    }

    /// `[1, dim, len]`
    pub fn dims(&self) -> [usize; 3] {
        [1, self.dim, self.len]
    }
}

/// Uniform `[-1, 1)` noise from a seeded generator.
///
/// Generator state is local to one sampler; identical seeds and shapes give
/// bit-identical tensors.
#[derive(Debug, Clone)]
pub struct LatentSampler {
    rng: StdRng,
}

impl LatentSampler {
    pub fn new(seed: i64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed as u64),
        }
    }

    pub fn sample(&mut self, shape: &LatentShape) -> Array3<f32> {
        let rng = &mut self.rng;
        Array3::from_shape_simple_fn((1, shape.dim, shape.len), || {
            rng.random::<f32>() * 2.0 - 1.0
        })
    }
}

/// One-shot form of [`LatentSampler::sample`].
pub fn sample_latent(seed: i64, shape: &LatentShape) -> Array3<f32> {
    LatentSampler::new(seed).sample(shape)
}

/// The caller's seed, or the current wall-clock time in milliseconds.
pub fn resolve_seed(seed: Option<i64>) -> i64 {
    seed.unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PipelineConfig {
        PipelineConfig {
            sample_rate: 44100,
            base_chunk_size: 512,
            latent_dim_base: 24,
            chunk_compress_factor: 6,
        }
    }

    #[test]
    fn shape_follows_predicted_duration() {
        let shape = LatentShape::for_duration(1.0, &cfg(), 60.0).expect("finite");
        assert_eq!(shape.wave_samples, 44100);
        // ceil(44100 / 3072)
        assert_eq!(shape.len, 15);
        assert_eq!(shape.dims(), [1, 144, 15]);

        let empty = LatentShape::for_duration(0.0, &cfg(), 60.0).expect("zero");
        assert_eq!(empty.len, 1);
    }

    #[test]
    fn unusable_durations_are_inference_errors() {
        for secs in [f32::NAN, f32::INFINITY, -0.5, 60.5, 1.0e30] {
            let err = LatentShape::for_duration(secs, &cfg(), 60.0).unwrap_err();
            assert!(matches!(err, VoiceError::Inference { stage: "duration_predictor", .. }));
        }
    }

    #[test]
    fn duration_at_the_limit_is_accepted() {
        let shape = LatentShape::for_duration(60.0, &cfg(), 60.0).expect("at limit");
        assert_eq!(shape.wave_samples, 2_646_000);
    }

    #[test]
    fn sampling_is_reproducible_and_bounded() {
        let shape = LatentShape::for_duration(0.5, &cfg(), 60.0).expect("finite");
        let a = sample_latent(42, &shape);
        let b = sample_latent(42, &shape);
        let c = sample_latent(43, &shape);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn explicit_seed_wins() {
        assert_eq!(resolve_seed(Some(-7)), -7);
        assert!(resolve_seed(None) > 0);
    }
}
