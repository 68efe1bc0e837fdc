//! Number of latent refinement iterations.
//!
//! More steps trade generation time for a cleaner latent. The vector
//! estimator is trained for 1..=20 steps.

use serde::{Deserialize, Serialize};

use crate::voice_error::VoiceError;

/// Denoising step count between 1 and 20.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenoiseSteps(u32);

impl DenoiseSteps {
    /// Fewest accepted steps.
    pub const MIN: u32 = 1;
    /// Most accepted steps.
    pub const MAX: u32 = 20;

    /// Create a new step count, rejecting values outside `[1, 20]`.
    pub fn new(value: u32) -> Result<Self, VoiceError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(VoiceError::Validation(format!(
                "steps {value} outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// Get the step count.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for DenoiseSteps {
    fn default() -> Self {
        Self(5)
    }
}
