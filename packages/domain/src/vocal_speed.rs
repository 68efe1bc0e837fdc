//! Speaking rate multiplier (1.0 = normal).
use serde::{Deserialize, Serialize};

use crate::voice_error::VoiceError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocalSpeedMod(f32);

impl VocalSpeedMod {
    /// Slowest accepted rate.
    pub const MIN: f32 = 0.5;
    /// Fastest accepted rate.
    pub const MAX: f32 = 2.0;

    /// Validate a speed factor. Values outside `[0.5, 2.0]` (or non-finite)
    /// are rejected rather than clamped.
    pub fn new(value: f32) -> Result<Self, VoiceError> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(VoiceError::Validation(format!(
                "speed {value} outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// Get the speed factor.
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for VocalSpeedMod {
    fn default() -> Self {
        Self(1.05)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(VocalSpeedMod::new(0.5).is_ok());
        assert!(VocalSpeedMod::new(2.0).is_ok());
        assert!(VocalSpeedMod::new(0.49).is_err());
        assert!(VocalSpeedMod::new(2.01).is_err());
        assert!(VocalSpeedMod::new(f32::NAN).is_err());
    }
}
