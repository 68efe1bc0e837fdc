//! Error types for the synthesis engine and the export layer.
//!
//! Module-level failures are kept precise here and folded into the
//! workspace-wide [`VoiceError`] taxonomy at the public API boundary.

use std::time::Duration;

use supertonic_domain::VoiceError;

use crate::stage::StageKind;

/// Failure of a single inference stage call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("stage session failed to load: {0}")]
    Load(String),
    #[error("missing input tensor `{0}`")]
    MissingInput(&'static str),
    #[error("missing output tensor `{0}`")]
    MissingOutput(&'static str),
    #[error("tensor `{name}` has shape {actual:?}, expected {expected}")]
    Shape {
        name: &'static str,
        actual: Vec<usize>,
        expected: String,
    },
    #[error("tensor `{0}` has the wrong element type")]
    ElementType(&'static str),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl StageError {
    /// Attach the failing stage and lift into the public taxonomy.
    pub fn at(self, stage: StageKind) -> VoiceError {
        match self {
            StageError::Load(msg) => {
                VoiceError::Initialization(format!("{}: {msg}", stage.name()))
            }
            other => VoiceError::Inference {
                stage: stage.name(),
                message: other.to_string(),
            },
        }
    }
}

/// Failure while driving the encoder/muxer loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("encoder stalled: no progress after {attempts} polls of {timeout:?}")]
    Stalled { attempts: u32, timeout: Duration },
    #[error("codec error: {0}")]
    Codec(String),
    #[error("muxer error: {0}")]
    Muxer(String),
    #[error("unsupported format: {0}")]
    Unsupported(String),
}

impl From<EncodeError> for VoiceError {
    fn from(err: EncodeError) -> Self {
        VoiceError::Encode(err.to_string())
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Muxer(err.to_string())
    }
}
