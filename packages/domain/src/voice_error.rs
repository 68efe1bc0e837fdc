//! Unified error for the synthesis and export pipeline.
use thiserror::Error;

/// Top-level error covering initialization, generation and export.
///
/// Every failure in the pipeline resolves to exactly one of these variants.
/// None of them is retried automatically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoiceError {
    /// Asset or inference-stage load failure. Generation stays disabled
    /// until the engine is initialized again.
    #[error("initialization: {0}")]
    Initialization(String),
    /// Caller input rejected before any stage ran.
    #[error("validation: {0}")]
    Validation(String),
    /// A stage call failed; only the current request is aborted.
    #[error("inference ({stage}): {message}")]
    Inference {
        /// Name of the stage that failed.
        stage: &'static str,
        /// Failure reason reported by the stage.
        message: String,
    },
    /// Encoder or muxer failure; only the export is aborted.
    #[error("encode: {0}")]
    Encode(String),
    /// Writing the exported audio failed.
    #[error("storage: {0}")]
    Storage(String),
    /// The request was cancelled at a chunk boundary.
    #[error("cancelled")]
    Cancelled,
}

impl VoiceError {
    /// Returns `true` when the caller can fix the problem and retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, VoiceError::Initialization(_))
    }

    /// Short machine-friendly category name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            VoiceError::Initialization(_) => "initialization",
            VoiceError::Validation(_) => "validation",
            VoiceError::Inference { .. } => "inference",
            VoiceError::Encode(_) => "encode",
            VoiceError::Storage(_) => "storage",
            VoiceError::Cancelled => "cancelled",
        }
    }
}

/// Result alias used across the supertonic crates.
pub type VoiceResult<T> = std::result::Result<T, VoiceError>;
