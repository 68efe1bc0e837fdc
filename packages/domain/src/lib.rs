//! # Supertonic Domain
//!
//! Shared domain objects and types for the supertonic speech pipeline.
//!
//! This crate contains the value types that are shared between the
//! inference engine, the export layer and the command-line front end,
//! without pulling in any inference runtime.

pub mod audio_format;
pub mod denoise_steps;
pub mod language;
pub mod synthesis_metadata;
pub mod vocal_speed;
pub mod voice_error;
pub mod voice_id;

// Re-export core types
pub use audio_format::AudioFormat;
pub use denoise_steps::DenoiseSteps;
pub use language::Language;
pub use synthesis_metadata::{ChunkTiming, SynthesisMetadata};
pub use vocal_speed::VocalSpeedMod;
pub use voice_error::{VoiceError, VoiceResult};
pub use voice_id::VoiceId;
