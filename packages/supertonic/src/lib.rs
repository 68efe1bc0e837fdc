//! # Supertonic
//!
//! Text-to-speech through four ONNX stages: duration prediction, text
//! encoding, iterative latent denoising and vocoding.
//!
//! ```no_run
//! # #[cfg(feature = "onnx")]
//! # fn main() -> Result<(), supertonic::VoiceError> {
//! use supertonic::{AssetPaths, AudioFormat, EngineSettings, GenerationRequest, SupertonicTts};
//!
//! let paths = AssetPaths::new("assets/onnx");
//! let mut tts = SupertonicTts::from_assets(&paths, EngineSettings::default())?;
//! let voice = supertonic::VoiceLibrary::new(paths.voice_styles()).load("F1")?;
//!
//! let speech = tts.generate(&GenerationRequest::new("Hello world").with_style(voice))?;
//! let wav = supertonic::export_audio(&speech.waveform, speech.sample_rate, AudioFormat::Wav)?;
//! # let _ = wav;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "onnx"))]
//! # fn main() {}
//! ```

pub mod assembler;
pub mod config;
pub mod denoise;
pub mod error;
pub mod export;
pub mod latent;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod stage;
pub mod style;
pub mod tensor;
pub mod text;
pub mod worker;

pub use config::{AssetPaths, EngineSettings, PipelineConfig};
pub use error::{EncodeError, StageError};
pub use export::{AudioContainer, DEFAULT_PREFIX, export_audio, file_name, save_audio};
pub use pipeline::{CancelFlag, GenerationRequest, SpeechOutput, SupertonicTts};
pub use stage::{Stage, StageKind, StageLoader, StageSet};
pub use style::{StylePack, VoiceLibrary};
pub use tensor::{NamedTensors, Tensor};
pub use text::{NormalizedText, TextNormalizer};
pub use worker::SynthesisWorker;

pub use supertonic_domain::{
    AudioFormat, ChunkTiming, DenoiseSteps, Language, SynthesisMetadata, VocalSpeedMod,
    VoiceError, VoiceId, VoiceResult,
};
