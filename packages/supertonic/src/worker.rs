//! Off-thread, serialized access to the engine.
//!
//! Inference is CPU-bound and blocking, so each request runs on tokio's
//! blocking pool. The engine sits behind a mutex: one request is in flight
//! at a time and later calls wait their turn.

use std::sync::{Arc, Mutex};

use supertonic_domain::{AudioFormat, VoiceError, VoiceResult};
use tokio::task::JoinError;

use crate::export::{AudioContainer, export_audio};
use crate::pipeline::{CancelFlag, GenerationRequest, SpeechOutput, SupertonicTts};

fn join_error(e: JoinError) -> VoiceError {
    VoiceError::Inference {
        stage: "worker",
        message: format!("synthesis task failed: {e}"),
    }
}

/// Request/response front end for a [`SupertonicTts`] engine.
#[derive(Debug, Clone)]
pub struct SynthesisWorker {
    engine: Arc<Mutex<Option<SupertonicTts>>>,
}

impl SynthesisWorker {
    pub fn new(engine: SupertonicTts) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Some(engine))),
        }
    }

    pub async fn generate(&self, request: GenerationRequest) -> VoiceResult<SpeechOutput> {
        self.generate_with_cancel(request, CancelFlag::new()).await
    }

    /// Run `request` on the blocking pool; `cancel` is checked between chunks.
    pub async fn generate_with_cancel(
        &self,
        request: GenerationRequest,
        cancel: CancelFlag,
    ) -> VoiceResult<SpeechOutput> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut slot = engine
                .lock()
                .map_err(|_| VoiceError::Initialization("engine lock poisoned".into()))?;
            let tts = slot
                .as_mut()
                .ok_or_else(|| VoiceError::Initialization("engine has been shut down".into()))?;
            tts.generate_with_cancel(&request, &cancel)
        })
        .await
        .map_err(join_error)?
    }

    /// Encode generated audio off the async thread. Does not take the engine lock.
    pub async fn export(
        &self,
        output: &SpeechOutput,
        format: AudioFormat,
    ) -> VoiceResult<AudioContainer> {
        let waveform = output.waveform.clone();
        let sample_rate = output.sample_rate;
        tokio::task::spawn_blocking(move || export_audio(&waveform, sample_rate, format))
            .await
            .map_err(join_error)?
    }

    /// Release the engine. Later requests fail with an initialization error.
    pub async fn shutdown(&self) -> VoiceResult<()> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let taken = engine
                .lock()
                .map_err(|_| VoiceError::Initialization("engine lock poisoned".into()))?
                .take();
            if let Some(tts) = taken {
                tts.shutdown();
            }
            Ok(())
        })
        .await
        .map_err(join_error)?
    }
}
