//! Audio export: WAV, compressed `.m4a`, and atomic storage.

pub mod codec;
pub mod compressed;
#[cfg(feature = "mp3lame")]
pub mod lame;
pub mod mp4;
pub mod muxer;
pub mod pcm;
pub mod wav;

use std::io::Write;
use std::path::{Path, PathBuf};

use supertonic_domain::{AudioFormat, VoiceError};
use tempfile::NamedTempFile;

use crate::error::EncodeError;

pub use codec::{AudioCodec, OutputEvent, TrackFormat};
pub use compressed::{EncodeOptions, encode_with};
pub use muxer::ContainerMuxer;
pub use mp4::Mp4Muxer;
pub use wav::encode_wav;

/// Bitrate of the compressed export.
pub const COMPRESSED_BITRATE_KBPS: u32 = 128;

/// Default file name prefix for saved audio.
pub const DEFAULT_PREFIX: &str = "supertonic";

/// An encoded audio file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioContainer {
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
}

impl AudioContainer {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode `waveform` through the bundled MP3 encoder into an `.m4a` file.
#[cfg(feature = "mp3lame")]
pub fn encode_compressed(waveform: &[f32], sample_rate: u32) -> Result<Vec<u8>, EncodeError> {
    let codec = lame::LameCodec::new(sample_rate, COMPRESSED_BITRATE_KBPS)?;
    encode_with(
        codec,
        Mp4Muxer::new(),
        waveform,
        sample_rate,
        EncodeOptions::default(),
    )
}

#[cfg(not(feature = "mp3lame"))]
pub fn encode_compressed(_waveform: &[f32], _sample_rate: u32) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::Unsupported(
        "built without a compressed audio encoder".into(),
    ))
}

/// Serialize `waveform` into `format`.
pub fn export_audio(
    waveform: &[f32],
    sample_rate: u32,
    format: AudioFormat,
) -> Result<AudioContainer, VoiceError> {
    let bytes = match format {
        AudioFormat::Wav => encode_wav(waveform, sample_rate)?,
        AudioFormat::M4a => encode_compressed(waveform, sample_rate)?,
    };
    tracing::debug!(%format, bytes = bytes.len(), "audio exported");
    Ok(AudioContainer { format, bytes })
}

/// `<prefix>_<epoch-millis>.<ext>`
pub fn file_name(prefix: &str, format: AudioFormat, epoch_millis: i64) -> String {
    format!("{prefix}_{epoch_millis}.{}", format.extension())
}

/// Write `container` into `dir` under a timestamped name.
///
/// The bytes go to a hidden temporary file in `dir` that is renamed into
/// place only once fully written; on failure it is removed.
pub fn save_audio(
    container: &AudioContainer,
    dir: &Path,
    prefix: &str,
) -> Result<PathBuf, VoiceError> {
    let name = file_name(prefix, container.format, chrono::Utc::now().timestamp_millis());
    let target = dir.join(&name);
    let storage = |what: &str, e: &dyn std::fmt::Display| {
        VoiceError::Storage(format!("{what} {}: {e}", target.display()))
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| storage("cannot create temporary file for", &e))?;
    write_all(&mut tmp, &container.bytes).map_err(|e| storage("cannot write", &e))?;
    tmp.persist(&target)
        .map_err(|e| storage("cannot move into place", &e.error))?;

    tracing::info!(path = %target.display(), bytes = container.len(), "audio saved");
    Ok(target)
}

fn write_all(tmp: &mut NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()
}
