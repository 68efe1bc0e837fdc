//! Export containers the pipeline can produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::voice_error::VoiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// RIFF/WAVE, 16-bit PCM, mono.
    Wav,
    /// MPEG-4 audio container holding a compressed stream.
    M4a,
}

impl AudioFormat {
    /// All supported formats, in presentation order.
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Wav, AudioFormat::M4a];

    /// File extension without the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
        }
    }

    /// MIME type of the container.
    pub const fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
        }
    }

    /// Human readable label.
    pub const fn display_name(self) -> &'static str {
        match self {
            AudioFormat::Wav => "WAV",
            AudioFormat::M4a => "M4A",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AudioFormat {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "m4a" | "mp4" | "aac" => Ok(AudioFormat::M4a),
            other => {
                let known: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.extension()).collect();
                Err(VoiceError::Encode(format!(
                    "unsupported format: {other} (expected one of {})",
                    known.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extensions_and_aliases() {
        for format in AudioFormat::ALL {
            assert_eq!(format.extension().parse::<AudioFormat>(), Ok(format));
        }
        assert_eq!(".WAV".parse::<AudioFormat>(), Ok(AudioFormat::Wav));
        assert_eq!("mp4".parse::<AudioFormat>(), Ok(AudioFormat::M4a));
    }

    #[test]
    fn unknown_format_lists_the_supported_ones() {
        let err = "ogg".parse::<AudioFormat>().unwrap_err();
        assert_eq!(
            err,
            VoiceError::Encode("unsupported format: ogg (expected one of wav, m4a)".into())
        );
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AudioFormat::M4a).unwrap();
        assert_eq!(json, "\"m4a\"");
        assert_eq!(serde_json::from_str::<AudioFormat>(&json).unwrap(), AudioFormat::M4a);
    }
}
