//! Timing report attached to every generated utterance.
use serde::{Deserialize, Serialize};

/// Per-chunk timing collected while synthesizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkTiming {
    /// Position of the chunk in the request.
    pub index: usize,
    /// Source text of the chunk (before normalization).
    pub text: String,
    /// Duration predicted for the chunk, already divided by the speed factor.
    pub predicted_secs: f32,
    /// Waveform samples the vocoder produced for the chunk.
    pub samples: usize,
    /// Wall-clock time spent generating the chunk, in milliseconds.
    pub elapsed_ms: u64,
}

/// Summary of one generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisMetadata {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Timing of each synthesized chunk, in order.
    pub chunks: Vec<ChunkTiming>,
    /// Silence samples inserted between consecutive chunks.
    pub silence_samples: usize,
    /// Total wall-clock time for the request, in milliseconds.
    pub elapsed_ms: u64,
}

impl SynthesisMetadata {
    /// Number of chunks in the request.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total samples in the assembled waveform.
    pub fn total_samples(&self) -> usize {
        let voiced: usize = self.chunks.iter().map(|c| c.samples).sum();
        voiced + self.chunks.len().saturating_sub(1) * self.silence_samples
    }

    /// Length of the assembled waveform in seconds.
    pub fn audio_duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_samples() as f64 / f64::from(self.sample_rate)
    }

    /// Audio seconds produced per wall-clock second.
    pub fn real_time_factor(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.audio_duration_secs() / (self.elapsed_ms as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(index: usize, samples: usize) -> ChunkTiming {
        ChunkTiming {
            index,
            text: String::new(),
            predicted_secs: 0.0,
            samples,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn totals_include_inserted_silence() {
        let meta = SynthesisMetadata {
            sample_rate: 10,
            chunks: vec![timing(0, 20), timing(1, 30)],
            silence_samples: 3,
            elapsed_ms: 1000,
        };
        assert_eq!(meta.total_samples(), 53);
        assert!((meta.audio_duration_secs() - 5.3).abs() < 1e-9);
        assert!((meta.real_time_factor() - 5.3).abs() < 1e-9);
    }

    #[test]
    fn report_survives_json() {
        let meta = SynthesisMetadata {
            sample_rate: 44100,
            chunks: vec![ChunkTiming {
                index: 0,
                text: "Hello world".into(),
                predicted_secs: 0.8,
                samples: 35280,
                elapsed_ms: 120,
            }],
            silence_samples: 13230,
            elapsed_ms: 125,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"predicted_secs\":0.8"));
        let back: SynthesisMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
