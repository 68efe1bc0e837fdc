//! Encode/mux loop for compressed export.
//!
//! Input side: `Feeding` → `FeedingDone` once the end-of-stream buffer has
//! been queued. Output side: `AwaitingFormat` → `Muxing` on the format event
//! → `OutputDone` on the end-of-stream output buffer. Data before `Muxing` is
//! a protocol violation. The codec and muxer are released exactly once on
//! every exit path.

use std::time::Duration;

use scopeguard::guard;

use super::codec::{AudioCodec, DEFAULT_TIMEOUT, MAX_INPUT_BUFFER_BYTES, OutputEvent};
use super::muxer::ContainerMuxer;
use super::pcm;
use crate::error::EncodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Bounded wait for each dequeue attempt.
    pub timeout: Duration,
    /// Consecutive polls without progress before giving up.
    pub max_idle_polls: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_idle_polls: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputState {
    Feeding,
    FeedingDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputState {
    AwaitingFormat,
    Muxing,
    OutputDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxerState {
    Idle,
    Started,
    Stopped,
}

struct Resources<C: AudioCodec, M: ContainerMuxer> {
    codec: C,
    muxer: M,
    muxer_state: MuxerState,
}

fn pts_us(samples: usize, sample_rate: u32) -> i64 {
    (samples as u128 * 1_000_000 / sample_rate as u128) as i64
}

/// Quantize `waveform` and drive it through `codec` into `muxer`.
pub fn encode_with<C, M>(
    codec: C,
    muxer: M,
    waveform: &[f32],
    sample_rate: u32,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError>
where
    C: AudioCodec,
    M: ContainerMuxer,
{
    let resources = Resources {
        codec,
        muxer,
        muxer_state: MuxerState::Idle,
    };
    let mut res = guard(resources, |mut r| {
        if r.muxer_state == MuxerState::Started
            && let Err(e) = r.muxer.stop()
        {
            tracing::warn!(error = %e, "muxer stop failed during teardown");
        }
        r.codec.release();
        r.muxer.release();
    });

    if sample_rate == 0 {
        return Err(EncodeError::Unsupported("sample rate 0".into()));
    }

    let pcm = pcm::to_le_bytes(&pcm::quantize(waveform));
    let total_samples = waveform.len();
    let Resources {
        codec,
        muxer,
        muxer_state,
    } = &mut *res;

    let mut input = InputState::Feeding;
    let mut output = OutputState::AwaitingFormat;
    let mut offset = 0usize;
    let mut track = None;
    let mut idle_polls = 0u32;
    let mut samples_written = 0usize;

    while output != OutputState::OutputDone {
        let mut progressed = false;

        if input == InputState::Feeding
            && let Some(buffer) = codec.dequeue_input_buffer(options.timeout)?
        {
            progressed = true;
            if offset < pcm.len() {
                // whole samples only
                let room = buffer.capacity.min(MAX_INPUT_BUFFER_BYTES) & !1;
                if room == 0 {
                    return Err(EncodeError::Protocol(format!(
                        "input buffer {} has no room for a sample",
                        buffer.index
                    )));
                }
                let n = room.min(pcm.len() - offset);
                let pts = pts_us(offset / 2, sample_rate);
                codec.queue_input_buffer(buffer, &pcm[offset..offset + n], pts, false)?;
                offset += n;
            } else {
                codec.queue_input_buffer(buffer, &[], pts_us(total_samples, sample_rate), true)?;
                input = InputState::FeedingDone;
                tracing::trace!(bytes = pcm.len(), "encoder input complete");
            }
        }

        match codec.dequeue_output_buffer(options.timeout)? {
            OutputEvent::TryAgainLater => {}
            OutputEvent::FormatChanged(format) => {
                progressed = true;
                if output != OutputState::AwaitingFormat {
                    return Err(EncodeError::Protocol(
                        "format changed after muxing started".into(),
                    ));
                }
                tracing::debug!(mime = %format.mime, sample_rate = format.sample_rate, "encoder format");
                track = Some(muxer.add_track(&format)?);
                muxer.start()?;
                *muxer_state = MuxerState::Started;
                output = OutputState::Muxing;
            }
            OutputEvent::Buffer(buffer) => {
                progressed = true;
                if output != OutputState::Muxing {
                    return Err(EncodeError::Protocol(format!(
                        "output buffer {} arrived before the track format",
                        buffer.index
                    )));
                }
                if !buffer.data.is_empty() {
                    let track = track.ok_or_else(|| {
                        EncodeError::Protocol("muxing without a track".into())
                    })?;
                    muxer.write_sample(track, &buffer.data, buffer.pts_us)?;
                    samples_written += 1;
                }
                codec.release_output_buffer(buffer.index)?;
                if buffer.end_of_stream {
                    output = OutputState::OutputDone;
                }
            }
        }

        if progressed {
            idle_polls = 0;
        } else {
            idle_polls += 1;
            if idle_polls >= options.max_idle_polls {
                return Err(EncodeError::Stalled {
                    attempts: idle_polls,
                    timeout: options.timeout,
                });
            }
        }
    }

    muxer.stop()?;
    *muxer_state = MuxerState::Stopped;
    let bytes = muxer.finish()?;
    tracing::debug!(samples = samples_written, bytes = bytes.len(), "compressed export done");
    Ok(bytes)
}
