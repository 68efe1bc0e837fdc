//! Software MP3 encoder exposed through [`AudioCodec`].
//!
//! LAME runs synchronously when an input buffer is queued; the resulting
//! bitstream is split into MP3 frames and handed out one frame per output
//! buffer, preceded by a single format event.

use std::collections::VecDeque;
use std::time::Duration;

use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, MonoPcm, Quality};

use super::codec::{
    AudioCodec, InputBuffer, MAX_INPUT_BUFFER_BYTES, OutputBuffer, OutputEvent, TrackFormat,
};
use crate::error::EncodeError;

pub const MP3_MIME: &str = "audio/mpeg";

const INPUT_INDEX: usize = 0;

fn bitrate(kbps: u32) -> Result<Bitrate, EncodeError> {
    Ok(match kbps {
        64 => Bitrate::Kbps64,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => return Err(EncodeError::Unsupported(format!("{other} kbps"))),
    })
}

/// Samples per Layer III frame at `sample_rate`.
pub fn frame_samples(sample_rate: u32) -> u32 {
    if sample_rate >= 32_000 { 1152 } else { 576 }
}

const MPEG1_KBPS: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const MPEG2_KBPS: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// Byte length of the Layer III frame whose header starts `bytes`, if any.
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    let [b0, b1, b2, ..] = *bytes else {
        return None;
    };
    if b0 != 0xFF || b1 & 0xE0 != 0xE0 || (b1 >> 1) & 0x3 != 0x1 {
        return None;
    }
    let version = (b1 >> 3) & 0x3;
    let bitrate_index = (b2 >> 4) as usize;
    let rate_index = ((b2 >> 2) & 0x3) as usize;
    let padding = ((b2 >> 1) & 0x1) as usize;
    if bitrate_index == 0 || bitrate_index == 15 || rate_index == 3 {
        return None;
    }

    let (kbps, rates, coefficient) = match version {
        0b11 => (MPEG1_KBPS[bitrate_index], [44_100, 48_000, 32_000], 144_000),
        0b10 => (MPEG2_KBPS[bitrate_index], [22_050, 24_000, 16_000], 72_000),
        0b00 => (MPEG2_KBPS[bitrate_index], [11_025, 12_000, 8_000], 72_000),
        _ => return None,
    };
    let sample_rate: u32 = rates[rate_index];
    Some((coefficient * kbps / sample_rate) as usize + padding)
}

/// Split complete frames off the front of `pending`, skipping bytes that
/// are not part of a frame header. Incomplete trailing frames stay queued.
pub fn drain_frames(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut start = 0;
    while pending.len() - start >= 4 {
        match frame_len(&pending[start..]) {
            Some(len) if pending.len() - start >= len => {
                frames.push(pending[start..start + len].to_vec());
                start += len;
            }
            Some(_) => break,
            None => start += 1,
        }
    }
    pending.drain(..start);
    frames
}

/// MP3 encoder with the [`AudioCodec`] buffer protocol.
pub struct LameCodec {
    encoder: Option<Encoder>,
    format: TrackFormat,
    format_sent: bool,
    input_lent: bool,
    input_eos: bool,
    eos_sent: bool,
    pending: Vec<u8>,
    ready: VecDeque<Vec<u8>>,
    frames_out: u64,
    outstanding: Option<usize>,
    next_output_index: usize,
}

impl LameCodec {
    /// Mono encoder at `sample_rate` and a constant `bitrate_kbps`.
    pub fn new(sample_rate: u32, bitrate_kbps: u32) -> Result<Self, EncodeError> {
        let mut builder =
            Builder::new().ok_or_else(|| EncodeError::Codec("cannot allocate LAME".into()))?;
        builder
            .set_num_channels(1)
            .map_err(|e| EncodeError::Codec(format!("channels: {e:?}")))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| EncodeError::Unsupported(format!("sample rate {sample_rate}: {e:?}")))?;
        builder
            .set_brate(bitrate(bitrate_kbps)?)
            .map_err(|e| EncodeError::Codec(format!("bitrate: {e:?}")))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| EncodeError::Codec(format!("quality: {e:?}")))?;
        let encoder = builder
            .build()
            .map_err(|e| EncodeError::Codec(format!("LAME init: {e:?}")))?;

        Ok(Self {
            encoder: Some(encoder),
            format: TrackFormat {
                mime: MP3_MIME.to_string(),
                sample_rate,
                channels: 1,
                bitrate: bitrate_kbps * 1000,
                frame_samples: frame_samples(sample_rate),
                codec_specific: Vec::new(),
            },
            format_sent: false,
            input_lent: false,
            input_eos: false,
            eos_sent: false,
            pending: Vec::new(),
            ready: VecDeque::new(),
            frames_out: 0,
            outstanding: None,
            next_output_index: 0,
        })
    }

    fn encoder(&mut self) -> Result<&mut Encoder, EncodeError> {
        self.encoder
            .as_mut()
            .ok_or_else(|| EncodeError::Protocol("codec already released".into()))
    }

    fn encode_pcm(&mut self, samples: &[i16]) -> Result<(), EncodeError> {
        let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(samples.len()));
        self.encoder()?
            .encode_to_vec(MonoPcm(samples), &mut out)
            .map_err(|e| EncodeError::Codec(format!("encode: {e:?}")))?;
        self.pending.append(&mut out);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        // LAME needs at most 7200 bytes to flush
        let mut out = Vec::with_capacity(7200);
        self.encoder()?
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| EncodeError::Codec(format!("flush: {e:?}")))?;
        self.pending.append(&mut out);
        Ok(())
    }
}

impl AudioCodec for LameCodec {
    fn dequeue_input_buffer(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<InputBuffer>, EncodeError> {
        self.encoder()?;
        if self.input_lent || self.input_eos {
            return Ok(None);
        }
        self.input_lent = true;
        Ok(Some(InputBuffer {
            index: INPUT_INDEX,
            capacity: MAX_INPUT_BUFFER_BYTES,
        }))
    }

    fn queue_input_buffer(
        &mut self,
        buffer: InputBuffer,
        data: &[u8],
        _pts_us: i64,
        end_of_stream: bool,
    ) -> Result<(), EncodeError> {
        if !self.input_lent || buffer.index != INPUT_INDEX {
            return Err(EncodeError::Protocol(format!(
                "input buffer {} was not dequeued",
                buffer.index
            )));
        }
        if data.len() > buffer.capacity || data.len() % 2 != 0 {
            return Err(EncodeError::Protocol(format!(
                "{} bytes do not fit input buffer of {}",
                data.len(),
                buffer.capacity
            )));
        }
        self.input_lent = false;

        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        if !samples.is_empty() {
            self.encode_pcm(&samples)?;
        }
        if end_of_stream {
            self.flush()?;
            self.input_eos = true;
        }
        self.ready.extend(drain_frames(&mut self.pending));
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> Result<OutputEvent, EncodeError> {
        self.encoder()?;
        if !self.format_sent {
            self.format_sent = true;
            return Ok(OutputEvent::FormatChanged(self.format.clone()));
        }
        if self.outstanding.is_some() || self.eos_sent {
            return Ok(OutputEvent::TryAgainLater);
        }

        let data = match self.ready.pop_front() {
            Some(frame) => frame,
            None if self.input_eos => {
                // a trailing partial frame is not decodable
                if !self.pending.is_empty() {
                    tracing::debug!(bytes = self.pending.len(), "dropping partial mp3 frame");
                    self.pending.clear();
                }
                Vec::new()
            }
            None => return Ok(OutputEvent::TryAgainLater),
        };
        let end_of_stream = data.is_empty();
        let pts_us = (self.frames_out * self.format.frame_samples as u64 * 1_000_000
            / self.format.sample_rate as u64) as i64;
        if end_of_stream {
            self.eos_sent = true;
        } else {
            self.frames_out += 1;
        }

        let index = self.next_output_index;
        self.next_output_index += 1;
        self.outstanding = Some(index);
        Ok(OutputEvent::Buffer(OutputBuffer {
            index,
            data,
            pts_us,
            end_of_stream,
        }))
    }

    fn release_output_buffer(&mut self, index: usize) -> Result<(), EncodeError> {
        match self.outstanding {
            Some(lent) if lent == index => {
                self.outstanding = None;
                Ok(())
            }
            _ => Err(EncodeError::Protocol(format!(
                "output buffer {index} is not outstanding"
            ))),
        }
    }

    fn release(&mut self) {
        if self.encoder.take().is_some() {
            tracing::trace!(frames = self.frames_out, "mp3 encoder released");
        }
    }
}
