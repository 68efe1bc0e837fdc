//! Pollable audio encoder interface.
//!
//! Buffers are exchanged by index with bounded waits, so a driver can poll
//! input and output sides from one loop without callbacks.

use std::time::Duration;

use crate::error::EncodeError;

/// Per-attempt wait used by the export loop.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);

/// Largest PCM payload handed to the encoder in one input buffer.
pub const MAX_INPUT_BUFFER_BYTES: usize = 16384;

/// Stream format announced by the encoder before its first data buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub mime: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per second.
    pub bitrate: u32,
    /// PCM samples represented by each encoded access unit.
    pub frame_samples: u32,
    /// Decoder-specific configuration, empty when the codec needs none.
    pub codec_specific: Vec<u8>,
}

/// An empty input slot lent out by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBuffer {
    pub index: usize,
    pub capacity: usize,
}

/// An encoded access unit lent out by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    pub index: usize,
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub end_of_stream: bool,
}

/// Result of one bounded wait on the output side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    TryAgainLater,
    FormatChanged(TrackFormat),
    Buffer(OutputBuffer),
}

pub trait AudioCodec {
    /// Wait up to `timeout` for a free input buffer.
    fn dequeue_input_buffer(&mut self, timeout: Duration)
    -> Result<Option<InputBuffer>, EncodeError>;

    /// Submit PCM bytes (little-endian `i16`) in a previously dequeued buffer.
    fn queue_input_buffer(
        &mut self,
        buffer: InputBuffer,
        data: &[u8],
        pts_us: i64,
        end_of_stream: bool,
    ) -> Result<(), EncodeError>;

    /// Wait up to `timeout` for a format change or an encoded buffer.
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputEvent, EncodeError>;

    /// Hand an output buffer back to the codec.
    fn release_output_buffer(&mut self, index: usize) -> Result<(), EncodeError>;

    /// Free all codec resources.
    fn release(&mut self);
}
