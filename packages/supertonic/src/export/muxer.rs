//! Container muxer interface.

use super::codec::TrackFormat;
use crate::error::EncodeError;

pub trait ContainerMuxer {
    /// Register a track; only legal before [`ContainerMuxer::start`].
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, EncodeError>;

    fn start(&mut self) -> Result<(), EncodeError>;

    /// Append one encoded access unit to `track`.
    fn write_sample(&mut self, track: usize, data: &[u8], pts_us: i64) -> Result<(), EncodeError>;

    fn stop(&mut self) -> Result<(), EncodeError>;

    /// The finished container. Only valid after [`ContainerMuxer::stop`].
    fn finish(&mut self) -> Result<Vec<u8>, EncodeError>;

    /// Free all muxer resources.
    fn release(&mut self);
}
