//! Encode/mux loop driven against scripted codec and muxer fakes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use supertonic::EncodeError;
use supertonic::export::codec::{InputBuffer, OutputBuffer};
use supertonic::export::{
    AudioCodec, ContainerMuxer, EncodeOptions, OutputEvent, TrackFormat, encode_with,
};

const SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Normal,
    DataBeforeFormat,
    FormatTwice,
    Silent,
}

#[derive(Debug, Default)]
struct Log {
    input_sizes: Vec<usize>,
    input_pts: Vec<i64>,
    eos_queued: usize,
    outputs_released: usize,
    codec_releases: usize,
    tracks: Vec<TrackFormat>,
    muxer_starts: usize,
    muxer_stops: usize,
    muxer_releases: usize,
    samples: Vec<(Vec<u8>, i64)>,
}

type Shared = Arc<Mutex<Log>>;

fn format() -> TrackFormat {
    TrackFormat {
        mime: "audio/fake".into(),
        sample_rate: SAMPLE_RATE,
        channels: 1,
        bitrate: 128_000,
        frame_samples: 1024,
        codec_specific: Vec::new(),
    }
}

struct FakeCodec {
    script: Script,
    capacity: usize,
    log: Shared,
    pending: VecDeque<OutputBuffer>,
    announced: bool,
    reannounced: bool,
    input_closed: bool,
}

impl FakeCodec {
    fn new(script: Script, capacity: usize, log: &Shared) -> Self {
        Self {
            script,
            capacity,
            log: Arc::clone(log),
            pending: VecDeque::new(),
            announced: false,
            reannounced: false,
            input_closed: false,
        }
    }
}

impl AudioCodec for FakeCodec {
    fn dequeue_input_buffer(&mut self, _: Duration) -> Result<Option<InputBuffer>, EncodeError> {
        if self.script == Script::Silent || self.input_closed {
            return Ok(None);
        }
        Ok(Some(InputBuffer {
            index: 0,
            capacity: self.capacity,
        }))
    }

    fn queue_input_buffer(
        &mut self,
        _: InputBuffer,
        data: &[u8],
        pts_us: i64,
        end_of_stream: bool,
    ) -> Result<(), EncodeError> {
        let mut log = self.log.lock().expect("log");
        log.input_sizes.push(data.len());
        log.input_pts.push(pts_us);
        if end_of_stream {
            log.eos_queued += 1;
            self.input_closed = true;
        }
        self.pending.push_back(OutputBuffer {
            index: 1,
            data: data.iter().take(4).copied().collect(),
            pts_us,
            end_of_stream,
        });
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _: Duration) -> Result<OutputEvent, EncodeError> {
        match self.script {
            Script::Silent => return Ok(OutputEvent::TryAgainLater),
            Script::DataBeforeFormat if !self.announced => {
                self.announced = true;
                return Ok(OutputEvent::Buffer(OutputBuffer {
                    index: 7,
                    data: vec![1, 2, 3],
                    pts_us: 0,
                    end_of_stream: false,
                }));
            }
            _ => {}
        }
        if !self.announced {
            self.announced = true;
            return Ok(OutputEvent::FormatChanged(format()));
        }
        if self.script == Script::FormatTwice && !self.reannounced && !self.pending.is_empty() {
            self.reannounced = true;
            return Ok(OutputEvent::FormatChanged(format()));
        }
        Ok(self
            .pending
            .pop_front()
            .map_or(OutputEvent::TryAgainLater, OutputEvent::Buffer))
    }

    fn release_output_buffer(&mut self, _: usize) -> Result<(), EncodeError> {
        self.log.lock().expect("log").outputs_released += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.log.lock().expect("log").codec_releases += 1;
    }
}

struct FakeMuxer {
    log: Shared,
    fail_writes: bool,
}

impl FakeMuxer {
    fn new(log: &Shared) -> Self {
        Self {
            log: Arc::clone(log),
            fail_writes: false,
        }
    }
}

impl ContainerMuxer for FakeMuxer {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, EncodeError> {
        let mut log = self.log.lock().expect("log");
        log.tracks.push(format.clone());
        Ok(log.tracks.len() - 1)
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        self.log.lock().expect("log").muxer_starts += 1;
        Ok(())
    }

    fn write_sample(&mut self, _: usize, data: &[u8], pts_us: i64) -> Result<(), EncodeError> {
        if self.fail_writes {
            return Err(EncodeError::Muxer("disk full".into()));
        }
        self.log.lock().expect("log").samples.push((data.to_vec(), pts_us));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncodeError> {
        self.log.lock().expect("log").muxer_stops += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, EncodeError> {
        let log = self.log.lock().expect("log");
        Ok(log.samples.iter().flat_map(|(d, _)| d.clone()).collect())
    }

    fn release(&mut self) {
        self.log.lock().expect("log").muxer_releases += 1;
    }
}

fn fast() -> EncodeOptions {
    EncodeOptions {
        timeout: Duration::ZERO,
        max_idle_polls: 5,
    }
}

fn assert_released_once(log: &Shared) {
    let log = log.lock().expect("log");
    assert_eq!(log.codec_releases, 1, "codec releases");
    assert_eq!(log.muxer_releases, 1, "muxer releases");
}

#[test]
fn pcm_is_fed_in_capped_buffers_then_end_of_stream() {
    let log = Shared::default();
    let waveform = vec![0.25_f32; 20_000];

    let bytes = encode_with(
        FakeCodec::new(Script::Normal, 65_536, &log),
        FakeMuxer::new(&log),
        &waveform,
        SAMPLE_RATE,
        fast(),
    )
    .expect("encoded");

    let l = log.lock().expect("log");
    assert_eq!(l.input_sizes, vec![16_384, 16_384, 7_232, 0]);
    assert_eq!(l.input_pts, vec![0, 512_000, 1_024_000, 1_250_000]);
    assert_eq!(l.eos_queued, 1);
    assert_eq!(l.tracks, vec![format()]);
    assert_eq!((l.muxer_starts, l.muxer_stops), (1, 1));
    assert_eq!(l.samples.len(), 3);
    assert_eq!(l.outputs_released, 4);
    assert_eq!(bytes.len(), 12);
    drop(l);
    assert_released_once(&log);
}

#[test]
fn odd_capacity_never_splits_a_sample() {
    let log = Shared::default();

    encode_with(
        FakeCodec::new(Script::Normal, 4097, &log),
        FakeMuxer::new(&log),
        &vec![0.0_f32; 5000],
        SAMPLE_RATE,
        fast(),
    )
    .expect("encoded");

    let l = log.lock().expect("log");
    assert_eq!(l.input_sizes, vec![4096, 4096, 1808, 0]);
    assert!(l.input_sizes.iter().all(|n| n % 2 == 0));
}

#[test]
fn empty_waveform_still_produces_a_container() {
    let log = Shared::default();

    let bytes = encode_with(
        FakeCodec::new(Script::Normal, 1024, &log),
        FakeMuxer::new(&log),
        &[],
        SAMPLE_RATE,
        fast(),
    )
    .expect("encoded");

    assert!(bytes.is_empty());
    let l = log.lock().expect("log");
    assert_eq!(l.input_sizes, vec![0]);
    assert_eq!((l.muxer_starts, l.muxer_stops), (1, 1));
}

#[test]
fn data_before_format_is_a_protocol_error() {
    let log = Shared::default();

    let err = encode_with(
        FakeCodec::new(Script::DataBeforeFormat, 1024, &log),
        FakeMuxer::new(&log),
        &[0.1; 100],
        SAMPLE_RATE,
        fast(),
    )
    .unwrap_err();

    assert!(matches!(err, EncodeError::Protocol(_)), "{err}");
    assert_released_once(&log);
    let l = log.lock().expect("log");
    assert_eq!(l.muxer_starts, 0);
    assert_eq!(l.muxer_stops, 0, "never-started muxer must not be stopped");
}

#[test]
fn second_format_change_stops_the_started_muxer() {
    let log = Shared::default();

    let err = encode_with(
        FakeCodec::new(Script::FormatTwice, 1024, &log),
        FakeMuxer::new(&log),
        &[0.1; 4000],
        SAMPLE_RATE,
        fast(),
    )
    .unwrap_err();

    assert!(matches!(err, EncodeError::Protocol(_)), "{err}");
    assert_released_once(&log);
    let l = log.lock().expect("log");
    assert_eq!((l.muxer_starts, l.muxer_stops), (1, 1));
}

#[test]
fn silent_codec_stalls_after_idle_polls() {
    let log = Shared::default();

    let err = encode_with(
        FakeCodec::new(Script::Silent, 1024, &log),
        FakeMuxer::new(&log),
        &[0.1; 100],
        SAMPLE_RATE,
        fast(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        EncodeError::Stalled {
            attempts: 5,
            timeout: Duration::ZERO
        }
    );
    assert_released_once(&log);
}

#[test]
fn muxer_failure_aborts_and_releases() {
    let log = Shared::default();
    let muxer = FakeMuxer {
        fail_writes: true,
        ..FakeMuxer::new(&log)
    };

    let err = encode_with(
        FakeCodec::new(Script::Normal, 1024, &log),
        muxer,
        &[0.1; 100],
        SAMPLE_RATE,
        fast(),
    )
    .unwrap_err();

    assert_eq!(err, EncodeError::Muxer("disk full".into()));
    assert_released_once(&log);
    assert_eq!(log.lock().expect("log").muxer_stops, 1);
}

#[test]
fn zero_sample_rate_is_rejected_and_still_releases() {
    let log = Shared::default();

    let err = encode_with(
        FakeCodec::new(Script::Normal, 1024, &log),
        FakeMuxer::new(&log),
        &[0.1; 100],
        0,
        fast(),
    )
    .unwrap_err();

    assert!(matches!(err, EncodeError::Unsupported(_)));
    assert_released_once(&log);
}
