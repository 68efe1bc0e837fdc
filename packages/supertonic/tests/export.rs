//! Container output checked with independent readers.

use std::f32::consts::PI;
use std::io::Cursor;

use supertonic::export::pcm::quantize;
use supertonic::{AudioFormat, VoiceError, export_audio, save_audio};

fn tone(sample_rate: u32, secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * secs) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[test]
fn wav_export_reads_back_with_hound() {
    let waveform = tone(44_100, 0.1);
    let container = export_audio(&waveform, 44_100, AudioFormat::Wav).expect("wav");

    assert_eq!(container.mime_type(), "audio/wav");
    let reader = hound::WavReader::new(Cursor::new(container.bytes)).expect("valid RIFF");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let samples: Vec<i16> = reader
        .into_samples::<i16>()
        .collect::<Result<_, _>>()
        .expect("samples");
    assert_eq!(samples, quantize(&waveform));
}

#[test]
fn out_of_range_samples_are_clipped() {
    let container = export_audio(&[2.0, -2.0, f32::NAN], 8000, AudioFormat::Wav).expect("wav");
    let samples: Vec<i16> = hound::WavReader::new(Cursor::new(container.bytes))
        .expect("valid RIFF")
        .into_samples::<i16>()
        .collect::<Result<_, _>>()
        .expect("samples");
    assert_eq!(samples, vec![32767, -32768, 0]);
}

#[test]
fn saved_file_is_named_by_prefix_and_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let container = export_audio(&tone(16_000, 0.05), 16_000, AudioFormat::Wav).expect("wav");

    let path = save_audio(&container, dir.path(), "greeting").expect("saved");

    let name = path.file_name().and_then(|n| n.to_str()).expect("utf-8 name");
    let millis = name
        .strip_prefix("greeting_")
        .and_then(|rest| rest.strip_suffix(".wav"))
        .expect("prefix_millis.wav");
    assert!(millis.parse::<i64>().is_ok(), "{name}");

    let reader = hound::WavReader::open(&path).expect("readable");
    assert_eq!(reader.len(), 800);
    let entries = std::fs::read_dir(dir.path()).expect("list").count();
    assert_eq!(entries, 1, "no temporary file left behind");
}

#[test]
fn missing_directory_is_a_storage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let container = export_audio(&[0.0; 10], 8000, AudioFormat::Wav).expect("wav");

    let err = save_audio(&container, &dir.path().join("absent"), "x").unwrap_err();

    assert!(matches!(err, VoiceError::Storage(_)), "{err}");
}

#[cfg(feature = "mp3lame")]
mod m4a {
    use super::*;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn compressed_export_is_an_mp4_with_audio() {
        let waveform = tone(24_000, 0.5);
        let container = export_audio(&waveform, 24_000, AudioFormat::M4a).expect("m4a");

        assert_eq!(container.mime_type(), "audio/mp4");
        assert_eq!(container.extension(), "m4a");
        let bytes = &container.bytes;
        assert_eq!(&bytes[4..8], b"ftyp");
        let mdat = find(bytes, b"mdat").expect("mdat box");
        let moov = find(bytes, b"moov").expect("moov box");
        assert!(mdat < moov);
        assert!(find(bytes, b"mp4a").is_some());
        // The mdat payload holds the encoded frames.
        let mdat_size = u32::from_be_bytes([
            bytes[mdat - 4],
            bytes[mdat - 3],
            bytes[mdat - 2],
            bytes[mdat - 1],
        ]);
        assert!(mdat_size > 8 + 1000, "mdat is {mdat_size} bytes");
    }

    #[test]
    fn compressed_export_decodes_back_to_the_full_length() {
        use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
        use symphonia::core::errors::Error;
        use symphonia::core::formats::{FormatOptions, FormatReader};
        use symphonia::core::io::MediaSourceStream;
        use symphonia::default::formats::IsoMp4Reader;

        let waveform = tone(24_000, 0.5);
        let container = export_audio(&waveform, 24_000, AudioFormat::M4a).expect("m4a");

        let source =
            MediaSourceStream::new(Box::new(Cursor::new(container.bytes)), Default::default());
        let mut reader =
            IsoMp4Reader::try_new(source, &FormatOptions::default()).expect("mp4 demux");
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .expect("audio track");
        let track_id = track.id;
        assert_eq!(track.codec_params.sample_rate, Some(24_000));
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .expect("mp3 decoder");

        let (mut frames, mut errors) = (0usize, 0usize);
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => panic!("demux failed: {e}"),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    assert_eq!(decoded.spec().rate, 24_000);
                    frames += decoded.frames();
                }
                Err(Error::DecodeError(_)) => errors += 1,
                Err(e) => panic!("decode failed: {e}"),
            }
        }

        assert_eq!(errors, 0);
        // encoder delay and padding only ever add frames
        assert!(frames >= waveform.len(), "{frames} < {}", waveform.len());
    }

    #[test]
    fn compressed_export_saves_with_m4a_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let container = export_audio(&tone(24_000, 0.2), 24_000, AudioFormat::M4a).expect("m4a");

        let path = save_audio(&container, dir.path(), "supertonic").expect("saved");

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("m4a"));
        assert_eq!(std::fs::read(&path).expect("read"), container.bytes);
    }
}
