//! Minimal ISO-BMFF writer for a single audio track.
//!
//! Layout is `ftyp`, `mdat`, `moov`. All samples live in one chunk and are
//! assumed to have the same duration (`TrackFormat::frame_samples`).

use byteorder::{BigEndian, WriteBytesExt};

use super::codec::TrackFormat;
use super::muxer::ContainerMuxer;
use crate::error::EncodeError;

/// MPEG-4 object type indication for MPEG-1 audio (MP3).
pub const OBJECT_TYPE_MP3: u8 = 0x6B;
/// MPEG-4 object type indication for AAC.
pub const OBJECT_TYPE_AAC: u8 = 0x40;

const MOVIE_TIMESCALE: u32 = 1000;
const TRACK_ID: u32 = 1;
// ISO-639-2 "und"
const LANGUAGE_UND: u16 = 0x55C4;
const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

type Bytes = Vec<u8>;

fn object_type(mime: &str) -> Option<u8> {
    match mime {
        "audio/mpeg" => Some(OBJECT_TYPE_MP3),
        "audio/mp4a-latm" | "audio/aac" => Some(OBJECT_TYPE_AAC),
        _ => None,
    }
}

fn boxed(kind: &[u8; 4], body: &[u8]) -> Result<Bytes, EncodeError> {
    let size = u32::try_from(body.len() + 8)
        .map_err(|_| EncodeError::Unsupported("box larger than 4 GiB".into()))?;
    let mut out = Vec::with_capacity(body.len() + 8);
    out.write_u32::<BigEndian>(size)?;
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    Ok(out)
}

fn full_box(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Result<Bytes, EncodeError> {
    let mut inner = Vec::with_capacity(body.len() + 4);
    inner.write_u32::<BigEndian>((version as u32) << 24 | (flags & 0x00FF_FFFF))?;
    inner.extend_from_slice(body);
    boxed(kind, &inner)
}

fn descriptor(tag: u8, body: &[u8]) -> Result<Bytes, EncodeError> {
    if body.len() > 0x7F {
        return Err(EncodeError::Unsupported("descriptor too large".into()));
    }
    let mut out = vec![tag, body.len() as u8];
    out.extend_from_slice(body);
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Started,
    Stopped,
    Released,
}

/// In-memory `.m4a` muxer.
#[derive(Debug)]
pub struct Mp4Muxer {
    state: State,
    format: Option<TrackFormat>,
    object_type: u8,
    data: Bytes,
    sizes: Vec<u32>,
    last_pts_us: Option<i64>,
}

impl Default for Mp4Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp4Muxer {
    pub fn new() -> Self {
        Self {
            state: State::Configuring,
            format: None,
            object_type: 0,
            data: Vec::new(),
            sizes: Vec::new(),
            last_pts_us: None,
        }
    }

    fn format(&self) -> Result<&TrackFormat, EncodeError> {
        self.format
            .as_ref()
            .ok_or_else(|| EncodeError::Muxer("no track added".into()))
    }

    fn ftyp() -> Result<Bytes, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(b"M4A ");
        body.write_u32::<BigEndian>(0)?;
        for brand in [b"M4A ", b"mp42", b"isom"] {
            body.extend_from_slice(brand);
        }
        boxed(b"ftyp", &body)
    }

    fn esds(&self, format: &TrackFormat) -> Result<Bytes, EncodeError> {
        let mut config = vec![self.object_type, 0x15];
        let max_sample = self.sizes.iter().copied().max().unwrap_or(0);
        config.write_u24::<BigEndian>(max_sample.min(0x00FF_FFFF))?;
        config.write_u32::<BigEndian>(format.bitrate)?;
        config.write_u32::<BigEndian>(format.bitrate)?;
        if !format.codec_specific.is_empty() {
            config.extend(descriptor(0x05, &format.codec_specific)?);
        }

        let mut es = Vec::new();
        es.write_u16::<BigEndian>(0)?; // ES_ID
        es.push(0); // flags
        es.extend(descriptor(0x04, &config)?);
        es.extend(descriptor(0x06, &[0x02])?);
        full_box(b"esds", 0, 0, &descriptor(0x03, &es)?)
    }

    fn stsd(&self, format: &TrackFormat) -> Result<Bytes, EncodeError> {
        let sample_rate = u16::try_from(format.sample_rate).map_err(|_| {
            EncodeError::Unsupported(format!("sample rate {} above 65535", format.sample_rate))
        })?;
        let mut entry = vec![0u8; 6]; // reserved
        entry.write_u16::<BigEndian>(1)?; // data reference index
        entry.extend_from_slice(&[0u8; 8]); // version, revision, vendor
        entry.write_u16::<BigEndian>(format.channels)?;
        entry.write_u16::<BigEndian>(16)?; // sample size
        entry.write_u16::<BigEndian>(0)?; // compression id
        entry.write_u16::<BigEndian>(0)?; // packet size
        entry.write_u32::<BigEndian>((sample_rate as u32) << 16)?;
        entry.extend(self.esds(format)?);

        let mut body = Vec::new();
        body.write_u32::<BigEndian>(1)?;
        body.extend(boxed(b"mp4a", &entry)?);
        full_box(b"stsd", 0, 0, &body)
    }

    fn stbl(&self, format: &TrackFormat, chunk_offset: u32) -> Result<Bytes, EncodeError> {
        let count = self.sizes.len() as u32;

        let mut stts = Vec::new();
        if count == 0 {
            stts.write_u32::<BigEndian>(0)?;
        } else {
            stts.write_u32::<BigEndian>(1)?;
            stts.write_u32::<BigEndian>(count)?;
            stts.write_u32::<BigEndian>(format.frame_samples)?;
        }

        let mut stsc = Vec::new();
        if count == 0 {
            stsc.write_u32::<BigEndian>(0)?;
        } else {
            stsc.write_u32::<BigEndian>(1)?;
            stsc.write_u32::<BigEndian>(1)?; // first chunk
            stsc.write_u32::<BigEndian>(count)?; // samples per chunk
            stsc.write_u32::<BigEndian>(1)?; // sample description index
        }

        let mut stsz = Vec::new();
        stsz.write_u32::<BigEndian>(0)?; // sizes vary
        stsz.write_u32::<BigEndian>(count)?;
        for &size in &self.sizes {
            stsz.write_u32::<BigEndian>(size)?;
        }

        let mut stco = Vec::new();
        stco.write_u32::<BigEndian>(if count == 0 { 0 } else { 1 })?;
        if count > 0 {
            stco.write_u32::<BigEndian>(chunk_offset)?;
        }

        let mut body = self.stsd(format)?;
        body.extend(full_box(b"stts", 0, 0, &stts)?);
        body.extend(full_box(b"stsc", 0, 0, &stsc)?);
        body.extend(full_box(b"stsz", 0, 0, &stsz)?);
        body.extend(full_box(b"stco", 0, 0, &stco)?);
        boxed(b"stbl", &body)
    }

    fn moov(&self, chunk_offset: u32) -> Result<Bytes, EncodeError> {
        let format = self.format()?;
        let media_duration = self.sizes.len() as u64 * format.frame_samples as u64;
        let media_duration = u32::try_from(media_duration)
            .map_err(|_| EncodeError::Unsupported("track too long".into()))?;
        let movie_duration =
            (media_duration as u64 * MOVIE_TIMESCALE as u64 / format.sample_rate as u64) as u32;

        let mut mvhd = Vec::new();
        mvhd.write_u32::<BigEndian>(0)?; // creation time
        mvhd.write_u32::<BigEndian>(0)?; // modification time
        mvhd.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
        mvhd.write_u32::<BigEndian>(movie_duration)?;
        mvhd.write_u32::<BigEndian>(0x0001_0000)?; // rate 1.0
        mvhd.write_u16::<BigEndian>(0x0100)?; // volume 1.0
        mvhd.extend_from_slice(&[0u8; 10]);
        for v in UNITY_MATRIX {
            mvhd.write_u32::<BigEndian>(v)?;
        }
        mvhd.extend_from_slice(&[0u8; 24]); // pre-defined
        mvhd.write_u32::<BigEndian>(TRACK_ID + 1)?; // next track id

        let mut tkhd = Vec::new();
        tkhd.write_u32::<BigEndian>(0)?;
        tkhd.write_u32::<BigEndian>(0)?;
        tkhd.write_u32::<BigEndian>(TRACK_ID)?;
        tkhd.write_u32::<BigEndian>(0)?;
        tkhd.write_u32::<BigEndian>(movie_duration)?;
        tkhd.extend_from_slice(&[0u8; 8]);
        tkhd.write_u16::<BigEndian>(0)?; // layer
        tkhd.write_u16::<BigEndian>(0)?; // alternate group
        tkhd.write_u16::<BigEndian>(0x0100)?; // volume
        tkhd.write_u16::<BigEndian>(0)?;
        for v in UNITY_MATRIX {
            tkhd.write_u32::<BigEndian>(v)?;
        }
        tkhd.write_u32::<BigEndian>(0)?; // width
        tkhd.write_u32::<BigEndian>(0)?; // height

        let mut mdhd = Vec::new();
        mdhd.write_u32::<BigEndian>(0)?;
        mdhd.write_u32::<BigEndian>(0)?;
        mdhd.write_u32::<BigEndian>(format.sample_rate)?;
        mdhd.write_u32::<BigEndian>(media_duration)?;
        mdhd.write_u16::<BigEndian>(LANGUAGE_UND)?;
        mdhd.write_u16::<BigEndian>(0)?;

        let mut hdlr = Vec::new();
        hdlr.write_u32::<BigEndian>(0)?;
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.extend_from_slice(b"SoundHandler\0");

        let mut smhd = Vec::new();
        smhd.write_u16::<BigEndian>(0)?; // balance
        smhd.write_u16::<BigEndian>(0)?;

        let mut dref = Vec::new();
        dref.write_u32::<BigEndian>(1)?;
        dref.extend(full_box(b"url ", 0, 1, &[])?);
        let dinf = boxed(b"dinf", &full_box(b"dref", 0, 0, &dref)?)?;

        let mut minf = full_box(b"smhd", 0, 0, &smhd)?;
        minf.extend(dinf);
        minf.extend(self.stbl(format, chunk_offset)?);

        let mut mdia = full_box(b"mdhd", 0, 0, &mdhd)?;
        mdia.extend(full_box(b"hdlr", 0, 0, &hdlr)?);
        mdia.extend(boxed(b"minf", &minf)?);

        let mut trak = full_box(b"tkhd", 0, 0x3, &tkhd)?;
        trak.extend(boxed(b"mdia", &mdia)?);

        let mut moov = full_box(b"mvhd", 0, 0, &mvhd)?;
        moov.extend(boxed(b"trak", &trak)?);
        boxed(b"moov", &moov)
    }
}

impl ContainerMuxer for Mp4Muxer {
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, EncodeError> {
        if self.state != State::Configuring {
            return Err(EncodeError::Muxer(format!("add_track in state {:?}", self.state)));
        }
        if self.format.is_some() {
            return Err(EncodeError::Unsupported("only one track per file".into()));
        }
        self.object_type = object_type(&format.mime)
            .ok_or_else(|| EncodeError::Unsupported(format!("mime {}", format.mime)))?;
        if format.sample_rate == 0 || format.sample_rate > u16::MAX as u32 {
            return Err(EncodeError::Unsupported(format!(
                "sample rate {}",
                format.sample_rate
            )));
        }
        self.format = Some(format.clone());
        Ok(0)
    }

    fn start(&mut self) -> Result<(), EncodeError> {
        if self.state != State::Configuring {
            return Err(EncodeError::Muxer(format!("start in state {:?}", self.state)));
        }
        self.format()?;
        self.state = State::Started;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, data: &[u8], pts_us: i64) -> Result<(), EncodeError> {
        if self.state != State::Started {
            return Err(EncodeError::Muxer(format!("write in state {:?}", self.state)));
        }
        if track != 0 {
            return Err(EncodeError::Muxer(format!("unknown track {track}")));
        }
        if self.last_pts_us.is_some_and(|last| pts_us < last) {
            return Err(EncodeError::Muxer(format!("timestamp {pts_us} goes backwards")));
        }
        let size = u32::try_from(data.len())
            .map_err(|_| EncodeError::Muxer("sample too large".into()))?;
        self.last_pts_us = Some(pts_us);
        self.sizes.push(size);
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncodeError> {
        if self.state != State::Started {
            return Err(EncodeError::Muxer(format!("stop in state {:?}", self.state)));
        }
        self.state = State::Stopped;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, EncodeError> {
        if self.state != State::Stopped {
            return Err(EncodeError::Muxer(format!("finish in state {:?}", self.state)));
        }
        let ftyp = Self::ftyp()?;
        let mdat_header = 8;
        let chunk_offset = u32::try_from(ftyp.len() + mdat_header)
            .map_err(|_| EncodeError::Unsupported("header too large".into()))?;
        let mdat = boxed(b"mdat", &self.data)?;
        let moov = self.moov(chunk_offset)?;

        let mut out = Vec::with_capacity(ftyp.len() + mdat.len() + moov.len());
        out.extend(ftyp);
        out.extend(mdat);
        out.extend(moov);
        Ok(out)
    }

    fn release(&mut self) {
        self.state = State::Released;
        self.data = Vec::new();
        self.sizes = Vec::new();
    }
}
