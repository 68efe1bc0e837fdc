//! RIFF/WAVE writer: mono, 16-bit PCM, canonical 44-byte header.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use super::pcm;
use crate::error::EncodeError;

pub const HEADER_LEN: usize = 44;

/// `(RIFF chunk size, data chunk size)` for `samples` 16-bit samples.
///
/// Both fields are 32-bit; longer waveforms cannot be described.
pub fn chunk_sizes(samples: usize) -> Result<(u32, u32), EncodeError> {
    let too_long = || EncodeError::Unsupported(format!("{samples} samples do not fit a WAV file"));
    let data_size = samples
        .checked_mul(2)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(too_long)?;
    let riff_size = data_size.checked_add(36).ok_or_else(too_long)?;
    Ok((riff_size, data_size))
}

/// Write `waveform` (float, nominally -1.0‥+1.0) to `w` as a 16-bit mono WAV.
pub fn write_wav<W: Write>(
    mut w: W,
    waveform: &[f32],
    sample_rate_hz: u32,
) -> Result<(), EncodeError> {
    let (riff_size, data_size) = chunk_sizes(waveform.len())?;
    let byte_rate = sample_rate_hz
        .checked_mul(2)
        .ok_or_else(|| EncodeError::Unsupported(format!("sample rate {sample_rate_hz} Hz")))?;

    // RIFF header ----------------------------------------------------------
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(riff_size)?;
    w.write_all(b"WAVE")?;

    // fmt  sub-chunk -------------------------------------------------------
    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?; // PCM header size
    w.write_u16::<LittleEndian>(1)?; // PCM = 1
    w.write_u16::<LittleEndian>(1)?; // mono
    w.write_u32::<LittleEndian>(sample_rate_hz)?;
    w.write_u32::<LittleEndian>(byte_rate)?;
    w.write_u16::<LittleEndian>(2)?; // block align
    w.write_u16::<LittleEndian>(16)?; // bits per sample

    // data sub-chunk -------------------------------------------------------
    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_size)?;
    for &s in waveform {
        w.write_i16::<LittleEndian>(pcm::quantize_sample(s))?;
    }
    w.flush()?;
    Ok(())
}

/// Encode `waveform` as an in-memory WAV file.
pub fn encode_wav(waveform: &[f32], sample_rate_hz: u32) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + waveform.len() * 2);
    write_wav(&mut bytes, waveform, sample_rate_hz)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() -> anyhow::Result<()> {
        let bytes = encode_wav(&[0.0, 0.5, -0.5], 44100)?;
        assert_eq!(bytes.len(), HEADER_LEN + 6);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 36 + 6);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]), 44100);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 6);
        assert_eq!(i16::from_le_bytes([bytes[46], bytes[47]]), 16384);
        Ok(())
    }

    #[test]
    fn empty_waveform_is_header_only() -> anyhow::Result<()> {
        let bytes = encode_wav(&[], 24000)?;
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 36);
        Ok(())
    }

    #[test]
    fn sizes_past_the_32_bit_fields_are_rejected() {
        // largest data chunk whose RIFF size still fits
        let max_samples = (u32::MAX as usize - 36) / 2;
        assert_eq!(chunk_sizes(max_samples), Ok((u32::MAX - 1, u32::MAX - 37)));
        assert!(matches!(chunk_sizes(max_samples + 1), Err(EncodeError::Unsupported(_))));
        assert!(matches!(chunk_sizes(usize::MAX / 2 + 1), Err(EncodeError::Unsupported(_))));
    }

    #[test]
    fn unrepresentable_byte_rate_is_rejected() {
        let err = encode_wav(&[0.0], u32::MAX).unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported(_)));
    }
}
