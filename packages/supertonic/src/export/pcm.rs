//! Float → 16-bit PCM quantization shared by every export format.

use byteorder::{LittleEndian, WriteBytesExt};

/// Scale by 32767, round, clamp to the `i16` range. NaN becomes silence.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

pub fn quantize(waveform: &[f32]) -> Vec<i16> {
    waveform.iter().copied().map(quantize_sample).collect()
}

/// Little-endian byte image of `samples`.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        // writes into a Vec never fail
        let _ = bytes.write_i16::<LittleEndian>(s);
    }
    bytes
}
