//! Joins per-chunk waveforms with fixed silence gaps.

/// Concatenate `chunks` in order with `silence_samples` zeros strictly
/// between consecutive chunks.
pub fn assemble(chunks: &[Vec<f32>], silence_samples: usize) -> Vec<f32> {
    let gaps = chunks.len().saturating_sub(1);
    let total = chunks.iter().map(Vec::len).sum::<usize>() + gaps * silence_samples;

    let mut out = Vec::with_capacity(total);
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.resize(out.len() + silence_samples, 0.0);
        }
        out.extend_from_slice(chunk);
    }
    out
}
