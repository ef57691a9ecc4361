//! Quetzal `CMem` differential memory compression: an XOR of current vs.
//! original dynamic memory, then run-length-encoded over its zero bytes.

use crate::error::{ZError, ZResult};

/// Encodes `current` against `original` (same length) as a `CMem` chunk body.
/// A run of N consecutive zero bytes in the XOR difference becomes the
/// two-byte pair `(0x00, N-1)`; runs longer than 256 are split across
/// multiple pairs. Non-zero difference bytes are emitted literally.
pub fn compress(current: &[u8], original: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut zero_run = 0usize;
    let len = current.len().min(original.len());
    for i in 0..len {
        let diff = current[i] ^ original[i];
        if diff == 0 {
            zero_run += 1;
            if zero_run == 256 {
                out.push(0);
                out.push(255);
                zero_run = 0;
            }
        } else {
            if zero_run > 0 {
                out.push(0);
                out.push((zero_run - 1) as u8);
                zero_run = 0;
            }
            out.push(diff);
        }
    }
    if zero_run > 0 {
        out.push(0);
        out.push((zero_run - 1) as u8);
    }
    out
}

/// Decodes a `CMem` chunk body back into full dynamic memory, XORing against
/// `original`. If the compressed stream ends before `original`'s length is
/// reached, the remaining bytes are taken verbatim from `original` (the
/// Standard permits a save file to omit a trailing run of unchanged bytes).
pub fn decompress(compressed: &[u8], original: &[u8]) -> ZResult<Vec<u8>> {
    let mut out = Vec::with_capacity(original.len());
    let mut i = 0;
    while i < compressed.len() {
        let b = compressed[i];
        i += 1;
        if b == 0 {
            if i >= compressed.len() {
                return Err(ZError::malformed("CMem chunk ends mid zero-run"));
            }
            let run_len = compressed[i] as usize + 1;
            i += 1;
            for _ in 0..run_len {
                if out.len() >= original.len() {
                    return Err(ZError::malformed("CMem chunk decodes past original length"));
                }
                out.push(original[out.len()]);
            }
        } else {
            if out.len() >= original.len() {
                return Err(ZError::malformed("CMem chunk decodes past original length"));
            }
            out.push(b ^ original[out.len()]);
        }
    }
    while out.len() < original.len() {
        out.push(original[out.len()]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_decompress_round_trip() {
        let original = vec![0u8; 300];
        let mut current = original.clone();
        current[10] = 42;
        current[280] = 7;
        let compressed = compress(&current, &original);
        let restored = decompress(&compressed, &original).unwrap();
        assert_eq!(restored, current);
    }

    #[test]
    fn long_zero_run_spans_multiple_pairs() {
        let original = vec![0u8; 1000];
        let current = original.clone();
        let compressed = compress(&current, &original);
        assert!(compressed.len() >= 8); // 1000 zero bytes needs >= 4 run-pairs
        let restored = decompress(&compressed, &original).unwrap();
        assert_eq!(restored, current);
    }
}
