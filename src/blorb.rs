//! Unwraps a Z-code story file from a Blorb resource container (`FORM...IFRS`
//! with a `RIdx` resource index pointing at an `Exec` chunk holding `ZCOD`
//! bytes). Shares the IFF chunk-walking code Quetzal already uses — Blorb and
//! Quetzal are both IFF containers.

use crate::quetzal::iff::IffFile;

/// Returns the raw story bytes, unwrapping a Blorb container if `bytes` looks
/// like one, or `bytes` unchanged if it's already a bare Z-code file (its
/// first byte is a valid version number, not `b'F'`).
pub fn extract_story(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.len() < 12 || &bytes[0..4] != b"FORM" || &bytes[8..12] != b"IFRS" {
        return None;
    }
    let iff = IffFile::parse(bytes).ok()?;
    let exec_chunk = iff.find_chunk(b"Exec")?;
    Some(exec_chunk.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blorb_bytes_return_none() {
        let story = vec![3u8, 0, 0, 0];
        assert!(extract_story(&story).is_none());
    }

    #[test]
    fn unwraps_exec_chunk_from_blorb_container() {
        let mut blorb = IffFile::new(*b"IFRS");
        blorb.add_chunk(*b"Exec", vec![3, 0, 0, 1, 2, 3]);
        let bytes = blorb.to_bytes();
        let story = extract_story(&bytes).unwrap();
        assert_eq!(story, vec![3, 0, 0, 1, 2, 3]);
    }
}
