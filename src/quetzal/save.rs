//! Builds a Quetzal (`IFZS`) save file from the current engine state.

use crate::quetzal::chunks::{IfhdChunk, MemoryChunk, StksChunk};
use crate::quetzal::iff::IffFile;
use crate::vm::Engine;

pub fn build_save_file(engine: &Engine, original_dynamic: &[u8]) -> Vec<u8> {
    let mut iff = IffFile::new(*b"IFZS");
    iff.add_chunk(*b"IFhd", IfhdChunk::from_engine(engine).to_bytes());
    match MemoryChunk::from_engine(engine, original_dynamic) {
        MemoryChunk::Compressed(data) => iff.add_chunk(*b"CMem", data),
        MemoryChunk::Uncompressed(data) => iff.add_chunk(*b"UMem", data),
    }
    iff.add_chunk(*b"Stks", StksChunk::from_engine(engine).data);
    iff.add_chunk(*b"IntD", b"RUST".to_vec());
    iff.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_story() -> Vec<u8> {
        let mut bytes = vec![0u8; 0x100];
        bytes[0] = 3;
        bytes[0x0E..0x10].copy_from_slice(&0x80u16.to_be_bytes());
        bytes[0x06..0x08].copy_from_slice(&0x90u16.to_be_bytes());
        bytes
    }

    #[test]
    fn builds_a_parseable_iff_form() {
        let bytes = minimal_story();
        let original_dynamic = bytes[..0x80].to_vec();
        let engine = Engine::new(bytes).unwrap();
        let save_bytes = build_save_file(&engine, &original_dynamic);
        let parsed = crate::quetzal::iff::IffFile::parse(&save_bytes).unwrap();
        assert_eq!(parsed.form_type, *b"IFZS");
        assert!(parsed.find_chunk(b"IFhd").is_some());
        assert!(parsed.find_chunk(b"Stks").is_some());
    }
}
