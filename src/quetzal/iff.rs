//! Minimal IFF container reader/writer shared by Quetzal save files and Blorb
//! story resources — both formats are `FORM <size> <type>` followed by
//! chunks of `<type><BE u32 size><data>`, padded to an even length.

use crate::error::{ZError, ZResult};

#[derive(Debug, Clone)]
pub struct IffChunk {
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IffFile {
    pub form_type: [u8; 4],
    pub chunks: Vec<IffChunk>,
}

impl IffFile {
    pub fn new(form_type: [u8; 4]) -> IffFile {
        IffFile { form_type, chunks: Vec::new() }
    }

    pub fn add_chunk(&mut self, chunk_type: [u8; 4], data: Vec<u8>) {
        self.chunks.push(IffChunk { chunk_type, data });
    }

    pub fn find_chunk(&self, chunk_type: &[u8; 4]) -> Option<&IffChunk> {
        self.chunks.iter().find(|c| &c.chunk_type == chunk_type)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            body.extend_from_slice(&chunk.chunk_type);
            body.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            body.extend_from_slice(&chunk.data);
            if chunk.data.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    pub fn parse(bytes: &[u8]) -> ZResult<IffFile> {
        if bytes.len() < 12 || &bytes[0..4] != b"FORM" {
            return Err(ZError::malformed("not an IFF FORM container"));
        }
        let total_size = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let mut form_type = [0u8; 4];
        form_type.copy_from_slice(&bytes[8..12]);
        let end = (8 + total_size).min(bytes.len());

        let mut chunks = Vec::new();
        let mut cursor = 12;
        while cursor + 8 <= end {
            let mut chunk_type = [0u8; 4];
            chunk_type.copy_from_slice(&bytes[cursor..cursor + 4]);
            let size = u32::from_be_bytes(bytes[cursor + 4..cursor + 8].try_into().unwrap()) as usize;
            let data_start = cursor + 8;
            let data_end = data_start + size;
            if data_end > bytes.len() {
                return Err(ZError::malformed("IFF chunk runs past end of file"));
            }
            chunks.push(IffChunk { chunk_type, data: bytes[data_start..data_end].to_vec() });
            cursor = data_end + (size % 2);
        }
        Ok(IffFile { form_type, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut f = IffFile::new(*b"IFZS");
        f.add_chunk(*b"IFhd", vec![1, 2, 3]); // odd length, exercises padding
        f.add_chunk(*b"Stks", vec![4, 5, 6, 7]);
        let bytes = f.to_bytes();
        let parsed = IffFile::parse(&bytes).unwrap();
        assert_eq!(parsed.form_type, *b"IFZS");
        assert_eq!(parsed.chunks.len(), 2);
        assert_eq!(parsed.find_chunk(b"IFhd").unwrap().data, vec![1, 2, 3]);
    }
}
