//! Individual Quetzal chunk encodings: `IFhd`, `CMem`/`UMem`, `Stks`.

use crate::error::{ZError, ZResult};
use crate::quetzal::compressed_memory;
use crate::stack::CallFrame;
use crate::vm::Engine;

pub struct IfhdChunk {
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    pub initial_pc: u32,
}

impl IfhdChunk {
    pub fn from_engine(engine: &Engine) -> IfhdChunk {
        IfhdChunk {
            release: engine.header.release,
            serial: engine.header.serial,
            checksum: engine.header.checksum,
            initial_pc: engine.header.initial_pc as u32,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(13);
        out.extend_from_slice(&self.release.to_be_bytes());
        out.extend_from_slice(&self.serial);
        out.extend_from_slice(&self.checksum.to_be_bytes());
        let pc_bytes = self.initial_pc.to_be_bytes();
        out.extend_from_slice(&pc_bytes[1..4]);
        out
    }

    pub fn from_bytes(data: &[u8]) -> ZResult<IfhdChunk> {
        if data.len() < 13 {
            return Err(ZError::malformed("IFhd chunk shorter than 13 bytes"));
        }
        let release = u16::from_be_bytes([data[0], data[1]]);
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&data[2..8]);
        let checksum = u16::from_be_bytes([data[8], data[9]]);
        let initial_pc = u32::from_be_bytes([0, data[10], data[11], data[12]]);
        Ok(IfhdChunk { release, serial, checksum, initial_pc })
    }
}

pub enum MemoryChunk {
    Compressed(Vec<u8>),
    Uncompressed(Vec<u8>),
}

impl MemoryChunk {
    pub fn from_engine(engine: &Engine, original_dynamic: &[u8]) -> MemoryChunk {
        let current = engine.memory.dynamic_slice();
        MemoryChunk::Compressed(compressed_memory::compress(current, original_dynamic))
    }

    pub fn restore_to(&self, original_dynamic: &[u8]) -> ZResult<Vec<u8>> {
        match self {
            MemoryChunk::Compressed(data) => compressed_memory::decompress(data, original_dynamic),
            MemoryChunk::Uncompressed(data) => {
                if data.len() != original_dynamic.len() {
                    return Err(ZError::malformed("UMem chunk size does not match story file"));
                }
                Ok(data.clone())
            }
        }
    }
}

pub struct StksChunk {
    pub data: Vec<u8>,
}

impl StksChunk {
    pub fn from_engine(engine: &Engine) -> StksChunk {
        // Frame N's own evaluation-stack slice runs from its stack_base up to
        // frame N+1's stack_base (or the current top, for the innermost frame).
        let mut out = Vec::new();
        for (i, frame) in engine.stacks.calls.iter().enumerate() {
            let pc_bytes = frame.return_pc.to_be_bytes();
            out.extend_from_slice(&pc_bytes[1..4]);
            let flags = (frame.num_locals & 0x0F)
                | if frame.return_store.is_some() { 0x10 } else { 0x00 };
            out.push(flags);
            out.push(frame.return_store.unwrap_or(0));
            out.push(frame.args_passed.min(7));
            let upper = engine
                .stacks
                .calls
                .get(i + 1)
                .map(|f| f.stack_base)
                .unwrap_or(engine.stacks.eval.len());
            let stack_slice = &engine.stacks.eval[frame.stack_base..upper];
            out.extend_from_slice(&(stack_slice.len() as u16).to_be_bytes());
            for &v in &frame.locals[..frame.num_locals as usize] {
                out.extend_from_slice(&v.to_be_bytes());
            }
            for &v in stack_slice {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        StksChunk { data: out }
    }

    pub fn restore_into(&self, engine: &mut Engine) -> ZResult<()> {
        let mut cursor = 0usize;
        let mut frames = Vec::new();
        let mut eval = Vec::new();
        while cursor < self.data.len() {
            if cursor + 6 > self.data.len() {
                return Err(ZError::malformed("Stks chunk truncated in frame header"));
            }
            let return_pc = u32::from_be_bytes([0, self.data[cursor], self.data[cursor + 1], self.data[cursor + 2]]);
            let flags = self.data[cursor + 3];
            let return_store_byte = self.data[cursor + 4];
            let args_passed = self.data[cursor + 5];
            cursor += 6;
            let num_locals = flags & 0x0F;
            let has_store = flags & 0x10 != 0;
            if cursor + 2 > self.data.len() {
                return Err(ZError::malformed("Stks chunk truncated before stack size"));
            }
            let stack_len = u16::from_be_bytes([self.data[cursor], self.data[cursor + 1]]) as usize;
            cursor += 2;

            let mut locals = [0u16; crate::stack::MAX_LOCALS];
            for slot in locals.iter_mut().take(num_locals as usize) {
                if cursor + 2 > self.data.len() {
                    return Err(ZError::malformed("Stks chunk truncated in locals"));
                }
                *slot = u16::from_be_bytes([self.data[cursor], self.data[cursor + 1]]);
                cursor += 2;
            }

            let stack_base = eval.len();
            for _ in 0..stack_len {
                if cursor + 2 > self.data.len() {
                    return Err(ZError::malformed("Stks chunk truncated in stack values"));
                }
                eval.push(u16::from_be_bytes([self.data[cursor], self.data[cursor + 1]]));
                cursor += 2;
            }

            frames.push(CallFrame {
                return_pc,
                return_store: if has_store { Some(return_store_byte) } else { None },
                num_locals,
                locals,
                stack_base,
                args_passed,
            });
        }
        engine.stacks.calls = frames;
        engine.stacks.eval = eval;
        Ok(())
    }
}
