//! Restores engine state from a Quetzal save file. Validates the release
//! number against the running story (a mismatch is an error) and warns, but
//! does not reject, on a serial-number mismatch, per Standard §Appendix.

use crate::error::{ZError, ZResult};
use crate::quetzal::chunks::{IfhdChunk, MemoryChunk, StksChunk};
use crate::quetzal::iff::IffFile;
use crate::vm::Engine;

pub struct RestoredSave {
    iff: IffFile,
}

impl RestoredSave {
    pub fn parse(bytes: &[u8]) -> ZResult<RestoredSave> {
        let iff = IffFile::parse(bytes)?;
        if iff.form_type != *b"IFZS" {
            return Err(ZError::malformed("save file is not an IFZS form"));
        }
        if iff.find_chunk(b"IFhd").is_none() {
            return Err(ZError::malformed("save file missing IFhd chunk"));
        }
        if iff.find_chunk(b"CMem").is_none() && iff.find_chunk(b"UMem").is_none() {
            return Err(ZError::malformed("save file missing CMem/UMem chunk"));
        }
        if iff.find_chunk(b"Stks").is_none() {
            return Err(ZError::malformed("save file missing Stks chunk"));
        }
        Ok(RestoredSave { iff })
    }

    /// Restores dynamic memory and the stacks into `engine`. Per the V1-3
    /// Quetzal convention, the program counter is deliberately left
    /// untouched: execution resumes from the instruction that invoked
    /// `restore`/branched on it, not from the saved PC (the caller's branch
    /// or store-result handling is what actually changes control flow).
    pub fn restore_into(&self, engine: &mut Engine, original_dynamic: &[u8]) -> ZResult<()> {
        let ifhd_bytes = &self.iff.find_chunk(b"IFhd").expect("checked in parse").data;
        let ifhd = IfhdChunk::from_bytes(ifhd_bytes)?;
        if ifhd.release != engine.header.release {
            return Err(ZError::malformed(format!(
                "save file release {} does not match running story release {}",
                ifhd.release, engine.header.release
            )));
        }
        if ifhd.serial != engine.header.serial {
            log::warn!("save file serial number does not match the running story; restoring anyway");
        }

        let restored_dynamic = if let Some(chunk) = self.iff.find_chunk(b"CMem") {
            MemoryChunk::Compressed(chunk.data.clone()).restore_to(original_dynamic)?
        } else {
            let chunk = self.iff.find_chunk(b"UMem").expect("checked in parse");
            MemoryChunk::Uncompressed(chunk.data.clone()).restore_to(original_dynamic)?
        };
        engine.memory.replace_dynamic(&restored_dynamic)?;

        let stks = StksChunk { data: self.iff.find_chunk(b"Stks").expect("checked in parse").data.clone() };
        stks.restore_into(engine)?;
        Ok(())
    }
}
