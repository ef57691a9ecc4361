//! Top-level lifecycle wrapper: loads a story (optionally Blorb-wrapped),
//! owns the running `Interpreter`, and implements restart (soft/hard reset).
//! This is the one type a host application constructs directly; everything
//! else in this crate is reached through it or through the `Interpreter` it
//! hands back.

use crate::blorb;
use crate::error::{ZError, ZResult};
use crate::header::{Header, ScreenGeometry};
use crate::interpreter::Interpreter;
use crate::vm::Engine;

pub struct ZMachine {
    pub interpreter: Interpreter,
    original_story: Vec<u8>,
    geometry: ScreenGeometry,
}

impl ZMachine {
    /// Loads a story file, unwrapping a Blorb container transparently if
    /// `bytes` is one. Stamps the interpreter-identity and screen-geometry
    /// header fields the running host is responsible for (Standard §11.1).
    pub fn load(bytes: Vec<u8>, geometry: ScreenGeometry) -> ZResult<ZMachine> {
        let story_bytes = blorb::extract_story(&bytes).unwrap_or(bytes);
        if story_bytes.is_empty() {
            return Err(ZError::malformed("empty story file"));
        }
        let mut stamped = story_bytes.clone();
        if stamped.len() >= Header::SIZE {
            Header::stamp_runtime_fields(&mut stamped, &geometry);
        }
        let engine = Engine::new(stamped.clone())?;
        log::info!(
            "loaded story: version {} release {} serial {}",
            engine.header.version,
            engine.header.release,
            String::from_utf8_lossy(&engine.header.serial)
        );
        Ok(ZMachine {
            interpreter: Interpreter::new(engine),
            original_story: stamped,
            geometry,
        })
    }

    /// Standard §6.1.3 `restart`: reloads the original story image, resetting
    /// dynamic memory and the stacks but preserving the two header flags and
    /// the default window status bit the Standard requires to survive restart
    /// (`flags2` transcript/fixed-pitch bits).
    pub fn soft_reset(&mut self) -> ZResult<()> {
        let preserved_flags2 = self.interpreter.engine.header.flags2 & 0x0003;
        let mut bytes = self.original_story.clone();
        Header::stamp_runtime_fields(&mut bytes, &self.geometry);
        let mut engine = Engine::new(bytes)?;
        engine.header.flags2 |= preserved_flags2;
        self.interpreter = Interpreter::new(engine);
        log::debug!("soft reset complete");
        Ok(())
    }

    /// A hard reset is identical to `restart` for this core: there is no
    /// persistent interpreter state beyond the story image itself (no undo
    /// slots, no transcript file handle) that a "harder" reset would need to
    /// additionally discard.
    pub fn hard_reset(&mut self) -> ZResult<()> {
        self.soft_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RecordingProvider;

    fn minimal_story() -> Vec<u8> {
        let mut bytes = vec![0u8; 0x100];
        bytes[0] = 3;
        bytes[0x0E..0x10].copy_from_slice(&0x80u16.to_be_bytes());
        bytes[0x06..0x08].copy_from_slice(&0x90u16.to_be_bytes());
        bytes
    }

    #[test]
    fn load_stamps_screen_geometry() {
        let zm = ZMachine::load(minimal_story(), ScreenGeometry::default()).unwrap();
        assert_eq!(zm.interpreter.engine.header.screen_width_chars, 80);
    }

    #[test]
    fn soft_reset_restores_dynamic_memory() {
        let mut zm = ZMachine::load(minimal_story(), ScreenGeometry::default()).unwrap();
        zm.interpreter.engine.write_global(0x10, 0xBEEF).unwrap();
        zm.soft_reset().unwrap();
        assert_eq!(zm.interpreter.engine.read_global(0x10).unwrap(), 0);
        let _ = RecordingProvider::default();
    }
}
