//! Output stream state: which of the four output streams (screen,
//! transcript, memory, script-input-echo) are active, the transcript buffer,
//! and the memory-stream redirection-target stack. Consolidates what the
//! teacher scattered across several ad hoc fields into one component, per the
//! redesign direction.

use crate::error::{ZError, ZResult};
use crate::memory::MemoryMap;

pub const MAX_MEMORY_STREAM_DEPTH: usize = 16;

#[derive(Debug, Default)]
pub struct OutputStreams {
    pub screen_active: bool,
    pub transcript_active: bool,
    pub transcript_buffer: String,
    /// Stack of memory-stream (`output_stream 3`) redirection targets: the
    /// address of the 2-byte length prefix each redirected string is written
    /// through. Standard §7.1.2.1 caps nesting at 16 and treats exceeding it
    /// as the implementation's choice; this crate discards the new request
    /// and keeps the innermost 16 active (see DESIGN.md Open Questions).
    memory_targets: Vec<MemoryStreamTarget>,
    pub input_script_active: bool,
    pub most_recent_input_line: String,
}

#[derive(Debug, Clone, Copy)]
struct MemoryStreamTarget {
    addr: u32,
    written: u16,
}

impl OutputStreams {
    pub fn new() -> OutputStreams {
        OutputStreams { screen_active: true, ..Default::default() }
    }

    pub fn set_stream(&mut self, stream: i16, enable: bool, table_addr: Option<u32>) -> ZResult<()> {
        match stream.unsigned_abs() {
            1 => self.screen_active = enable,
            2 => self.transcript_active = enable,
            3 => {
                if enable {
                    let addr = table_addr.ok_or_else(|| {
                        ZError::illegal(0, "output_stream 3 requires a table address")
                    })?;
                    if self.memory_targets.len() >= MAX_MEMORY_STREAM_DEPTH {
                        log::warn!("memory stream nesting exceeds {MAX_MEMORY_STREAM_DEPTH}; discarding new redirection");
                        return Ok(());
                    }
                    self.memory_targets.push(MemoryStreamTarget { addr, written: 0 });
                } else {
                    self.memory_targets.pop();
                }
            }
            4 => self.input_script_active = enable,
            other => return Err(ZError::illegal(0, format!("unknown output stream {other}"))),
        }
        Ok(())
    }

    pub fn memory_stream_depth(&self) -> usize {
        self.memory_targets.len()
    }

    pub fn memory_redirect_active(&self) -> bool {
        !self.memory_targets.is_empty()
    }

    /// Writes `text` to whichever streams are currently active. When a
    /// memory-stream redirection is active, text goes *only* to the
    /// innermost memory target (Standard §7.1.2.1: screen/transcript output
    /// is suppressed while stream 3 is selected).
    pub fn write_text(&mut self, memory: &mut MemoryMap, text: &str, provider_print: &mut dyn FnMut(&str) -> ZResult<()>) -> ZResult<()> {
        if let Some(target) = self.memory_targets.last_mut() {
            for ch in text.chars() {
                let addr = target.addr + 2 + target.written as u32;
                memory.write_byte(addr, ch as u8)?;
                target.written += 1;
            }
            memory.write_word(target.addr, target.written)?;
            return Ok(());
        }
        if self.screen_active {
            provider_print(text)?;
        }
        if self.transcript_active {
            self.transcript_buffer.push_str(text);
        }
        Ok(())
    }

    /// Pops the innermost memory-stream target, finalising its length prefix.
    /// Called by the `output_stream -3` opcode handler, which needs to run
    /// this *before* `set_stream` clears active state, hence kept separate
    /// from `set_stream`'s disable branch above.
    pub fn pop_memory_stream(&mut self) -> Option<u32> {
        self.memory_targets.pop().map(|t| t.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_memory_stream_nesting_at_sixteen() {
        let mut streams = OutputStreams::new();
        for i in 0..20 {
            streams.set_stream(3, true, Some(0x100 + i)).unwrap();
        }
        assert_eq!(streams.memory_stream_depth(), MAX_MEMORY_STREAM_DEPTH);
    }
}
