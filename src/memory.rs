//! The story-file memory map: dynamic/static/high regions and the byte/word
//! access discipline that every other component is built on.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{ZError, ZResult};
use crate::header::Header;

/// Owns the raw story bytes plus the boundaries that partition them into the
/// dynamic (writable), static (read-only) and high (code/string, never
/// directly addressable by storew/storeb) regions.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    bytes: Vec<u8>,
    pub base_static_mem: u32,
    pub base_high_mem: u32,
    /// Decoded-string memo, keyed by the string's starting address.
    /// Addresses below `base_static_mem` are never entered (dynamic memory
    /// can be rewritten by the running story); a fresh `MemoryMap` per
    /// `load()`/reset means the cache is implicitly flushed whenever the
    /// story reloads.
    string_cache: RefCell<HashMap<u32, (String, usize)>>,
}

impl MemoryMap {
    pub fn new(bytes: Vec<u8>, header: &Header) -> MemoryMap {
        MemoryMap {
            bytes,
            base_static_mem: header.base_static_mem as u32,
            base_high_mem: header.base_high_mem as u32,
            string_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Looks up a memoised string decode. Only ever consulted for addresses
    /// at or past `base_static_mem` — see `zstring::decode_string`.
    pub fn cached_string(&self, addr: u32) -> Option<(String, usize)> {
        self.string_cache.borrow().get(&addr).cloned()
    }

    pub fn cache_string(&self, addr: u32, value: (String, usize)) {
        self.string_cache.borrow_mut().insert(addr, value);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dynamic_slice(&self) -> &[u8] {
        &self.bytes[..self.base_static_mem as usize]
    }

    pub fn is_dynamic(&self, addr: u32) -> bool {
        addr < self.base_static_mem
    }

    pub fn read_byte(&self, addr: u32) -> ZResult<u8> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(ZError::oob(addr))
    }

    pub fn read_word(&self, addr: u32) -> ZResult<u16> {
        let hi = self.read_byte(addr)?;
        let lo = self.read_byte(addr + 1)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Writes a byte. Story bytes at or past `base_static_mem` are read-only
    /// to the running program (Standard §1.1); attempts to write there are an
    /// illegal-memory-access error rather than a silent no-op.
    pub fn write_byte(&mut self, addr: u32, value: u8) -> ZResult<()> {
        if addr >= self.base_static_mem {
            return Err(ZError::non_dynamic_write(addr));
        }
        let slot = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(ZError::oob(addr))?;
        *slot = value;
        Ok(())
    }

    pub fn write_word(&mut self, addr: u32, value: u16) -> ZResult<()> {
        let [hi, lo] = value.to_be_bytes();
        self.write_byte(addr, hi)?;
        self.write_byte(addr + 1, lo)?;
        Ok(())
    }

    /// Raw write that bypasses the dynamic-memory guard, used only by
    /// save/restore to rebuild memory from a Quetzal chunk and by header
    /// field stamping at load time.
    pub fn raw_write_byte(&mut self, addr: u32, value: u8) -> ZResult<()> {
        let slot = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(ZError::oob(addr))?;
        *slot = value;
        Ok(())
    }

    pub fn replace_dynamic(&mut self, new_dynamic: &[u8]) -> ZResult<()> {
        if new_dynamic.len() != self.base_static_mem as usize {
            return Err(ZError::malformed(
                "restored dynamic memory size does not match story file",
            ));
        }
        self.bytes[..new_dynamic.len()].copy_from_slice(new_dynamic);
        Ok(())
    }

    /// Sum of all bytes past the checksum field (Standard §11.1.7), for the
    /// `verify` opcode. Per the Standard, the checksum word itself (and
    /// everything before it) is excluded; bytes beyond the declared file
    /// length (padding) are also excluded.
    pub fn checksum(&self, declared_length: usize) -> u16 {
        let end = declared_length.min(self.bytes.len());
        if end <= 0x40 {
            return 0;
        }
        self.bytes[0x40..end]
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_header_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 256];
        bytes[0] = 3;
        bytes[0x0E..0x10].copy_from_slice(&0x80u16.to_be_bytes());
        bytes[0x04..0x06].copy_from_slice(&0xC0u16.to_be_bytes());
        bytes
    }

    #[test]
    fn read_write_round_trip_in_dynamic_region() {
        let bytes = test_header_bytes();
        let header = Header::parse(&bytes).unwrap();
        let mut mem = MemoryMap::new(bytes, &header);
        mem.write_word(0x10, 0xBEEF).unwrap();
        assert_eq!(mem.read_word(0x10).unwrap(), 0xBEEF);
    }

    #[test]
    fn write_to_static_memory_is_illegal() {
        let bytes = test_header_bytes();
        let header = Header::parse(&bytes).unwrap();
        let mut mem = MemoryMap::new(bytes, &header);
        let err = mem.write_byte(0x90, 1).unwrap_err();
        assert!(matches!(err, ZError::IllegalMemoryAccess { .. }));
    }

    #[test]
    fn out_of_bounds_read_is_an_error_not_zero() {
        let bytes = test_header_bytes();
        let header = Header::parse(&bytes).unwrap();
        let mem = MemoryMap::new(bytes, &header);
        assert!(mem.read_byte(10_000).is_err());
    }

    #[test]
    fn string_cache_round_trips_and_starts_empty() {
        let bytes = test_header_bytes();
        let header = Header::parse(&bytes).unwrap();
        let mem = MemoryMap::new(bytes, &header);
        assert!(mem.cached_string(0x90).is_none());
        mem.cache_string(0x90, ("hello".to_string(), 4));
        assert_eq!(mem.cached_string(0x90), Some(("hello".to_string(), 4)));
    }
}
