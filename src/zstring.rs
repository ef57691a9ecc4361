//! ZSCII / Z-character codec: decoding packed Z-strings to native strings and
//! encoding native text back into dictionary-comparable Z-words.

use crate::error::{ZError, ZResult};
use crate::header::Header;
use crate::memory::MemoryMap;

const ALPHABET_A0: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHABET_A1: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHABET_A2: &[u8; 26] = b" \r0123456789.,!?_#'\"/\\-:()";

const MAX_STRING_ZCHARS: usize = 4000;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    A0,
    A1,
    A2,
}

struct AlphabetTables {
    a0: [u8; 26],
    a1: [u8; 26],
    a2: [u8; 26],
}

impl AlphabetTables {
    fn default_tables() -> AlphabetTables {
        AlphabetTables {
            a0: *ALPHABET_A0,
            a1: *ALPHABET_A1,
            a2: *ALPHABET_A2,
        }
    }

    /// V5+ games may supply a custom 78-byte alphabet table via the header's
    /// alphabet-table pointer (Standard §3.5.5), overriding the defaults.
    fn load(memory: &MemoryMap, header: &Header) -> ZResult<AlphabetTables> {
        if header.version < 5 || header.alphabet_table_addr == 0 {
            return Ok(AlphabetTables::default_tables());
        }
        let base = header.alphabet_table_addr as u32;
        let mut tables = AlphabetTables::default_tables();
        for i in 0..26 {
            tables.a0[i] = memory.read_byte(base + i as u32)?;
            tables.a1[i] = memory.read_byte(base + 26 + i as u32)?;
            tables.a2[i] = memory.read_byte(base + 52 + i as u32)?;
        }
        Ok(tables)
    }

    fn lookup(&self, alphabet: Alphabet, zchar: u8) -> u8 {
        let idx = (zchar - 6) as usize;
        match alphabet {
            Alphabet::A0 => self.a0[idx],
            Alphabet::A1 => self.a1[idx],
            Alphabet::A2 => self.a2[idx],
        }
    }
}

/// Decodes one Z-string, returning the decoded text and the number of bytes
/// it occupied (always even: a whole number of 16-bit words). Strings whose
/// address is at or past `base_static_mem` are memoised in the memory map's
/// string cache — that region never changes under a running story, and the
/// cache is implicitly flushed whenever a fresh `MemoryMap` is built (every
/// `load()`/reset).
pub fn decode_string(memory: &MemoryMap, header: &Header, addr: u32) -> ZResult<(String, usize)> {
    if memory.is_dynamic(addr) {
        return decode_string_inner(memory, header, addr, 0);
    }
    if let Some(cached) = memory.cached_string(addr) {
        return Ok(cached);
    }
    let result = decode_string_inner(memory, header, addr, 0)?;
    memory.cache_string(addr, result.clone());
    Ok(result)
}

pub fn decode_string_at_packed(memory: &MemoryMap, header: &Header, packed: u16) -> ZResult<String> {
    let addr = header.unpack_string_address(packed);
    decode_string(memory, header, addr).map(|(s, _)| s)
}

fn decode_string_inner(
    memory: &MemoryMap,
    header: &Header,
    addr: u32,
    abbrev_depth: u8,
) -> ZResult<(String, usize)> {
    // Standard §3.8: an abbreviation string is never itself permitted to use
    // abbreviations. Unlike a loose depth cap, nested abbreviation escapes are
    // rejected outright.
    if abbrev_depth > 1 {
        return Err(ZError::malformed("nested abbreviation in Z-string"));
    }

    let tables = AlphabetTables::load(memory, header)?;
    let mut zchars = Vec::new();
    let mut cursor = addr;
    loop {
        let word = memory.read_word(cursor)?;
        cursor += 2;
        zchars.push(((word >> 10) & 0x1F) as u8);
        zchars.push(((word >> 5) & 0x1F) as u8);
        zchars.push((word & 0x1F) as u8);
        if word & 0x8000 != 0 {
            break;
        }
        if zchars.len() > MAX_STRING_ZCHARS {
            return Err(ZError::malformed("Z-string exceeds maximum length"));
        }
    }
    let byte_len = (cursor - addr) as usize;

    let shift_lock_version = header.version <= 2;
    let mut alphabet = Alphabet::A0;
    let mut locked_alphabet: Option<Alphabet> = None;
    let mut shift_once: Option<Alphabet> = None;
    let mut abbrev_shift: Option<u8> = None;
    let mut pending_escape: Option<u8> = None; // first half of a 10-bit escape
    let mut out = String::new();

    let mut i = 0;
    while i < zchars.len() {
        let zc = zchars[i];
        i += 1;

        if let Some(high) = pending_escape.take() {
            let code = ((high as u16) << 5) | zc as u16;
            out.push(zscii_to_char(memory, header, code));
            continue;
        }

        if let Some(shift_num) = abbrev_shift.take() {
            let abbrev_num = (shift_num - 1) as u32 * 32 + zc as u32;
            let abbrev_word_addr = header.abbrev_table_addr as u32 + abbrev_num * 2;
            let entry = memory.read_word(abbrev_word_addr)?;
            let (text, _) = decode_string_inner(memory, header, entry as u32 * 2, abbrev_depth + 1)?;
            out.push_str(&text);
            continue;
        }

        let effective_alphabet = shift_once.take().unwrap_or(locked_alphabet.unwrap_or(alphabet));

        match zc {
            0 => out.push(' '),
            1..=3 if header.version >= 2 => {
                abbrev_shift = Some(zc);
            }
            1 if header.version == 1 => out.push('\n'),
            2 | 3 if header.version == 1 => {
                let target = if zc == 2 { Alphabet::A1 } else { Alphabet::A2 };
                if shift_lock_version {
                    shift_once = Some(target);
                } else {
                    shift_once = Some(target);
                }
            }
            4 | 5 => {
                let target = if zc == 4 { Alphabet::A1 } else { Alphabet::A2 };
                if shift_lock_version {
                    locked_alphabet = Some(target);
                } else {
                    shift_once = Some(target);
                }
            }
            6 if effective_alphabet == Alphabet::A2 => {
                if i + 1 >= zchars.len() {
                    // Truncated 10-bit escape at buffer end: emit nothing further.
                    break;
                }
                pending_escape = Some(zchars[i]);
                i += 1;
            }
            7 if effective_alphabet == Alphabet::A2 => out.push('\n'),
            _ => {
                let ch = tables.lookup(effective_alphabet, zc);
                out.push(ch as char);
            }
        }
        let _ = alphabet;
    }

    Ok((out, byte_len))
}

fn zscii_to_char(memory: &MemoryMap, header: &Header, code: u16) -> char {
    match code {
        9 => '\t',
        11 => ' ',
        13 => '\n',
        32..=126 => code as u8 as char,
        155..=223 => unicode_from_zscii_with(memory, header, code),
        _ => '?',
    }
}

/// Standard §3.8.5.4: ZSCII codes 155-223 map through a Unicode translation
/// table — the default one from Appendix A unless `memory`/`header` name a
/// custom table via header-extension word 3 (count byte followed by that
/// many 16-bit codepoints), per §3.8.5.4.1.
fn unicode_from_zscii_with(memory: &MemoryMap, header: &Header, code: u16) -> char {
    if let Some(custom) = custom_unicode_table_entry(memory, header, code) {
        return custom;
    }
    unicode_from_zscii(code).unwrap_or('?')
}

fn custom_unicode_table_entry(memory: &MemoryMap, header: &Header, code: u16) -> Option<char> {
    if header.version < 5 || header.header_extension_addr == 0 {
        return None;
    }
    let ext_base = header.header_extension_addr as u32;
    let ext_len = memory.read_word(ext_base).ok()? as u32;
    if ext_len < 3 {
        return None;
    }
    let table_addr = memory.read_word(ext_base + 3 * 2).ok()? as u32;
    if table_addr == 0 {
        return None;
    }
    let count = memory.read_byte(table_addr).ok()? as u32;
    let index = (code - 155) as u32;
    if index >= count {
        return None;
    }
    let cp = memory.read_word(table_addr + 1 + index * 2).ok()? as u32;
    char::from_u32(cp)
}

/// Standard Appendix A's default table for ZSCII 155-223.
fn unicode_from_zscii(code: u16) -> Option<char> {
    const TABLE: &[char] = &[
        'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó',
        'ú', 'ý', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù',
        'â', 'ê', 'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û', 'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã',
        'Ñ', 'Õ', 'æ', 'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿',
    ];
    TABLE.get((code - 155) as usize).copied()
}

/// Encodes `text` into exactly `n_words` 16-bit words (6 Z-characters per two
/// words, 9 per three), used by `tokenise`/dictionary lookup/`encode_text`
/// (Standard §3.7, §13).
pub fn encode_input(text: &str, n_words: usize) -> Vec<u16> {
    let n_chars = n_words * 3;
    let mut zchars: Vec<u8> = Vec::with_capacity(n_chars);
    for ch in text.chars().map(|c| c.to_ascii_lowercase()) {
        if zchars.len() >= n_chars {
            break;
        }
        if ch.is_ascii_lowercase() {
            zchars.push((ch as u8) - b'a' + 6);
        } else if ch == ' ' {
            zchars.push(0);
        } else {
            // Punctuation outside A0/A2 is rare in dictionary words; look it
            // up in A2 via a single shift-5 escape, or fall back to a space.
            if let Some(pos) = ALPHABET_A2.iter().position(|&b| b as char == ch) {
                zchars.push(5);
                zchars.push(pos as u8 + 6);
            } else {
                zchars.push(5); // shift to A2
                zchars.push(0); // space, best-effort fallback
            }
        }
    }
    while zchars.len() < n_chars {
        zchars.push(5);
    }
    zchars.truncate(n_chars);

    let mut words = Vec::with_capacity(n_words);
    for chunk in zchars.chunks(3) {
        let word = ((chunk[0] as u16) << 10) | ((chunk[1] as u16) << 5) | chunk[2] as u16;
        words.push(word);
    }
    if let Some(last) = words.last_mut() {
        *last |= 0x8000;
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_v3() -> Header {
        let mut bytes = vec![0u8; 256];
        bytes[0] = 3;
        bytes[0x18..0x1A].copy_from_slice(&0x40u16.to_be_bytes());
        Header::parse(&bytes).unwrap()
    }

    #[test]
    fn decodes_simple_lowercase_string() {
        // "hi" encoded as z-chars: h=13,i=14, pad=5,5,5 -> two words.
        let header = header_v3();
        let mut bytes = vec![0u8; 256];
        bytes[0] = 3;
        let word0: u16 = (13u16 << 10) | (14u16 << 5) | 5;
        let word1: u16 = 0x8000 | (5u16 << 10) | (5u16 << 5) | 5;
        bytes[0x40..0x42].copy_from_slice(&word0.to_be_bytes());
        bytes[0x42..0x44].copy_from_slice(&word1.to_be_bytes());
        let mem = MemoryMap::new(bytes, &header);
        let (s, len) = decode_string(&mem, &header, 0x40).unwrap();
        assert_eq!(s, "hi");
        assert_eq!(len, 4);
    }

    #[test]
    fn encode_input_pads_and_terminates() {
        let words = encode_input("go", 2);
        assert_eq!(words.len(), 2);
        assert_eq!(words[1] & 0x8000, 0x8000);
    }

    #[test]
    fn repeated_decode_of_static_string_hits_the_cache() {
        let header = header_v3();
        let mut bytes = vec![0u8; 256];
        bytes[0] = 3;
        let word0: u16 = (13u16 << 10) | (14u16 << 5) | 5;
        let word1: u16 = 0x8000 | (5u16 << 10) | (5u16 << 5) | 5;
        bytes[0x40..0x42].copy_from_slice(&word0.to_be_bytes());
        bytes[0x42..0x44].copy_from_slice(&word1.to_be_bytes());
        let mem = MemoryMap::new(bytes, &header);
        assert!(mem.cached_string(0x40).is_none());
        let (first, _) = decode_string(&mem, &header, 0x40).unwrap();
        assert!(mem.cached_string(0x40).is_some());
        let (second, _) = decode_string(&mem, &header, 0x40).unwrap();
        assert_eq!(first, second);
    }

    fn header_v5_with_extension(ext_addr: u16) -> (Header, Vec<u8>) {
        let mut bytes = vec![0u8; 320];
        bytes[0] = 5;
        bytes[0x18..0x1A].copy_from_slice(&0x40u16.to_be_bytes());
        bytes[0x36..0x38].copy_from_slice(&ext_addr.to_be_bytes());
        let header = Header::parse(&bytes).unwrap();
        (header, bytes)
    }

    #[test]
    fn custom_unicode_table_overrides_default_entry() {
        let (header, mut bytes) = header_v5_with_extension(0x100);
        // Header extension table: word 0 = length (>= 3), word 3 = unicode table addr.
        bytes[0x100..0x102].copy_from_slice(&3u16.to_be_bytes());
        bytes[0x106..0x108].copy_from_slice(&0x120u16.to_be_bytes());
        // Unicode table at 0x120: count=1, codepoint 0x20AC (€).
        bytes[0x120] = 1;
        bytes[0x121..0x123].copy_from_slice(&0x20ACu16.to_be_bytes());
        let mem = MemoryMap::new(bytes, &header);
        assert_eq!(unicode_from_zscii_with(&mem, &header, 155), '€');
        // Past the custom table's single entry: falls back to the default table.
        assert_eq!(unicode_from_zscii_with(&mem, &header, 156), 'ö');
    }
}
