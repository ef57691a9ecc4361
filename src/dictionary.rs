//! Dictionary lookup and text tokenisation (Standard §13, §15 `tokenise`).

use crate::error::{ZError, ZResult};
use crate::header::Header;
use crate::memory::MemoryMap;
use crate::zstring::encode_input;

pub struct DictionaryHeader {
    pub separators: Vec<u8>,
    pub entry_length: u8,
    pub entry_count: i16,
    pub entries_addr: u32,
}

pub fn read_dictionary_header(memory: &MemoryMap, dict_addr: u32) -> ZResult<DictionaryHeader> {
    let sep_count = memory.read_byte(dict_addr)? as u32;
    let mut separators = Vec::with_capacity(sep_count as usize);
    for i in 0..sep_count {
        separators.push(memory.read_byte(dict_addr + 1 + i)?);
    }
    let entry_length_addr = dict_addr + 1 + sep_count;
    let entry_length = memory.read_byte(entry_length_addr)?;
    let entry_count = memory.read_word(entry_length_addr + 1)? as i16;
    let entries_addr = entry_length_addr + 3;
    Ok(DictionaryHeader {
        separators,
        entry_length,
        entry_count,
        entries_addr,
    })
}

/// One token recognised while splitting a text buffer into words: its text
/// position (1-based, relative to the start of user text) and byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub length: usize,
}

/// Splits `text` into dictionary tokens. Whitespace separates tokens without
/// itself becoming one; every other separator character in the dictionary's
/// separator list becomes its own single-character token (Standard §13.4,
/// §15 `tokenise`).
pub fn tokenise_text(text: &str, separators: &[u8]) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut word_start: Option<usize> = None;

    let flush = |tokens: &mut Vec<Token>, bytes: &[u8], start: usize, end: usize| {
        if end > start {
            tokens.push(Token {
                text: String::from_utf8_lossy(&bytes[start..end]).to_string(),
                start,
                length: end - start,
            });
        }
    };

    while i < bytes.len() {
        let b = bytes[i];
        if b == b' ' {
            if let Some(ws) = word_start.take() {
                flush(&mut tokens, bytes, ws, i);
            }
        } else if separators.contains(&b) {
            if let Some(ws) = word_start.take() {
                flush(&mut tokens, bytes, ws, i);
            }
            tokens.push(Token {
                text: (b as char).to_string(),
                start: i,
                length: 1,
            });
        } else if word_start.is_none() {
            word_start = Some(i);
        }
        i += 1;
    }
    if let Some(ws) = word_start.take() {
        flush(&mut tokens, bytes, ws, bytes.len());
    }
    tokens
}

/// Looks up a token's encoded form in the dictionary via binary search
/// (entries are stored in unsigned-byte sorted order). Returns the entry's
/// address, or 0 if not found (Standard §13).
pub fn lookup(memory: &MemoryMap, header: &Header, dict_addr: u32, word: &str) -> ZResult<u16> {
    let dict = read_dictionary_header(memory, dict_addr)?;
    let n_words = if header.version <= 3 { 2 } else { 3 };
    let key = encode_input(word, n_words);
    let key_bytes: Vec<u8> = key.iter().flat_map(|w| w.to_be_bytes()).collect();

    if dict.entry_count <= 0 {
        // Negative entry count means unsorted; not supported generically, fall
        // back to a linear scan.
        let count = dict.entry_count.unsigned_abs() as u32;
        for i in 0..count {
            let addr = dict.entries_addr + i * dict.entry_length as u32;
            if entry_matches(memory, addr, &key_bytes)? {
                return Ok(addr as u16);
            }
        }
        return Ok(0);
    }

    let count = dict.entry_count as u32;
    let mut lo: i64 = 0;
    let mut hi: i64 = count as i64 - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let addr = dict.entries_addr + mid as u32 * dict.entry_length as u32;
        let cmp = compare_entry(memory, addr, &key_bytes)?;
        match cmp {
            std::cmp::Ordering::Equal => return Ok(addr as u16),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid - 1,
        }
    }
    Ok(0)
}

fn entry_matches(memory: &MemoryMap, addr: u32, key_bytes: &[u8]) -> ZResult<bool> {
    Ok(compare_entry(memory, addr, key_bytes)? == std::cmp::Ordering::Equal)
}

fn compare_entry(memory: &MemoryMap, addr: u32, key_bytes: &[u8]) -> ZResult<std::cmp::Ordering> {
    for (i, &kb) in key_bytes.iter().enumerate() {
        let eb = memory.read_byte(addr + i as u32)?;
        match eb.cmp(&kb) {
            std::cmp::Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(std::cmp::Ordering::Equal)
}

/// Writes a parse-buffer record for `tokenise`/`sread`/`aread` per Standard
/// §15: up to `max_words` records of (dict addr, word length, text position).
/// `text_origin` is added to each token's 0-based `start` to produce the
/// position byte; the Standard fixes this at 1 for V3 and 2 for V4+ (the
/// parse buffer's first writable byte differs by version).
pub fn write_parse_buffer(
    memory: &mut MemoryMap,
    header: &Header,
    dict_addr: u32,
    parse_buffer: u32,
    tokens: &[Token],
    skip_unrecognized: bool,
) -> ZResult<()> {
    let max_words = memory.read_byte(parse_buffer)? as usize;
    let text_origin: u32 = if header.version <= 3 { 1 } else { 2 };

    let n = tokens.len().min(max_words);
    memory.write_byte(parse_buffer + 1, n as u8)?;
    for (i, tok) in tokens.iter().take(n).enumerate() {
        let entry_addr = lookup(memory, header, dict_addr, &tok.text)?;
        if entry_addr == 0 && skip_unrecognized {
            memory.write_word(parse_buffer + 2 + (i as u32 * 4), 0)?;
            memory.write_byte(parse_buffer + 2 + (i as u32 * 4) + 2, tok.length as u8)?;
            memory.write_byte(
                parse_buffer + 2 + (i as u32 * 4) + 3,
                (tok.start as u32 + text_origin) as u8,
            )?;
            continue;
        }
        let record_addr = parse_buffer + 2 + (i as u32 * 4);
        memory.write_word(record_addr, entry_addr)?;
        memory.write_byte(record_addr + 2, tok.length as u8)?;
        memory.write_byte(record_addr + 3, (tok.start as u32 + text_origin) as u8)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenise_splits_on_space_and_honors_separators() {
        let toks = tokenise_text("go north,quickly", b",");
        let words: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["go", "north", ",", "quickly"]);
    }

    #[test]
    fn separator_is_its_own_token_with_correct_offsets() {
        let toks = tokenise_text("a,b", b",");
        assert_eq!(toks[0], Token { text: "a".into(), start: 0, length: 1 });
        assert_eq!(toks[1], Token { text: ",".into(), start: 1, length: 1 });
        assert_eq!(toks[2], Token { text: "b".into(), start: 2, length: 1 });
    }
}
