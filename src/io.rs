//! The abstract I/O dispatch boundary: a single closed command/reply protocol
//! the engine uses to request all presentation-layer work. Replaces a
//! multi-method display trait with one tagged variant, so the engine never
//! names a concrete display/input technology.

use crate::error::ZResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextStyle {
    Roman,
    Reverse,
    Bold,
    Italic,
    FixedPitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub line: u16,
    pub column: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputStream {
    Keyboard,
    Script,
}

/// One request the engine makes of whatever presentation layer is attached.
/// This set is closed: new presentation needs are expressed within an
/// existing variant's fields, not by growing the enum ad hoc, so a provider
/// implementation only ever needs one `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoCommand {
    Print { text: String },
    SplitWindow { lines: u16 },
    SetWindow { window: u8 },
    SetCursor { line: u16, column: u16 },
    GetCursor,
    EraseLine,
    EraseWindow { window: i16 },
    ClearScreen,
    SetTextStyle { styles: Vec<TextStyle> },
    SetColour { foreground: u16, background: u16 },
    SetTrueColour { foreground: i16, background: i16 },
    SetFont { font: u16 },
    SoundEffect { number: u16, effect: u16, volume: u8 },
    ReadLine { max_len: u8, existing: String, time_tenths: u16 },
    ReadChar { time_tenths: u16 },
    Save { data: Vec<u8> },
    Restore,
    Status { location: String, score: i16, moves: u16, time_format: bool },
    PrintDebug { text: String },
    Quit,
    InputStream { stream: InputStream },
    BufferMode { buffered: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoReply {
    Ack,
    Cursor(Cursor),
    Line { text: String, terminator: u8 },
    Char(u8),
    SaveResult(bool),
    RestoreResult(Option<Vec<u8>>),
    FontResult { previous: u16 },
}

/// Screen capabilities a provider reports to the engine at load time
/// (Standard §11.1.3/§11.1.5, the `flags1`/screen-size header fields).
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    pub has_status_line: bool,
    pub has_split_window: bool,
    pub supports_bold: bool,
    pub supports_italic: bool,
    pub supports_fixed_pitch: bool,
    pub supports_timed_input: bool,
    pub supports_colour: bool,
    pub screen_width_chars: u8,
    pub screen_height_lines: u8,
}

/// Implemented once by each presentation layer (a TUI, a headless test
/// harness, a network transport). The engine only ever calls `dispatch`.
pub trait IoProvider {
    fn dispatch(&mut self, command: IoCommand) -> ZResult<IoReply>;
    fn capabilities(&self) -> ProviderCapabilities;
}

/// An in-memory provider for tests: records every command it receives and
/// answers from pre-seeded queues, rather than touching a terminal.
#[derive(Default)]
pub struct RecordingProvider {
    pub log: Vec<IoCommand>,
    pub line_inputs: std::collections::VecDeque<String>,
    pub char_inputs: std::collections::VecDeque<u8>,
}

impl IoProvider for RecordingProvider {
    fn dispatch(&mut self, command: IoCommand) -> ZResult<IoReply> {
        let reply = match &command {
            IoCommand::ReadLine { .. } => IoReply::Line {
                text: self.line_inputs.pop_front().unwrap_or_default(),
                terminator: 13,
            },
            IoCommand::ReadChar { .. } => IoReply::Char(self.char_inputs.pop_front().unwrap_or(13)),
            IoCommand::GetCursor => IoReply::Cursor(Cursor { line: 1, column: 1 }),
            IoCommand::Save { .. } => IoReply::SaveResult(true),
            IoCommand::Restore => IoReply::RestoreResult(None),
            IoCommand::SetFont { .. } => IoReply::FontResult { previous: 1 },
            _ => IoReply::Ack,
        };
        self.log.push(command);
        Ok(reply)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            has_status_line: true,
            has_split_window: true,
            supports_bold: true,
            supports_italic: true,
            supports_fixed_pitch: true,
            supports_timed_input: false,
            supports_colour: false,
            screen_width_chars: 80,
            screen_height_lines: 24,
        }
    }
}
