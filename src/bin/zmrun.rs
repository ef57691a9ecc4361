//! Minimal terminal front-end: reads a story file path from the command
//! line and drives the interpreter's pump API against stdin/stdout. Not a
//! full-featured player (no split windows, no styled text) — just enough to
//! exercise the core end to end.

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use zmcore::error::ZResult;
use zmcore::header::ScreenGeometry;
use zmcore::io::{IoCommand, IoProvider, IoReply, ProviderCapabilities};
use zmcore::{ExecutionResult, PendingInputKind, ZMachine};

struct TerminalProvider {
    stdin: io::Stdin,
}

impl IoProvider for TerminalProvider {
    fn dispatch(&mut self, command: IoCommand) -> ZResult<IoReply> {
        match command {
            IoCommand::Print { text } => {
                print!("{text}");
                let _ = io::stdout().flush();
                Ok(IoReply::Ack)
            }
            IoCommand::Status { location, score, moves, .. } => {
                eprintln!("[{location}  Score: {score}  Moves: {moves}]");
                Ok(IoReply::Ack)
            }
            IoCommand::ReadLine { .. } => {
                let mut line = String::new();
                self.stdin.lock().read_line(&mut line).map_err(|e| zmcore::ZError::Io(e.to_string()))?;
                Ok(IoReply::Line { text: line.trim_end_matches('\n').to_string(), terminator: 13 })
            }
            IoCommand::ReadChar { .. } => {
                let mut buf = [0u8; 1];
                use io::Read;
                self.stdin.lock().read_exact(&mut buf).map_err(|e| zmcore::ZError::Io(e.to_string()))?;
                Ok(IoReply::Char(buf[0]))
            }
            IoCommand::Save { data } => {
                fs::write("zmcore.sav", data).map_err(|e| zmcore::ZError::Io(e.to_string()))?;
                Ok(IoReply::SaveResult(true))
            }
            IoCommand::Restore => match fs::read("zmcore.sav") {
                Ok(data) => Ok(IoReply::RestoreResult(Some(data))),
                Err(_) => Ok(IoReply::RestoreResult(None)),
            },
            IoCommand::GetCursor => Ok(IoReply::Cursor(zmcore::io::Cursor { line: 1, column: 1 })),
            IoCommand::SetFont { .. } => Ok(IoReply::FontResult { previous: 1 }),
            IoCommand::Quit => {
                println!();
                Ok(IoReply::Ack)
            }
            _ => Ok(IoReply::Ack),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            has_status_line: true,
            has_split_window: false,
            supports_bold: false,
            supports_italic: false,
            supports_fixed_pitch: false,
            supports_timed_input: false,
            supports_colour: false,
            screen_width_chars: 80,
            screen_height_lines: 24,
        }
    }
}

fn run() -> ZResult<()> {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: zmrun <story-file>");
        std::process::exit(2);
    });
    let bytes = fs::read(&path).map_err(|e| zmcore::ZError::Io(format!("reading {path}: {e}")))?;

    let mut zm = ZMachine::load(bytes, ScreenGeometry::default())?;
    let mut provider = TerminalProvider { stdin: io::stdin() };

    loop {
        match zm.interpreter.run_until_input(&mut provider)? {
            ExecutionResult::Quit | ExecutionResult::GameOver => break,
            _ => match zm.interpreter.pending_input_kind() {
                Some(PendingInputKind::Char) => {
                    let mut buf = [0u8; 1];
                    use io::Read;
                    if provider.stdin.lock().read_exact(&mut buf).is_err() {
                        break;
                    }
                    zm.interpreter.submit_char_input(buf[0])?;
                }
                Some(PendingInputKind::Line) | None => {
                    let mut line = String::new();
                    if provider.stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    zm.interpreter.submit_line_input(line.trim_end_matches('\n'))?;
                }
            },
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zmrun: {e}");
            ExitCode::FAILURE
        }
    }
}
