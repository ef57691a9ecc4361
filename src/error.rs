//! Classified errors for the core. Every fallible core operation returns
//! `Result<_, ZError>` rather than a bare `String`, so callers can branch on
//! error kind instead of pattern-matching message text.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessKind {
    OutOfBounds,
    WriteToNonDynamic,
}

impl std::fmt::Display for MemoryAccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryAccessKind::OutOfBounds => write!(f, "out of bounds"),
            MemoryAccessKind::WriteToNonDynamic => write!(f, "write to non-dynamic memory"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ZError {
    #[error("malformed story file: {reason}")]
    MalformedStory { reason: String },

    #[error("illegal memory access at {addr:#06x}: {kind}")]
    IllegalMemoryAccess { addr: u32, kind: MemoryAccessKind },

    #[error("illegal execution at pc {pc:#06x}: {reason}")]
    IllegalExecution { pc: u32, reason: String },

    #[error("unsupported {form} opcode {opcode:#04x} at pc {pc:#06x}")]
    UnsupportedOpcode {
        pc: u32,
        opcode: u8,
        form: &'static str,
    },

    #[error("stack underflow at pc {pc:#06x}")]
    StackUnderflow { pc: u32 },

    #[error("call stack overflow at pc {pc:#06x}")]
    CallStackOverflow { pc: u32 },

    #[error("i/o failure: {0}")]
    Io(String),
}

pub type ZResult<T> = Result<T, ZError>;

impl ZError {
    pub fn illegal(pc: u32, reason: impl Into<String>) -> ZError {
        ZError::IllegalExecution {
            pc,
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> ZError {
        ZError::MalformedStory {
            reason: reason.into(),
        }
    }

    pub fn oob(addr: u32) -> ZError {
        ZError::IllegalMemoryAccess {
            addr,
            kind: MemoryAccessKind::OutOfBounds,
        }
    }

    pub fn non_dynamic_write(addr: u32) -> ZError {
        ZError::IllegalMemoryAccess {
            addr,
            kind: MemoryAccessKind::WriteToNonDynamic,
        }
    }
}
