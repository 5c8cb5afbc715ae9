use std::fmt;

use crate::Command;
use crate::enums::*;
use crate::types::*;

/// a non-zero `glGetError` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    InvalidFramebufferOperation,
    ContextLost,
    Unknown(GLenum),
}

impl ErrorCode {
    /// `None` for `GL_NO_ERROR`.
    pub fn from_raw(code: GLenum) -> Option<Self> {
        let code = match code {
            NO_ERROR => return None,
            INVALID_ENUM => Self::InvalidEnum,
            INVALID_VALUE => Self::InvalidValue,
            INVALID_OPERATION => Self::InvalidOperation,
            STACK_OVERFLOW => Self::StackOverflow,
            STACK_UNDERFLOW => Self::StackUnderflow,
            OUT_OF_MEMORY => Self::OutOfMemory,
            INVALID_FRAMEBUFFER_OPERATION => Self::InvalidFramebufferOperation,
            CONTEXT_LOST => Self::ContextLost,
            other => Self::Unknown(other),
        };
        Some(code)
    }

    pub fn raw(self) -> GLenum {
        match self {
            Self::InvalidEnum => INVALID_ENUM,
            Self::InvalidValue => INVALID_VALUE,
            Self::InvalidOperation => INVALID_OPERATION,
            Self::StackOverflow => STACK_OVERFLOW,
            Self::StackUnderflow => STACK_UNDERFLOW,
            Self::OutOfMemory => OUT_OF_MEMORY,
            Self::InvalidFramebufferOperation => INVALID_FRAMEBUFFER_OPERATION,
            Self::ContextLost => CONTEXT_LOST,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidEnum => "GL_INVALID_ENUM",
            Self::InvalidValue => "GL_INVALID_VALUE",
            Self::InvalidOperation => "GL_INVALID_OPERATION",
            Self::StackOverflow => "GL_STACK_OVERFLOW",
            Self::StackUnderflow => "GL_STACK_UNDERFLOW",
            Self::OutOfMemory => "GL_OUT_OF_MEMORY",
            Self::InvalidFramebufferOperation => "GL_INVALID_FRAMEBUFFER_OPERATION",
            Self::ContextLost => "GL_CONTEXT_LOST",
            Self::Unknown(code) => return write!(f, "unknown gl error 0x{code:x}"),
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{command} is not loaded")]
    NotLoaded { command: Command },
    #[error("{command} raised {code}")]
    Gl { command: Command, code: ErrorCode },
    #[error("could not parse version")]
    Version(#[from] khronos_version::Error),
    #[error("string 0x{name:x} is not available")]
    NullString { name: GLenum },
    #[error("length {len} does not fit into a gl size")]
    LengthOverflow { len: usize },
    #[error("string is not valid utf-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("{command} failed, the mapping is unusable")]
    MapFailed { command: Command },
}

impl Error {
    /// the gl error code, if that is what this is.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Gl { code, .. } => Some(*code),
            _ => None,
        }
    }
}
