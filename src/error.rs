//! Error type shared by every decoder, traversal and renderer.
//!
//! Variants fall into four kinds (see [`ErrorKind`]) so the binary can map a
//! failure to a distinct exit status: usage mistakes, malformed headers,
//! corrupt frames, and plain I/O trouble.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SquishError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("I/O error reading frame at 0x{offset:08x}: {source}")]
    FrameIo {
        offset: u32,
        #[source]
        source: io::Error,
    },

    #[error("base header declares size {found}, expected {expected}")]
    HeaderSize { found: u16, expected: u16 },

    #[error("base header declares frame header size {found}, expected {expected}")]
    FrameHeaderSize { found: u16, expected: u16 },

    #[error("bad frame id 0x{found:08x} at offset 0x{offset:08x} (expected 0xafae4453)")]
    BadFrameId { offset: u32, found: u32 },

    #[error("frame offset too high (offset=0x{offset:08x} filesize=0x{file_size:08x})")]
    OffsetOutOfBounds { offset: u32, file_size: u64 },

    #[error("frame at 0x{offset:08x}: {reason}")]
    FrameLength { offset: u32, reason: String },

    #[error("frame chain loops back to offset 0x{offset:08x}")]
    ChainCycle { offset: u32 },

    #[error("{0}")]
    Usage(String),
}

/// Coarse classification used for exit codes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Io,
    Format,
    CorruptFrame,
}

impl SquishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SquishError::Io(_) | SquishError::FrameIo { .. } => ErrorKind::Io,
            SquishError::HeaderSize { .. } | SquishError::FrameHeaderSize { .. } => ErrorKind::Format,
            SquishError::BadFrameId { .. }
            | SquishError::OffsetOutOfBounds { .. }
            | SquishError::FrameLength { .. }
            | SquishError::ChainCycle { .. } => ErrorKind::CorruptFrame,
            SquishError::Usage(_) => ErrorKind::Usage,
        }
    }

    /// sysexits-style status: 64 usage, 65 bad data, 74 I/O.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Usage => 64,
            ErrorKind::Format | ErrorKind::CorruptFrame => 65,
            ErrorKind::Io => 74,
        }
    }

    /// Attach a frame offset to a bare I/O error.
    pub(crate) fn at_frame(offset: u32) -> impl FnOnce(SquishError) -> SquishError {
        move |e| match e {
            SquishError::Io(source) => SquishError::FrameIo { offset, source },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SquishError>;
