use serde::Serialize;
use std::io::{Read, Seek};

use crate::error::{Result, SquishError};
use crate::io_stream::{le_u16, le_u32, ByteSource};
use crate::message::MESSAGE_RECORD_SIZE;

/// Identifier stored in the first four bytes of every frame.
pub const FRAME_ID: u32 = 0xAFAE_4453;
/// Size of the frame header on disk.
pub const FRAME_HEADER_LEN: u32 = 28;

/// Frame type tag at offset 24 of the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameKind {
    Normal,
    Free,
    /// LZSS-compressed message; recognised but never decoded.
    Compressed,
    /// In-place update record; recognised but never decoded.
    Update,
    Unknown(u16),
}

impl From<u16> for FrameKind {
    fn from(tag: u16) -> Self {
        match tag {
            0 => FrameKind::Normal,
            1 => FrameKind::Free,
            2 => FrameKind::Compressed,
            3 => FrameKind::Update,
            other => FrameKind::Unknown(other),
        }
    }
}

impl FrameKind {
    pub fn tag(self) -> u16 {
        match self {
            FrameKind::Normal => 0,
            FrameKind::Free => 1,
            FrameKind::Compressed => 2,
            FrameKind::Update => 3,
            FrameKind::Unknown(tag) => tag,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FrameKind::Normal => "Normal frame",
            FrameKind::Free => "Free frame",
            FrameKind::Compressed => "LZSS frame",
            FrameKind::Update => "Frame update",
            FrameKind::Unknown(_) => "Unknown",
        }
    }
}

/// 28-byte frame header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub id:         u32,
    pub next_frame: u32,
    pub prev_frame: u32,
    pub frame_len:  u32,
    pub msg_len:    u32,
    pub ctrl_len:   u32,
    pub kind:       FrameKind,
}

impl Frame {
    /// Decode a frame header from `reader` without validating it.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; FRAME_HEADER_LEN as usize];
        reader.read_exact(&mut buf)?;
        Ok(Self {
            id:         le_u32(&buf, 0)?,
            next_frame: le_u32(&buf, 4)?,
            prev_frame: le_u32(&buf, 8)?,
            frame_len:  le_u32(&buf, 12)?,
            msg_len:    le_u32(&buf, 16)?,
            ctrl_len:   le_u32(&buf, 20)?,
            kind:       FrameKind::from(le_u16(&buf, 24)?),
        })
    }

    pub fn id_ok(&self) -> bool {
        self.id == FRAME_ID
    }

    pub fn is_normal(&self) -> bool {
        self.kind == FrameKind::Normal
    }

    /// Length of the message text that follows the control block.
    ///
    /// `msg_len` counts the 238-byte message record, the control block and
    /// the text; a zero `msg_len` means an empty message.
    pub fn body_len(&self) -> u32 {
        if self.msg_len == 0 {
            0
        } else {
            self.msg_len.saturating_sub(self.ctrl_len.saturating_add(MESSAGE_RECORD_SIZE))
        }
    }

    /// Check the length fields of a Normal frame against each other.
    pub fn check_lengths(&self, offset: u32) -> Result<()> {
        let fail = |reason: String| Err(SquishError::FrameLength { offset, reason });
        let fixed = u64::from(MESSAGE_RECORD_SIZE) + u64::from(self.ctrl_len);

        if self.msg_len != 0 && fixed > u64::from(self.msg_len) {
            return fail(format!(
                "control length {} plus message record exceeds message length {}",
                self.ctrl_len, self.msg_len
            ));
        }
        if self.msg_len > self.frame_len {
            return fail(format!(
                "message length {} exceeds frame length {}",
                self.msg_len, self.frame_len
            ));
        }
        if fixed > u64::from(self.frame_len) {
            return fail(format!(
                "control length {} plus message record exceeds frame length {}",
                self.ctrl_len, self.frame_len
            ));
        }
        Ok(())
    }
}

/// Seek to `offset` and decode the frame header there.  The frame id must
/// match [`FRAME_ID`]; Normal frames must also have consistent lengths.
pub fn decode_frame<R: Read + Seek>(source: &mut ByteSource<R>, offset: u32) -> Result<Frame> {
    let frame = source
        .seek_to(u64::from(offset))
        .map_err(SquishError::from)
        .and_then(|()| Frame::read(&mut *source))
        .map_err(SquishError::at_frame(offset))?;

    if !frame.id_ok() {
        return Err(SquishError::BadFrameId { offset, found: frame.id });
    }
    if frame.is_normal() {
        frame.check_lengths(offset)?;
    }
    Ok(frame)
}
