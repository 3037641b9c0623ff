use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Read, Seek};

use crate::error::{Result, SquishError};
use crate::io_stream::{read_fixed_text, ByteSource};
use crate::render::lossy;

/// Fixed size of the base header at offset 0.
pub const BASE_HEADER_SIZE: u16 = 256;
/// Frame header size every known writer declares in `sz_sqhdr`.
pub const FRAME_HEADER_SIZE: u16 = 28;

/// The 256-byte header at the start of every `.sqd` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageBaseHeader {
    pub size:             u16,
    pub reserved1:        u16,
    pub num_msg:          u32,
    pub high_msg:         u32,
    pub skip_msg:         u32,
    pub high_water:       u32,
    pub uid:              u32,
    #[serde(serialize_with = "lossy")]
    pub base:             Vec<u8>,
    pub first_frame:      u32,
    pub last_frame:       u32,
    pub first_free_frame: u32,
    pub last_free_frame:  u32,
    pub end_frame:        u32,
    pub max_msg:          u32,
    pub keep_days:        u16,
    pub frame_header_size: u16,
}

impl MessageBaseHeader {
    /// Decode the header from `reader` at its current position.  Fails as
    /// soon as the declared size is not 256, before anything else is read.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let size = reader.read_u16::<LittleEndian>()?;
        if size != BASE_HEADER_SIZE {
            return Err(SquishError::HeaderSize { found: size, expected: BASE_HEADER_SIZE });
        }
        Self::read_fields(size, reader)
    }

    /// Decode every field whatever size the header declares, for diagnostics.
    pub fn read_raw<R: Read>(mut reader: R) -> Result<Self> {
        let size = reader.read_u16::<LittleEndian>()?;
        Self::read_fields(size, reader)
    }

    fn read_fields<R: Read>(size: u16, mut reader: R) -> Result<Self> {
        let reserved1 = reader.read_u16::<LittleEndian>()?;
        let num_msg = reader.read_u32::<LittleEndian>()?;
        let high_msg = reader.read_u32::<LittleEndian>()?;
        let skip_msg = reader.read_u32::<LittleEndian>()?;
        let high_water = reader.read_u32::<LittleEndian>()?;
        let uid = reader.read_u32::<LittleEndian>()?;
        let base = read_fixed_text::<_, 80>(&mut reader)?;
        let first_frame = reader.read_u32::<LittleEndian>()?;
        let last_frame = reader.read_u32::<LittleEndian>()?;
        let first_free_frame = reader.read_u32::<LittleEndian>()?;
        let last_free_frame = reader.read_u32::<LittleEndian>()?;
        let end_frame = reader.read_u32::<LittleEndian>()?;
        let max_msg = reader.read_u32::<LittleEndian>()?;
        let keep_days = reader.read_u16::<LittleEndian>()?;
        let frame_header_size = reader.read_u16::<LittleEndian>()?;
        let mut reserved = [0u8; 124];
        reader.read_exact(&mut reserved)?;
        Ok(Self {
            size,
            reserved1,
            num_msg,
            high_msg,
            skip_msg,
            high_water,
            uid,
            base,
            first_frame,
            last_frame,
            first_free_frame,
            last_free_frame,
            end_frame,
            max_msg,
            keep_days,
            frame_header_size,
        })
    }

    pub fn size_ok(&self) -> bool {
        self.size == BASE_HEADER_SIZE
    }

    /// `high_msg` should always track `num_msg`.
    pub fn counts_consistent(&self) -> bool {
        self.high_msg == self.num_msg
    }

    /// Fail unless the base declares the 28-byte frame header.
    pub fn require_frame_header_size(&self) -> Result<()> {
        if self.frame_header_size != FRAME_HEADER_SIZE {
            return Err(SquishError::FrameHeaderSize {
                found:    self.frame_header_size,
                expected: FRAME_HEADER_SIZE,
            });
        }
        Ok(())
    }
}

/// Read the base header from offset 0 of `source`.
pub fn decode_header<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<MessageBaseHeader> {
    source.seek_to(0)?;
    let header = MessageBaseHeader::read(&mut *source)?;
    if !header.counts_consistent() {
        log::warn!(
            "base header high_msg {} does not match num_msg {}",
            header.high_msg, header.num_msg
        );
    }
    Ok(header)
}
