//! Rebuild the `.sqi` index that Squish readers keep next to a `.sqd` file.
//!
//! The index is a flat array of 12-byte little-endian records, one per live
//! message in chain order:
//!
//! | Offset | Field | Notes |
//! |--------|-------|-------|
//! | 0 | frame offset | |
//! | 4 | umsgid | from the message record |
//! | 8 | to-name hash | [`squish_hash`] |

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Read, Seek, Write};

use crate::chain::{BoundsPolicy, FrameChain, Link};
use crate::error::Result;
use crate::io_stream::{nul_trimmed, ByteSource};
use crate::superblock::MessageBaseHeader;

pub const SQI_RECORD_LEN: usize = 12;

/// PJW-style hash Squish uses for recipient names.  Case-insensitive for
/// ASCII; stops at the first NUL.
pub fn squish_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in nul_trimmed(name) {
        h = (h << 4).wrapping_add(u32::from(b.to_ascii_lowercase()));
        let g = h & 0xf000_0000;
        if g != 0 {
            h |= g >> 24;
            h |= g;
        }
    }
    h & 0x7fff_ffff
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqiRecord {
    pub frame_offset: u32,
    pub umsgid:       u32,
    pub hash:         u32,
}

impl SqiRecord {
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.frame_offset)?;
        writer.write_u32::<LittleEndian>(self.umsgid)?;
        writer.write_u32::<LittleEndian>(self.hash)?;
        Ok(())
    }
}

/// Write one record per Normal frame of the live chain.  Returns the
/// number of records written.
pub fn write_index<R, W>(source: &mut ByteSource<R>, header: &MessageBaseHeader, out: &mut W) -> Result<usize>
where
    R: Read + Seek,
    W: Write,
{
    header.require_frame_header_size()?;

    let mut count = 0;
    for entry in FrameChain::new(source, header.first_frame, Link::Next).policy(BoundsPolicy::Trusting) {
        let entry = entry?;
        let Some(message) = entry.message else {
            log::debug!("no index record for {} at 0x{:08x}", entry.frame.kind.describe(), entry.offset);
            continue;
        };
        let record = SqiRecord {
            frame_offset: entry.offset,
            umsgid:       message.umsgid,
            hash:         squish_hash(&message.to),
        };
        log::debug!(
            "frame 0x{:08x} umsgid {} hash 0x{:08x}",
            record.frame_offset, record.umsgid, record.hash
        );
        record.write(&mut *out)?;
        count += 1;
    }
    Ok(count)
}
