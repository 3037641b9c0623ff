use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Seek};

use crate::datetime::{decode_packed_datetime, CalendarTime};
use crate::error::Result;
use crate::io_stream::{read_fixed_text, ByteSource};
use crate::render::lossy;

/// Size of the message record that follows a Normal frame header.
pub const MESSAGE_RECORD_SIZE: u32 = 238;
/// Number of "seen-by" frame links kept in each record.
pub const SEEN_LINKS: usize = 9;

/// FidoNet 4D address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NetAddress {
    pub zone:  u16,
    pub net:   u16,
    pub node:  u16,
    pub point: u16,
}

impl NetAddress {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            zone:  reader.read_u16::<LittleEndian>()?,
            net:   reader.read_u16::<LittleEndian>()?,
            node:  reader.read_u16::<LittleEndian>()?,
            point: reader.read_u16::<LittleEndian>()?,
        })
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}.{}", self.zone, self.net, self.node, self.point)
    }
}

/// 238-byte message record.  Text fields keep their raw bytes (usually
/// CP437) up to the first NUL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub attr:         u32,
    #[serde(serialize_with = "lossy")]
    pub from:         Vec<u8>,
    #[serde(serialize_with = "lossy")]
    pub to:           Vec<u8>,
    #[serde(serialize_with = "lossy")]
    pub subject:      Vec<u8>,
    pub orig:         NetAddress,
    pub dest:         NetAddress,
    pub date_written: u16,
    pub time_written: u16,
    pub date_arrived: u16,
    pub time_arrived: u16,
    pub utc_ofs:      i16,
    pub reply_to:     u32,
    pub see:          [u32; SEEN_LINKS],
    pub umsgid:       u32,
    #[serde(serialize_with = "lossy")]
    pub ftsc_date:    Vec<u8>,
}

impl MessageRecord {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let attr = reader.read_u32::<LittleEndian>()?;
        let from = read_fixed_text::<_, 36>(&mut reader)?;
        let to = read_fixed_text::<_, 36>(&mut reader)?;
        let subject = read_fixed_text::<_, 72>(&mut reader)?;
        let orig = NetAddress::read(&mut reader)?;
        let dest = NetAddress::read(&mut reader)?;
        let date_written = reader.read_u16::<LittleEndian>()?;
        let time_written = reader.read_u16::<LittleEndian>()?;
        let date_arrived = reader.read_u16::<LittleEndian>()?;
        let time_arrived = reader.read_u16::<LittleEndian>()?;
        let utc_ofs = reader.read_i16::<LittleEndian>()?;
        let reply_to = reader.read_u32::<LittleEndian>()?;
        let mut see = [0u32; SEEN_LINKS];
        reader.read_u32_into::<LittleEndian>(&mut see)?;
        let umsgid = reader.read_u32::<LittleEndian>()?;
        let ftsc_date = read_fixed_text::<_, 20>(&mut reader)?;
        Ok(Self {
            attr,
            from,
            to,
            subject,
            orig,
            dest,
            date_written,
            time_written,
            date_arrived,
            time_arrived,
            utc_ofs,
            reply_to,
            see,
            umsgid,
            ftsc_date,
        })
    }

    pub fn written(&self) -> CalendarTime {
        decode_packed_datetime(self.date_written, self.time_written)
    }

    pub fn arrived(&self) -> CalendarTime {
        decode_packed_datetime(self.date_arrived, self.time_arrived)
    }
}

/// Decode the message record at the current position of `source`, which
/// must sit just past a Normal frame header.
pub fn decode_message_record<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<MessageRecord> {
    MessageRecord::read(&mut *source)
}
