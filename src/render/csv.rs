//! CSV index of the live messages, newest first.
//!
//! Each row is
//! `"<frame offset>","<fingerprint>","<from>","<to>","<subject>","<YYYY-MM-DD HH:MM:SS>"`.
//! The fingerprint is two `h * 31 + byte` hashes printed as at least eight
//! hex digits each: one over the date text, one over the sum of the from, to
//! and subject hashes.  Hashes wrap at 32 bits by default; [`HashWidth::Bits64`]
//! accumulates in 64 bits, matching indexes produced on LP64 hosts
//! (`7e9aebf9c3a91be0e9104abd01d65` rather than `c3a91be0abd01d65`).

use chrono::{Local, TimeZone};
use std::fmt::Display;
use std::io::{Read, Seek, Write};

use crate::chain::{BoundsPolicy, FrameChain, Link};
use crate::error::Result;
use crate::io_stream::ByteSource;
use crate::message::MessageRecord;
use crate::superblock::MessageBaseHeader;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the fingerprint accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashWidth {
    #[default]
    Bits32,
    Bits64,
}

/// Polynomial string hash, `h = h * 31 + byte`, wrapping at 32 bits.
pub fn str_hash(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

/// [`str_hash`] wrapping at 64 bits.
pub fn str_hash_wide(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

pub fn fingerprint(date: &[u8], from: &[u8], to: &[u8], subject: &[u8]) -> String {
    fingerprint_with(HashWidth::Bits32, date, from, to, subject)
}

pub fn fingerprint_with(width: HashWidth, date: &[u8], from: &[u8], to: &[u8], subject: &[u8]) -> String {
    match width {
        HashWidth::Bits32 => {
            let names = str_hash(from)
                .wrapping_add(str_hash(to))
                .wrapping_add(str_hash(subject));
            format!("{:08x}{:08x}", str_hash(date), names)
        }
        HashWidth::Bits64 => {
            let names = str_hash_wide(from)
                .wrapping_add(str_hash_wide(to))
                .wrapping_add(str_hash_wide(subject));
            format!("{:08x}{:08x}", str_hash_wide(date), names)
        }
    }
}

/// Double every `"` and `\`.
pub fn escape_field(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        out.push(b);
        if b == b'"' || b == b'\\' {
            out.push(b);
        }
    }
    out
}

/// Write one index row for the message at `offset`.
pub fn write_row<W: Write>(
    out:     &mut W,
    offset:  u32,
    message: &MessageRecord,
    date:    &str,
    width:   HashWidth,
) -> Result<()> {
    let offset = offset.to_string();
    let hash = fingerprint_with(width, date.as_bytes(), &message.from, &message.to, &message.subject);
    let from = escape_field(&message.from);
    let to = escape_field(&message.to);
    let subject = escape_field(&message.subject);
    let fields: [&[u8]; 6] = [offset.as_bytes(), hash.as_bytes(), &from, &to, &subject, date.as_bytes()];

    let mut line = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(b',');
        }
        line.push(b'"');
        line.extend_from_slice(field);
        line.push(b'"');
    }
    line.push(b'\n');
    out.write_all(&line)?;
    Ok(())
}

/// Date text for a message: the written time read as wall-clock time in `tz`.
pub fn index_date<Tz: TimeZone>(message: &MessageRecord, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    message.written().in_zone(tz).format(DATE_FORMAT).to_string()
}

/// Write the index for every Normal frame of the live chain, walking back
/// from `last_frame`.  Returns the number of rows written.
pub fn render_index<R, W>(source: &mut ByteSource<R>, header: &MessageBaseHeader, out: &mut W) -> Result<usize>
where
    R: Read + Seek,
    W: Write,
{
    render_index_in(source, header, out, &Local, HashWidth::default())
}

/// [`render_index`] with dates interpreted in an explicit zone and an
/// explicit fingerprint width.
pub fn render_index_in<R, W, Tz>(
    source: &mut ByteSource<R>,
    header: &MessageBaseHeader,
    out:    &mut W,
    tz:     &Tz,
    width:  HashWidth,
) -> Result<usize>
where
    R: Read + Seek,
    W: Write,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut rows = 0;
    let chain = FrameChain::new(source, header.last_frame, Link::Prev).policy(BoundsPolicy::Trusting);
    for entry in chain {
        let entry = entry?;
        match entry.message {
            Some(ref message) => {
                write_row(out, entry.offset, message, &index_date(message, tz), width)?;
                rows += 1;
            }
            None => log::debug!("skipping {} at 0x{:08x}", entry.frame.kind.describe(), entry.offset),
        }
    }
    Ok(rows)
}
