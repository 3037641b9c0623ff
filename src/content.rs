//! Split a frame's trailing payload into its control block and body text.
//!
//! The control block is a run of entries each introduced by a 0x01 byte
//! ("kludge lines").  The body is CR-delimited text; tear, Origin and
//! SEEN-BY lines are ordinary body text here and are recognised later by
//! the renderers.

use crate::datetime::parse_tzutc;

pub const CONTROL_BYTE: u8 = 0x01;
pub const LINE_END: u8 = b'\r';

/// Control keys the readers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    MsgId,
    Reply,
    Pid,
    TzUtc,
    Chrs,
}

impl ControlKey {
    const ALL: [ControlKey; 5] = [
        ControlKey::MsgId,
        ControlKey::Reply,
        ControlKey::Pid,
        ControlKey::TzUtc,
        ControlKey::Chrs,
    ];

    pub fn prefix(self) -> &'static [u8] {
        match self {
            ControlKey::MsgId => b"MSGID: ",
            ControlKey::Reply => b"REPLY: ",
            ControlKey::Pid => b"PID: ",
            ControlKey::TzUtc => b"TZUTC: ",
            ControlKey::Chrs => b"CHRS: ",
        }
    }

    fn classify(entry: &[u8]) -> Option<ControlKey> {
        Self::ALL.into_iter().find(|key| entry.starts_with(key.prefix()))
    }
}

/// One control entry with its leading 0x01 removed.  Unrecognised entries
/// keep `key == None` and are otherwise untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEntry {
    pub key: Option<ControlKey>,
    pub raw: Vec<u8>,
}

impl ControlEntry {
    /// Text after the recognised `KEY: ` prefix.
    pub fn value(&self) -> Option<&[u8]> {
        self.key.map(|key| &self.raw[key.prefix().len()..])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    pub entries: Vec<ControlEntry>,
}

impl ControlBlock {
    pub fn parse(segment: &[u8]) -> Self {
        let entries = until_nul(segment)
            .split(|&b| b == CONTROL_BYTE)
            .filter(|piece| !piece.is_empty())
            .map(|piece| ControlEntry { key: ControlKey::classify(piece), raw: piece.to_vec() })
            .collect();
        Self { entries }
    }

    /// Value of the first entry carrying `key`.
    pub fn first(&self, key: ControlKey) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key == Some(key))
            .and_then(ControlEntry::value)
    }

    pub fn msgid(&self) -> Option<&[u8]> {
        self.first(ControlKey::MsgId)
    }

    pub fn reply(&self) -> Option<&[u8]> {
        self.first(ControlKey::Reply)
    }

    pub fn pid(&self) -> Option<&[u8]> {
        self.first(ControlKey::Pid)
    }

    pub fn charset(&self) -> Option<&[u8]> {
        self.first(ControlKey::Chrs)
    }

    /// Writer's UTC offset in minutes from a `TZUTC` entry.
    pub fn tz_utc_minutes(&self) -> Option<i32> {
        let value = self.first(ControlKey::TzUtc)?;
        parse_tzutc(std::str::from_utf8(value).ok()?)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Single-pass iterator over CR-delimited body lines.
#[derive(Debug)]
pub struct BodyLines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> BodyLines<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { rest: Some(until_nul(body)) }
    }
}

impl<'a> Iterator for BodyLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        let line = match rest.iter().position(|&b| b == LINE_END) {
            Some(end) => {
                self.rest = Some(&rest[end + 1..]);
                &rest[..end]
            }
            None => {
                self.rest = None;
                if rest.is_empty() {
                    return None;
                }
                rest
            }
        };
        // CRLF bodies leave the LF at the start of the following line.
        Some(line.strip_prefix(b"\n").unwrap_or(line))
    }
}

/// Split a payload: the first `control_length` bytes are the control block,
/// the rest is body text.
pub fn segment(payload: &[u8], control_length: u32) -> (ControlBlock, BodyLines<'_>) {
    let split = (control_length as usize).min(payload.len());
    let (control, body) = payload.split_at(split);
    (ControlBlock::parse(control), BodyLines::new(body))
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    crate::io_stream::nul_trimmed(bytes)
}
