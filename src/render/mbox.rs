//! Export the live messages to a Unix mbox file.
//!
//! The live chain is walked oldest → newest.  Export stops at the first
//! frame that is not a Normal frame; anything linked after it is not
//! converted (logged as a warning).
//!
//! ## Message layout
//!
//! ```text
//! From localhost Sun Jun 23 01:21:20 1996
//! From: Josh Lewis <fidonet@localhost>
//! To: Jeff Roule <fidonet@localhost>
//! Subject: Help me
//! Date: Sun, 23 Jun 1996 01:21:20 +0000
//! Content-Type: text/plain;
//! X-Converted-by: squish 1.0.0
//! Message-ID: <1:2/3@abcd0123>
//!
//! body text…
//!
//! ```

use chrono::{DateTime, Utc};
use std::io::{Read, Seek, Write};

use crate::chain::{BoundsPolicy, FrameChain, Link};
use crate::content::{segment, ControlBlock, CONTROL_BYTE};
use crate::error::Result;
use crate::io_stream::ByteSource;
use crate::message::MessageRecord;
use crate::superblock::MessageBaseHeader;

pub const CONVERTER: &str = env!("CARGO_PKG_NAME");
pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

const ENVELOPE_DATE: &str = "%a %b %d %H:%M:%S %Y";
const HEADER_DATE: &str = "%a, %d %b %Y %H:%M:%S";
const ORIGIN_PREFIX: &[u8] = b" * Origin: ";
const SEEN_BY_PREFIX: &[u8] = b"SEEN-BY: ";

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MboxOptions {
    /// Write body bytes above 0x7E as `=<decimal>`.
    pub strip_high_bit: bool,
    /// Copy the control block into the body as `^A` lines.
    pub control_lines:  bool,
    /// Host for the envelope, the synthetic addresses and generated ids.
    pub host:           String,
    /// Local part of the synthetic `From:` / `To:` addresses.
    pub user:           String,
}

impl Default for MboxOptions {
    fn default() -> Self {
        Self {
            strip_high_bit: true,
            control_lines:  false,
            host:           "localhost".into(),
            user:           "fidonet".into(),
        }
    }
}

/// Counts reported after an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub converted:  usize,
    /// Offset of the non-Normal frame that ended the export early.
    pub stopped_at: Option<u32>,
}

// ── Message ids ──────────────────────────────────────────────────────────────

/// Replace `@` with `#`, then spaces with `@`, so a FidoNet MSGID reads as
/// an RFC 822 message id.
pub fn escape_msgid(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .map(|&b| match b {
            b'@' => b'#',
            b' ' => b'@',
            other => other,
        })
        .collect()
}

/// Synthesises ids for messages that carry no MSGID.
///
/// Ids look like `19960623012120.GA0@localhost`: the UTC time of the call,
/// a letter cycling A..Z and a counter, both advancing per id.
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    letter:  u8,
    counter: u64,
    host:    String,
}

impl MessageIdGenerator {
    pub fn new(host: impl Into<String>) -> Self {
        Self { letter: b'A', counter: 0, host: host.into() }
    }

    pub fn next_id(&mut self, now: DateTime<Utc>) -> String {
        let id = format!(
            "{}.G{}{}@{}",
            now.format("%Y%m%d%H%M%S"),
            char::from(self.letter),
            self.counter,
            self.host
        );
        self.counter += 1;
        self.letter = if self.letter == b'Z' { b'A' } else { self.letter + 1 };
        id
    }
}

// ── Body ─────────────────────────────────────────────────────────────────────

/// Writes one message's body lines.  Lives for a single message, so the
/// Origin flag never leaks into the next one.
#[derive(Debug)]
pub struct BodyWriter {
    strip_high_bit: bool,
    seen_origin:    bool,
}

impl BodyWriter {
    pub fn new(strip_high_bit: bool) -> Self {
        Self { strip_high_bit, seen_origin: false }
    }

    pub fn write_line<W: Write>(&mut self, out: &mut W, line: &[u8]) -> Result<()> {
        if line.first() == Some(&CONTROL_BYTE) {
            return Ok(());
        }
        if self.seen_origin && line.starts_with(SEEN_BY_PREFIX) {
            return Ok(());
        }
        if line.starts_with(ORIGIN_PREFIX) {
            self.seen_origin = true;
        }

        let mut buf = Vec::with_capacity(line.len() + 2);
        if line.starts_with(b"From ") {
            buf.push(b'>');
        }
        for &b in line {
            if self.strip_high_bit && b > 0x7e {
                buf.extend_from_slice(format!("={b}").as_bytes());
            } else {
                buf.push(b);
            }
        }
        buf.push(b'\n');
        out.write_all(&buf)?;
        Ok(())
    }
}

// ── Exporter ─────────────────────────────────────────────────────────────────

pub struct MboxExporter {
    options: MboxOptions,
    ids:     MessageIdGenerator,
}

impl MboxExporter {
    pub fn new(options: MboxOptions) -> Self {
        let ids = MessageIdGenerator::new(options.host.clone());
        Self { options, ids }
    }

    /// Write one message.  `payload` is the control block followed by the
    /// body; `now` stamps a generated Message-ID if one is needed.
    pub fn write_message<W: Write>(
        &mut self,
        out:      &mut W,
        message:  &MessageRecord,
        ctrl_len: u32,
        payload:  &[u8],
        now:      DateTime<Utc>,
    ) -> Result<()> {
        let opts = &self.options;
        let written = message.written().to_utc();
        let (control, body) = segment(payload, ctrl_len);

        let mut head = Vec::new();
        writeln!(head, "From {} {}", opts.host, written.format(ENVELOPE_DATE))?;
        address_line(&mut head, "From", &message.from, opts)?;
        address_line(&mut head, "To", &message.to, opts)?;
        if !message.subject.is_empty() {
            head.extend_from_slice(b"Subject: ");
            head.extend_from_slice(&message.subject);
            head.push(b'\n');
        }
        writeln!(head, "Date: {} +0000", written.format(HEADER_DATE))?;
        writeln!(head, "Content-Type: text/plain;")?;
        writeln!(head, "X-Converted-by: {CONVERTER} {CONVERTER_VERSION}")?;

        head.extend_from_slice(b"Message-ID: <");
        match control.msgid() {
            Some(id) => head.extend_from_slice(&escape_msgid(id)),
            None => head.extend_from_slice(self.ids.next_id(now).as_bytes()),
        }
        head.extend_from_slice(b">\n");
        if let Some(reply) = control.reply() {
            head.extend_from_slice(b"In-Reply-To: <");
            head.extend_from_slice(&escape_msgid(reply));
            head.extend_from_slice(b">\n");
        }
        head.push(b'\n');
        out.write_all(&head)?;

        if self.options.control_lines {
            write_control_lines(out, &control)?;
        }
        let mut body_writer = BodyWriter::new(self.options.strip_high_bit);
        for line in body {
            body_writer.write_line(out, line)?;
        }
        out.write_all(b"\n")?;
        Ok(())
    }

    /// Convert the live chain of `source` into `out`.
    pub fn export<R, W>(&mut self, source: &mut ByteSource<R>, header: &MessageBaseHeader, out: &mut W) -> Result<ExportSummary>
    where
        R: Read + Seek,
        W: Write,
    {
        let mut summary = ExportSummary::default();
        let chain = FrameChain::new(source, header.first_frame, Link::Next)
            .policy(BoundsPolicy::Trusting)
            .with_payload();

        for entry in chain {
            let entry = entry?;
            let (Some(message), Some(payload)) = (entry.message.as_ref(), entry.payload.as_deref()) else {
                log::warn!(
                    "stopping at {} (0x{:08x}); later messages were not converted",
                    entry.frame.kind.describe(),
                    entry.offset
                );
                summary.stopped_at = Some(entry.offset);
                break;
            };
            self.write_message(out, message, entry.frame.ctrl_len, payload, Utc::now())?;
            summary.converted += 1;
            log::info!("{}/{}", summary.converted, header.num_msg);
        }
        Ok(summary)
    }
}

/// Export with a fresh exporter.
pub fn export<R, W>(
    source:  &mut ByteSource<R>,
    header:  &MessageBaseHeader,
    out:     &mut W,
    options: MboxOptions,
) -> Result<ExportSummary>
where
    R: Read + Seek,
    W: Write,
{
    MboxExporter::new(options).export(source, header, out)
}

fn address_line(head: &mut Vec<u8>, field: &str, name: &[u8], opts: &MboxOptions) -> Result<()> {
    write!(head, "{field}: ")?;
    head.extend_from_slice(name);
    writeln!(head, " <{}@{}>", opts.user, opts.host)?;
    Ok(())
}

fn write_control_lines<W: Write>(out: &mut W, control: &ControlBlock) -> Result<()> {
    for entry in &control.entries {
        let mut line = Vec::with_capacity(entry.raw.len() + 2);
        line.push(CONTROL_BYTE);
        line.extend_from_slice(&entry.raw);
        line.push(b'\n');
        out.write_all(&line)?;
    }
    Ok(())
}
