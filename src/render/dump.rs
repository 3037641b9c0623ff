//! Field-by-field structure dump for inspecting damaged bases.
//!
//! Prints the base header, then walks the stored (live) list and the free
//! list from their first offsets with strict bounds checks.  Every frame on
//! the way is shown with its header and, for Normal frames, its message
//! record and control entries.  A list ends early at an out-of-range offset,
//! a bad frame id, inconsistent lengths or a truncated body; the other list
//! is still dumped.
//!
//! Two output forms share one traversal through [`DumpSink`]:
//!
//! | Form | Sink |
//! |------|------|
//! | labelled text | [`TextSink`] |
//! | JSON Lines    | [`JsonSink`] |

use serde::Serialize;
use std::io::{self, Read, Seek, Write};

use crate::chain::{BoundsPolicy, FrameChain, Link};
use crate::content::{ControlBlock, CONTROL_BYTE};
use crate::datetime::CalendarTime;
use crate::error::{Result, SquishError};
use crate::frame::{Frame, FRAME_ID};
use crate::io_stream::ByteSource;
use crate::message::MessageRecord;
use crate::superblock::{decode_header, MessageBaseHeader, BASE_HEADER_SIZE};

#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Emit JSON Lines instead of labelled text.
    pub json: bool,
}

/// The two frame lists a base keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameList {
    Stored,
    Free,
}

impl FrameList {
    pub fn label(self) -> &'static str {
        match self {
            FrameList::Stored => "Stored",
            FrameList::Free => "Free",
        }
    }
}

/// Receives the pieces of a dump in file order.
pub trait DumpSink {
    fn header(&mut self, header: &MessageBaseHeader) -> Result<()>;

    fn empty_list(&mut self, list: FrameList) -> Result<()>;

    fn frame(
        &mut self,
        list:    FrameList,
        offset:  u32,
        frame:   &Frame,
        message: Option<&MessageRecord>,
        control: Option<&ControlBlock>,
    ) -> Result<()>;

    /// The list ended early because of `error`.
    fn stopped(&mut self, list: FrameList, error: &SquishError) -> Result<()>;
}

// ── Traversal ────────────────────────────────────────────────────────────────

/// Dump `source` into `out` in the form chosen by `options`.
pub fn dump<R, W>(source: &mut ByteSource<R>, out: &mut W, options: &DumpOptions) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    if options.json {
        walk(source, &mut JsonSink::new(out))
    } else {
        walk(source, &mut TextSink::new(out))
    }
}

pub fn walk<R, S>(source: &mut ByteSource<R>, sink: &mut S) -> Result<()>
where
    R: Read + Seek,
    S: DumpSink,
{
    let header = match decode_header(source) {
        Ok(header) => header,
        Err(error @ SquishError::HeaderSize { .. }) => {
            // Show what the header declares, but read no frames.
            let raw = source
                .seek_to(0)
                .map_err(SquishError::from)
                .and_then(|()| MessageBaseHeader::read_raw(&mut *source));
            if let Ok(raw) = raw {
                sink.header(&raw)?;
            }
            return Err(error);
        }
        Err(e) => return Err(e),
    };
    sink.header(&header)?;
    walk_list(source, sink, FrameList::Stored, header.first_frame)?;
    walk_list(source, sink, FrameList::Free, header.first_free_frame)
}

fn walk_list<R, S>(source: &mut ByteSource<R>, sink: &mut S, list: FrameList, start: u32) -> Result<()>
where
    R: Read + Seek,
    S: DumpSink,
{
    if start == 0 {
        return sink.empty_list(list);
    }

    let mut failure = None;
    let chain = FrameChain::new(source, start, Link::Next)
        .policy(BoundsPolicy::Strict)
        .with_optional_payload();
    for entry in chain {
        match entry {
            Ok(entry) => {
                let control = entry.payload.as_deref().map(|payload| {
                    let split = (entry.frame.ctrl_len as usize).min(payload.len());
                    ControlBlock::parse(&payload[..split])
                });
                sink.frame(list, entry.offset, &entry.frame, entry.message.as_ref(), control.as_ref())?;
                // The frame and record are shown even when the body is cut short.
                if let Some(error) = entry.payload_error {
                    return sink.stopped(list, &error);
                }
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let Some(error) = failure else {
        return Ok(());
    };
    match error {
        SquishError::BadFrameId { offset, .. } | SquishError::FrameLength { offset, .. } => {
            // Show the raw header that was rejected before giving up on the list.
            if let Ok(frame) = source.seek_to(u64::from(offset)).and_then(|()| read_raw_frame(source)) {
                sink.frame(list, offset, &frame, None, None)?;
            }
            sink.stopped(list, &error)
        }
        SquishError::OffsetOutOfBounds { .. } | SquishError::ChainCycle { .. } => sink.stopped(list, &error),
        other => Err(other),
    }
}

fn read_raw_frame<R: Read + Seek>(source: &mut ByteSource<R>) -> io::Result<Frame> {
    Frame::read(&mut *source).map_err(|e| match e {
        SquishError::Io(io) => io,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    })
}

/// `YYYY-MM-DD HH:MM:SS` from the raw fields, without normalisation.
fn raw_calendar(t: &CalendarTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        t.year,
        t.month(),
        t.day,
        t.hour,
        t.minute,
        t.second
    )
}

// ── Text ─────────────────────────────────────────────────────────────────────

const DIVIDER: &str = "------------------------------------------------------------------------------";

pub struct TextSink<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> TextSink<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        Self { out }
    }

    fn title(&mut self, name: &str) -> io::Result<()> {
        write!(self.out, "Dump of {name} structure\n{DIVIDER}\n\n")
    }

    fn field(&mut self, name: &str, value: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{name:<15}: {value}")
    }

    fn offset_field(&mut self, name: &str, value: u32) -> io::Result<()> {
        writeln!(self.out, "{name:<15}: 0x{value:08x} ({value})")
    }

    fn bytes_field(&mut self, name: &str, value: &[u8], quoted: bool) -> io::Result<()> {
        write!(self.out, "{name:<15}: ")?;
        if quoted {
            self.out.write_all(b"\"")?;
        }
        self.out.write_all(value)?;
        if quoted {
            self.out.write_all(b"\"")?;
        }
        self.out.write_all(b"\n")
    }

    fn date_field(&mut self, name: &str, date: u16, time: u16, decoded: &CalendarTime) -> io::Result<()> {
        writeln!(self.out, "{name:<15}: {date:04X}h {time:04X}h ({})", raw_calendar(decoded))
    }

    fn message(&mut self, m: &MessageRecord) -> io::Result<()> {
        write!(self.out, "\n\n")?;
        self.title("SQXMSG")?;
        writeln!(self.out, "{:<15}: 0x{:08x} ({})", "attr", m.attr, m.attr)?;
        self.bytes_field("orig_user", &m.from, true)?;
        self.field("orig_addr", m.orig)?;
        self.bytes_field("dest_user", &m.to, true)?;
        self.field("dest_addr", m.dest)?;
        self.bytes_field("subject", &m.subject, true)?;
        self.date_field("date/time writ", m.date_written, m.time_written, &m.written())?;
        self.date_field("date/time ariv", m.date_arrived, m.time_arrived, &m.arrived())?;
        self.field("utc_ofs", m.utc_ofs)?;
        self.field("replyto", m.reply_to)?;
        let see: Vec<String> = m.see.iter().map(u32::to_string).collect();
        self.field("see", see.join(" "))?;
        self.field("umsgid", m.umsgid)?;
        self.bytes_field("ftsc_date", &m.ftsc_date, true)
    }
}

impl<'w, W: Write> DumpSink for TextSink<'w, W> {
    fn header(&mut self, h: &MessageBaseHeader) -> Result<()> {
        self.title("SQBASE")?;
        if h.size_ok() {
            self.field("sz_sqbase", h.size)?;
        } else {
            self.field("sz_sqbase", format!("{} (Should be {BASE_HEADER_SIZE}!)", h.size))?;
        }
        self.field("sz_rsvd1", h.reserved1)?;
        self.field("num_msg", h.num_msg)?;
        if h.counts_consistent() {
            self.field("high_msg", h.high_msg)?;
        } else {
            self.field("high_msg", format!("{} (Should be {}!)", h.high_msg, h.num_msg))?;
        }
        self.field("skip_msg", h.skip_msg)?;
        self.field("high_water", h.high_water)?;
        self.field("uid", h.uid)?;
        self.bytes_field("base", &h.base, false)?;
        self.offset_field("first_frame", h.first_frame)?;
        self.offset_field("last_frame", h.last_frame)?;
        self.offset_field("first_free_frm", h.first_free_frame)?;
        self.offset_field("last_free_frm", h.last_free_frame)?;
        self.offset_field("end_frame", h.end_frame)?;
        self.field("max_msg", h.max_msg)?;
        self.field("sz_sqhdr", h.frame_header_size)?;
        self.field("keep_days", h.keep_days)?;
        Ok(())
    }

    fn empty_list(&mut self, list: FrameList) -> Result<()> {
        writeln!(self.out, "\n{} list is empty.", list.label())?;
        Ok(())
    }

    fn frame(
        &mut self,
        _list:   FrameList,
        offset:  u32,
        frame:   &Frame,
        message: Option<&MessageRecord>,
        control: Option<&ControlBlock>,
    ) -> Result<()> {
        writeln!(self.out, "\n\nCurrent frame offset: 0x{offset:08x} ({offset})")?;
        write!(self.out, "\n\n")?;
        self.title("SQFRAME")?;
        let check = if frame.id_ok() { "OK".to_string() } else { format!("Should be 0x{FRAME_ID:08x}!") };
        writeln!(self.out, "{:<15}: 0x{:08x} ({check})\n", "frame_id", frame.id)?;
        self.offset_field("next_frame", frame.next_frame)?;
        self.offset_field("prev_frame", frame.prev_frame)?;
        self.field("frame_len", frame.frame_len)?;
        self.field("msg_len", frame.msg_len)?;
        self.field("ctrl_len", frame.ctrl_len)?;
        writeln!(self.out, "{:<15}: {} ({})\n", "frame_type", frame.kind.tag(), frame.kind.describe())?;

        if let Some(message) = message {
            self.message(message)?;
        }
        if let Some(control) = control {
            for entry in &control.entries {
                let mut line = vec![CONTROL_BYTE];
                line.extend_from_slice(&entry.raw);
                self.bytes_field("control", &line, false)?;
            }
        }
        Ok(())
    }

    fn stopped(&mut self, _list: FrameList, error: &SquishError) -> Result<()> {
        match error {
            SquishError::OffsetOutOfBounds { offset, file_size } => {
                writeln!(self.out, "\nFrame offset too high (Offset=0x{offset:08x} Filesize=0x{file_size:08x})")?
            }
            // The frame dump already carries the "Should be" note.
            SquishError::BadFrameId { .. } => {}
            other => writeln!(self.out, "\n{other}")?,
        }
        Ok(())
    }
}

// ── JSON Lines ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessageView<'a> {
    #[serde(flatten)]
    record:  &'a MessageRecord,
    written: String,
    arrived: String,
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum DumpRecord<'a> {
    Header {
        header:            &'a MessageBaseHeader,
        size_ok:           bool,
        counts_consistent: bool,
    },
    EmptyList {
        list: FrameList,
    },
    Frame {
        list:    FrameList,
        offset:  u32,
        id_ok:   bool,
        kind:    &'static str,
        frame:   &'a Frame,
        message: Option<MessageView<'a>>,
        control: Vec<String>,
    },
    Stopped {
        list:  FrameList,
        error: String,
    },
}

pub struct JsonSink<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> JsonSink<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        Self { out }
    }

    fn emit(&mut self, record: &DumpRecord<'_>) -> Result<()> {
        serde_json::to_writer(&mut *self.out, record).map_err(io::Error::from)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<'w, W: Write> DumpSink for JsonSink<'w, W> {
    fn header(&mut self, header: &MessageBaseHeader) -> Result<()> {
        self.emit(&DumpRecord::Header {
            header,
            size_ok: header.size_ok(),
            counts_consistent: header.counts_consistent(),
        })
    }

    fn empty_list(&mut self, list: FrameList) -> Result<()> {
        self.emit(&DumpRecord::EmptyList { list })
    }

    fn frame(
        &mut self,
        list:    FrameList,
        offset:  u32,
        frame:   &Frame,
        message: Option<&MessageRecord>,
        control: Option<&ControlBlock>,
    ) -> Result<()> {
        let message = message.map(|record| MessageView {
            record,
            written: raw_calendar(&record.written()),
            arrived: raw_calendar(&record.arrived()),
        });
        let control = control
            .map(|c| c.entries.iter().map(|e| String::from_utf8_lossy(&e.raw).into_owned()).collect())
            .unwrap_or_default();
        self.emit(&DumpRecord::Frame {
            list,
            offset,
            id_ok: frame.id_ok(),
            kind: frame.kind.describe(),
            frame,
            message,
            control,
        })
    }

    fn stopped(&mut self, list: FrameList, error: &SquishError) -> Result<()> {
        self.emit(&DumpRecord::Stopped { list, error: error.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{pack_date, pack_time, BaseBuilder, Msg};
    use std::io::Cursor;

    fn text_dump(bytes: Vec<u8>) -> String {
        let mut src = ByteSource::new(Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        dump(&mut src, &mut out, &DumpOptions::default()).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn header_fields_are_labelled() {
        let text = text_dump(BaseBuilder::new("echo").message(Msg::new("a", "b", "c")).build());
        assert!(text.starts_with("Dump of SQBASE structure\n-----"));
        assert!(text.contains("\nsz_sqbase      : 256\n"));
        assert!(text.contains("\nhigh_msg       : 1\n"));
        assert!(text.contains("\nbase           : echo\n"));
        assert!(text.contains("\nfirst_frame    : 0x00000100 (256)\n"));
        assert!(text.contains("\nsz_sqhdr       : 28\n"));
        assert!(text.contains("\n\nCurrent frame offset: 0x00000100 (256)\n"));
        assert!(text.contains("\nframe_id       : 0xafae4453 (OK)\n\n"));
        assert!(text.contains("\nframe_type     : 0 (Normal frame)\n\n"));
        assert!(text.ends_with("\nFree list is empty.\n"));
    }

    #[test]
    fn annotates_count_mismatch() {
        let text = text_dump(BaseBuilder::new("x").message(Msg::new("a", "b", "c")).high_msg(3).build());
        assert!(text.contains("\nhigh_msg       : 3 (Should be 1!)\n"));
    }

    #[test]
    fn message_record_shows_raw_and_decoded_dates() {
        let date = pack_date(1996, 6, 23);
        let time = pack_time(1, 21, 20);
        let text = text_dump(
            BaseBuilder::new("x")
                .message(Msg::new("Josh Lewis", "Jeff Roule", "Help me").orig([1, 2, 3, 0]).ctrl(b"\x01PID: t"))
                .build(),
        );
        assert!(text.contains("\norig_user      : \"Josh Lewis\"\n"));
        assert!(text.contains("\norig_addr      : 1:2/3.0\n"));
        assert!(text.contains(&format!("\ndate/time writ : {date:04X}h {time:04X}h (1996-06-23 01:21:20)\n")));
        assert!(text.contains("\nsee            : 0 0 0 0 0 0 0 0 0\n"));
        assert!(text.contains("\nftsc_date      : \"23 Jun 96  01:21:20\"\n"));
        assert!(text.contains("\ncontrol        : \x01PID: t\n"));
    }

    #[test]
    fn raw_month_is_not_normalised() {
        let text = text_dump(
            BaseBuilder::new("x").message(Msg::new("a", "b", "c").written(0, 0)).build(),
        );
        assert!(text.contains("(1980-00-00 00:00:00)"));
    }

    #[test]
    fn out_of_range_offset_ends_list() {
        let (mut bytes, offs) = BaseBuilder::new("x").message(Msg::new("a", "b", "c")).build_with_offsets();
        let at = offs[0] as usize + 4;
        bytes[at..at + 4].copy_from_slice(&0x0001_0000u32.to_le_bytes());
        let len = bytes.len();
        let text = text_dump(bytes);
        assert!(text.contains(&format!(
            "\nFrame offset too high (Offset=0x00010000 Filesize=0x{len:08x})\n"
        )));
        assert!(text.ends_with("\nFree list is empty.\n"));
    }

    #[test]
    fn bad_frame_id_is_shown_then_list_ends() {
        let (mut bytes, offs) = BaseBuilder::new("x")
            .message(Msg::new("a", "b", "c"))
            .message(Msg::new("a", "b", "d"))
            .build_with_offsets();
        let at = offs[1] as usize;
        bytes[at..at + 4].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        let text = text_dump(bytes);
        assert!(text.contains("\nframe_id       : 0xdeadbeef (Should be 0xafae4453!)\n"));
        assert_eq!(text.matches("Current frame offset").count(), 2);
        assert!(!text.contains("subject        : \"d\""));
    }

    #[test]
    fn truncated_body_shows_frame_then_free_list() {
        let (bytes, offs) = BaseBuilder::new("x")
            .message(Msg::new("a", "b", "c").body(b"first\r"))
            .message(Msg::new("a", "b", "f").body(b"hello world\r"))
            .build_with_offsets();
        let cut = offs[1] as usize + 28 + 238 + 5;
        let text = text_dump(bytes[..cut].to_vec());

        assert_eq!(text.matches("Current frame offset").count(), 2);
        assert!(text.contains("\nsubject        : \"f\"\n"));
        assert!(text.contains(&format!("\nI/O error reading frame at 0x{:08x}: ", offs[1])));
        assert!(text.contains("payload runs past end of file"));
        assert!(text.ends_with("\nFree list is empty.\n"));
    }

    #[test]
    fn wrong_header_size_is_shown_before_failing() {
        let mut bytes = BaseBuilder::new("echo").message(Msg::new("a", "b", "c")).build();
        bytes[0..2].copy_from_slice(&300u16.to_le_bytes());
        let mut src = ByteSource::new(Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        let err = dump(&mut src, &mut out, &DumpOptions::default()).unwrap_err();
        assert!(matches!(err, SquishError::HeaderSize { found: 300, expected: 256 }));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\nsz_sqbase      : 300 (Should be 256!)\n"));
        assert!(text.contains("\nbase           : echo\n"));
        assert!(!text.contains("Current frame offset"));
    }

    #[test]
    fn free_list_is_walked() {
        let text = text_dump(
            BaseBuilder::new("x").message(Msg::new("a", "b", "c")).free(Msg::new("x", "y", "z")).build(),
        );
        assert!(text.contains("\nframe_type     : 1 (Free frame)\n"));
        assert!(!text.contains("list is empty"));
    }

    #[test]
    fn json_lines_cover_every_record() {
        let bytes = BaseBuilder::new("x").message(Msg::new("a", "b", "c").ctrl(b"\x01MSGID: 1:1/1 1")).build();
        let mut src = ByteSource::new(Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        dump(&mut src, &mut out, &DumpOptions { json: true }).unwrap();

        let records: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["record"], "header");
        assert_eq!(records[0]["header"]["num_msg"], 1);
        assert_eq!(records[0]["size_ok"], true);
        assert_eq!(records[1]["record"], "frame");
        assert_eq!(records[1]["list"], "stored");
        assert_eq!(records[1]["kind"], "Normal frame");
        assert_eq!(records[1]["message"]["to"], "b");
        assert_eq!(records[1]["message"]["written"], "1996-06-23 01:21:20");
        assert_eq!(records[1]["control"][0], "MSGID: 1:1/1 1");
        assert_eq!(records[2]["record"], "empty_list");
        assert_eq!(records[2]["list"], "free");
    }
}
