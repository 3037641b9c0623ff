//! Synthetic `.sqd` images for tests and benchmarks.
//!
//! Frames are laid out back to back from offset 256 in the order they are
//! added; live messages and free frames are linked into separate chains.
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};

pub const FRAME_ID: u32 = 0xAFAE_4453;
pub const HEADER_LEN: usize = 256;
pub const FRAME_HEADER_LEN: usize = 28;
pub const RECORD_LEN: usize = 238;

pub fn pack_date(year: u16, month: u16, day: u16) -> u16 {
    ((year - 1980) << 9) | (month << 5) | day
}

pub fn pack_time(hour: u16, minute: u16, second: u16) -> u16 {
    (hour << 11) | (minute << 5) | (second / 2)
}

fn put_text(out: &mut Vec<u8>, text: &[u8], width: usize) {
    let mut field = vec![0u8; width];
    let n = text.len().min(width);
    field[..n].copy_from_slice(&text[..n]);
    out.extend_from_slice(&field);
}

#[derive(Debug, Clone)]
pub struct Msg {
    kind:      u16,
    attr:      u32,
    from:      Vec<u8>,
    to:        Vec<u8>,
    subject:   Vec<u8>,
    orig:      [u16; 4],
    dest:      [u16; 4],
    written:   (u16, u16),
    arrived:   (u16, u16),
    utc_ofs:   i16,
    reply_to:  u32,
    see:       [u32; 9],
    umsgid:    u32,
    ftsc_date: Vec<u8>,
    ctrl:      Vec<u8>,
    body:      Vec<u8>,
    slack:     u32,
}

impl Msg {
    pub fn new(from: &str, to: &str, subject: &str) -> Self {
        Self::raw(from.as_bytes(), to.as_bytes(), subject.as_bytes())
    }

    /// Names and subject as raw bytes, e.g. CP437 text.
    pub fn raw(from: &[u8], to: &[u8], subject: &[u8]) -> Self {
        let stamp = (pack_date(1996, 6, 23), pack_time(1, 21, 20));
        Self {
            kind:      0,
            attr:      0,
            from:      from.to_vec(),
            to:        to.to_vec(),
            subject:   subject.to_vec(),
            orig:      [0; 4],
            dest:      [0; 4],
            written:   stamp,
            arrived:   stamp,
            utc_ofs:   0,
            reply_to:  0,
            see:       [0; 9],
            umsgid:    0,
            ftsc_date: b"23 Jun 96  01:21:20".to_vec(),
            ctrl:      Vec::new(),
            body:      Vec::new(),
            slack:     0,
        }
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kind = kind;
        self
    }

    pub fn attr(mut self, attr: u32) -> Self {
        self.attr = attr;
        self
    }

    pub fn orig(mut self, addr: [u16; 4]) -> Self {
        self.orig = addr;
        self
    }

    pub fn dest(mut self, addr: [u16; 4]) -> Self {
        self.dest = addr;
        self
    }

    pub fn written(mut self, date: u16, time: u16) -> Self {
        self.written = (date, time);
        self
    }

    pub fn arrived(mut self, date: u16, time: u16) -> Self {
        self.arrived = (date, time);
        self
    }

    pub fn utc_ofs(mut self, minutes: i16) -> Self {
        self.utc_ofs = minutes;
        self
    }

    pub fn reply_to(mut self, umsgid: u32) -> Self {
        self.reply_to = umsgid;
        self
    }

    pub fn umsgid(mut self, umsgid: u32) -> Self {
        self.umsgid = umsgid;
        self
    }

    pub fn ctrl(mut self, ctrl: &[u8]) -> Self {
        self.ctrl = ctrl.to_vec();
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Unused bytes left at the end of the frame.
    pub fn slack(mut self, bytes: u32) -> Self {
        self.slack = bytes;
        self
    }

    fn msg_len(&self) -> u32 {
        (RECORD_LEN + self.ctrl.len() + self.body.len()) as u32
    }

    fn frame_len(&self) -> u32 {
        self.msg_len() + self.slack
    }

    fn encode_record(&self, out: &mut Vec<u8>) {
        out.write_u32::<LittleEndian>(self.attr).unwrap();
        put_text(out, &self.from, 36);
        put_text(out, &self.to, 36);
        put_text(out, &self.subject, 72);
        for part in self.orig.iter().chain(self.dest.iter()) {
            out.write_u16::<LittleEndian>(*part).unwrap();
        }
        for word in [self.written.0, self.written.1, self.arrived.0, self.arrived.1] {
            out.write_u16::<LittleEndian>(word).unwrap();
        }
        out.write_i16::<LittleEndian>(self.utc_ofs).unwrap();
        out.write_u32::<LittleEndian>(self.reply_to).unwrap();
        for link in self.see {
            out.write_u32::<LittleEndian>(link).unwrap();
        }
        out.write_u32::<LittleEndian>(self.umsgid).unwrap();
        put_text(out, &self.ftsc_date, 20);
    }
}

#[derive(Debug, Clone)]
pub struct BaseBuilder {
    base:     Vec<u8>,
    frames:   Vec<(Msg, bool)>,
    high_msg: Option<u32>,
}

impl BaseBuilder {
    pub fn new(base: &str) -> Self {
        Self { base: base.as_bytes().to_vec(), frames: Vec::new(), high_msg: None }
    }

    /// Append a frame to the live chain.
    pub fn message(mut self, msg: Msg) -> Self {
        self.frames.push((msg, false));
        self
    }

    /// Append a Free frame to the free chain.
    pub fn free(mut self, msg: Msg) -> Self {
        self.frames.push((msg.kind(1), true));
        self
    }

    pub fn high_msg(mut self, high_msg: u32) -> Self {
        self.high_msg = Some(high_msg);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_offsets().0
    }

    /// The image plus each frame's offset, in the order frames were added.
    pub fn build_with_offsets(self) -> (Vec<u8>, Vec<u32>) {
        let mut offsets = Vec::with_capacity(self.frames.len());
        let mut at = HEADER_LEN as u32;
        for (msg, _) in &self.frames {
            offsets.push(at);
            at += FRAME_HEADER_LEN as u32 + msg.frame_len();
        }
        let end = at;

        let chain = |free: bool| -> Vec<usize> {
            (0..self.frames.len()).filter(|&i| self.frames[i].1 == free).collect()
        };
        let live = chain(false);
        let spare = chain(true);

        let mut next = vec![0u32; self.frames.len()];
        let mut prev = vec![0u32; self.frames.len()];
        for list in [&live, &spare] {
            for pair in list.windows(2) {
                next[pair[0]] = offsets[pair[1]];
                prev[pair[1]] = offsets[pair[0]];
            }
        }
        let first = |list: &[usize]| list.first().map_or(0, |&i| offsets[i]);
        let last = |list: &[usize]| list.last().map_or(0, |&i| offsets[i]);

        let num_msg = live.len() as u32;
        let mut out = Vec::with_capacity(end as usize);
        out.write_u16::<LittleEndian>(HEADER_LEN as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(num_msg).unwrap();
        out.write_u32::<LittleEndian>(self.high_msg.unwrap_or(num_msg)).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap(); // skip_msg
        out.write_u32::<LittleEndian>(0).unwrap(); // high_water
        out.write_u32::<LittleEndian>(num_msg + 1).unwrap(); // uid
        put_text(&mut out, &self.base, 80);
        for link in [first(&live), last(&live), first(&spare), last(&spare), end] {
            out.write_u32::<LittleEndian>(link).unwrap();
        }
        out.write_u32::<LittleEndian>(0).unwrap(); // max_msg
        out.write_u16::<LittleEndian>(0).unwrap(); // keep_days
        out.write_u16::<LittleEndian>(FRAME_HEADER_LEN as u16).unwrap();
        out.resize(HEADER_LEN, 0);

        for (i, (msg, _)) in self.frames.iter().enumerate() {
            out.write_u32::<LittleEndian>(FRAME_ID).unwrap();
            out.write_u32::<LittleEndian>(next[i]).unwrap();
            out.write_u32::<LittleEndian>(prev[i]).unwrap();
            out.write_u32::<LittleEndian>(msg.frame_len()).unwrap();
            out.write_u32::<LittleEndian>(msg.msg_len()).unwrap();
            out.write_u32::<LittleEndian>(msg.ctrl.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(msg.kind).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            msg.encode_record(&mut out);
            out.extend_from_slice(&msg.ctrl);
            out.extend_from_slice(&msg.body);
            out.resize(out.len() + msg.slack as usize, 0);
        }
        debug_assert_eq!(out.len(), end as usize);
        (out, offsets)
    }
}
