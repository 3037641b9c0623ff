//! Lazy traversal of offset-linked frame chains.
//!
//! A Squish base keeps two doubly linked lists on disk: the live messages
//! (anchored by `first_frame` / `last_frame`) and the free list.  Links are
//! absolute file offsets and 0 ends a chain.  [`FrameChain`] follows one
//! link direction, decoding each frame on demand; nothing is cached between
//! steps except the set of offsets already visited, which turns a looping
//! chain into a [`SquishError::ChainCycle`] instead of an endless walk.
//!
//! ## Bounds policy
//!
//! | Policy | Behaviour on an offset beyond the file |
//! |--------|----------------------------------------|
//! | `Strict` | yields `OffsetOutOfBounds` without seeking, then stops |
//! | `Trusting` | seeks anyway; the failing read surfaces as an I/O error |

use std::collections::HashSet;
use std::io::{self, Read, Seek};

use crate::error::{Result, SquishError};
use crate::frame::{decode_frame, Frame, FRAME_HEADER_LEN};
use crate::io_stream::ByteSource;
use crate::message::{decode_message_record, MessageRecord, MESSAGE_RECORD_SIZE};

/// Which stored link to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `next_frame`: oldest to newest.
    Next,
    /// `prev_frame`: newest to oldest.
    Prev,
}

impl Link {
    fn follow(self, frame: &Frame) -> u32 {
        match self {
            Link::Next => frame.next_frame,
            Link::Prev => frame.prev_frame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    Strict,
    #[default]
    Trusting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadMode {
    Skip,
    Required,
    Optional,
}

/// One decoded step of a traversal.
#[derive(Debug)]
pub struct ChainEntry {
    pub offset:  u32,
    pub frame:   Frame,
    /// Present only for Normal frames.
    pub message: Option<MessageRecord>,
    /// Control block plus body, when the chain loads payloads and the frame
    /// is Normal.
    pub payload: Option<Vec<u8>>,
    /// Why an optional payload could not be read.
    pub payload_error: Option<SquishError>,
}

pub struct FrameChain<'a, R: Read + Seek> {
    source:       &'a mut ByteSource<R>,
    next:         u32,
    link:         Link,
    policy:       BoundsPolicy,
    payload:      PayloadMode,
    visited:      HashSet<u32>,
    done:         bool,
}

impl<'a, R: Read + Seek> FrameChain<'a, R> {
    pub fn new(source: &'a mut ByteSource<R>, start: u32, link: Link) -> Self {
        log::debug!("walking frame chain from 0x{start:08x} via {link:?}");
        Self {
            source,
            next: start,
            link,
            policy: BoundsPolicy::default(),
            payload: PayloadMode::Skip,
            visited: HashSet::new(),
            done: false,
        }
    }

    pub fn policy(mut self, policy: BoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Also read the control block and body of every Normal frame.  A
    /// payload that cannot be read ends the chain with an error.
    pub fn with_payload(mut self) -> Self {
        self.payload = PayloadMode::Required;
        self
    }

    /// Like [`with_payload`](Self::with_payload), but a payload that cannot
    /// be read leaves the entry without one and sets `payload_error`.
    pub fn with_optional_payload(mut self) -> Self {
        self.payload = PayloadMode::Optional;
        self
    }

    fn read_payload(&mut self, offset: u32, frame: &Frame) -> Result<Vec<u8>> {
        let len = u64::from(frame.ctrl_len) + u64::from(frame.body_len());
        let start = u64::from(offset) + u64::from(FRAME_HEADER_LEN) + u64::from(MESSAGE_RECORD_SIZE);
        if start + len > self.source.len() {
            let source = io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{len}-byte payload runs past end of file ({} bytes)", self.source.len()),
            );
            return Err(SquishError::FrameIo { offset, source });
        }
        self.source
            .read_exact_vec(len as usize)
            .map_err(|source| SquishError::FrameIo { offset, source })
    }

    fn step(&mut self, offset: u32) -> Result<ChainEntry> {
        if self.policy == BoundsPolicy::Strict && u64::from(offset) > self.source.len() {
            return Err(SquishError::OffsetOutOfBounds { offset, file_size: self.source.len() });
        }
        if !self.visited.insert(offset) {
            return Err(SquishError::ChainCycle { offset });
        }

        let frame = decode_frame(&mut *self.source, offset)?;
        let mut entry = ChainEntry { offset, frame, message: None, payload: None, payload_error: None };
        if !entry.frame.is_normal() {
            return Ok(entry);
        }

        entry.message = Some(decode_message_record(&mut *self.source).map_err(SquishError::at_frame(offset))?);
        if self.payload != PayloadMode::Skip {
            match self.read_payload(offset, &entry.frame) {
                Ok(bytes) => entry.payload = Some(bytes),
                Err(e) if self.payload == PayloadMode::Optional => entry.payload_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Ok(entry)
    }
}

impl<'a, R: Read + Seek> Iterator for FrameChain<'a, R> {
    type Item = Result<ChainEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next == 0 {
            return None;
        }
        match self.step(self.next) {
            Ok(entry) => {
                self.next = self.link.follow(&entry.frame);
                Some(Ok(entry))
            }
            Err(e) => {
                log::debug!("frame chain stopped: {e}");
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
