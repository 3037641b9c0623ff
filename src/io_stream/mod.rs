//! Seekable byte source for message-base files.
//!
//! # Reader
//! [`ByteSource`] wraps any `Read + Seek` stream, measures its length once,
//! and offers absolute seeks that refuse to move past the end of the data.
//! Every read is exact: a short read surfaces as
//! `io::ErrorKind::UnexpectedEof` and is never silently truncated.
//!
//! # Field extraction
//! [`le_u16`] and [`le_u32`] pull little-endian integers out of a buffer
//! that was just read.  A buffer too short for the requested field yields
//! the same `UnexpectedEof` error instead of indexing out of bounds.
//!
//! # Text fields
//! Names, subjects and dates are fixed-width, NUL-padded byte fields kept
//! verbatim (no charset conversion) up to the first NUL.
//!
//! # Endianness
//! All Squish integers are little-endian.  No runtime negotiation is ever
//! performed.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ByteSource<R: Read + Seek> {
    inner: R,
    len:   u64,
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap `inner`, recording its length and rewinding to offset 0.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    /// Total length of the underlying data in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute seek.  Seeking exactly to the end is allowed (the next read
    /// will fail); seeking beyond it is an error.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.len {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!(
                "seek to offset {offset} past end of file ({} bytes)",
                self.len
            )));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Read exactly `n` bytes from the current position.
    pub fn read_exact_vec(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek> Read for ByteSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

// ── Field helpers ────────────────────────────────────────────────────────────

/// Little-endian `u16` at byte `at` of `buf`.
pub fn le_u16(buf: &[u8], at: usize) -> io::Result<u16> {
    let mut field = buf.get(at..).unwrap_or(&[]);
    field.read_u16::<LittleEndian>()
}

/// Little-endian `u32` at byte `at` of `buf`.
pub fn le_u32(buf: &[u8], at: usize) -> io::Result<u32> {
    let mut field = buf.get(at..).unwrap_or(&[]);
    field.read_u32::<LittleEndian>()
}

/// The bytes of a fixed-width, NUL-padded text field up to its first NUL.
pub fn nul_trimmed(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None      => field,
    }
}

/// Read a fixed-width text field and keep it verbatim up to the first NUL.
pub fn read_fixed_text<R: Read, const N: usize>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut raw = [0u8; N];
    reader.read_exact(&mut raw)?;
    Ok(nul_trimmed(&raw).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn seek_past_end_is_an_error() {
        let mut src = ByteSource::new(Cursor::new(vec![0u8; 16])).unwrap();
        assert_eq!(src.len(), 16);
        assert!(src.seek_to(16).is_ok());
        let err = src.seek_to(17).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn short_read_is_reported() {
        let mut src = ByteSource::new(Cursor::new(vec![1u8, 2, 3])).unwrap();
        src.seek_to(1).unwrap();
        let err = src.read_exact_vec(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn reads_little_endian_fields() {
        let buf = [0x53, 0x44, 0xae, 0xaf, 0x00, 0x01];
        assert_eq!(le_u32(&buf, 0).unwrap(), 0xafae_4453);
        assert_eq!(le_u16(&buf, 4).unwrap(), 0x0100);
    }

    #[test]
    fn trims_at_first_nul() {
        assert_eq!(nul_trimmed(b"Josh\0Lewis\0"), b"Josh");
        assert_eq!(nul_trimmed(b"full"), b"full");
        assert_eq!(nul_trimmed(b"\0\0"), b"");
    }

    proptest! {
        #[test]
        fn short_buffers_never_read_out_of_bounds(buf in prop::collection::vec(any::<u8>(), 0..8), at in 0usize..10) {
            match le_u32(&buf, at) {
                Ok(_)  => prop_assert!(at + 4 <= buf.len()),
                Err(e) => {
                    prop_assert!(at + 4 > buf.len());
                    prop_assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
                }
            }
            match le_u16(&buf, at) {
                Ok(_)  => prop_assert!(at + 2 <= buf.len()),
                Err(e) => prop_assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            }
        }

        #[test]
        fn fixed_text_stops_at_nul(raw in prop::collection::vec(any::<u8>(), 36)) {
            let mut reader = Cursor::new(raw.clone());
            let text = read_fixed_text::<_, 36>(&mut reader).unwrap();
            prop_assert!(!text.contains(&0));
            prop_assert!(raw.starts_with(&text));
            prop_assert_eq!(reader.position(), 36);
        }

        #[test]
        fn fixed_text_needs_full_width(len in 0usize..36) {
            let mut reader = Cursor::new(vec![b'a'; len]);
            let err = read_fixed_text::<_, 36>(&mut reader).unwrap_err();
            prop_assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        }
    }
}
