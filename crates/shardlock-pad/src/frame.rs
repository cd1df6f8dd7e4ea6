//! On-wire chunk framing.
//!
//! Each pad slot carried by a collection is wrapped in one frame:
//!
//! ```text
//! [name_len: u8][name: ASCII "<collection>-<chunk#>"]
//! [payload_len: u32 big-endian][payload: payload_len bytes]
//! ```
//!
//! The name repeats the collection label (which encodes K and N) and the
//! 1-based chunk number, so a decoder can recover the scheme parameters from
//! any frame. The parser is strict: a zero or oversized name length, an
//! unparsable name, an empty payload, or truncation mid-frame all reject the
//! stream.

use std::io::{self, Read, Write};

use zeroize::Zeroize;

use crate::error::CodecError;
use crate::label::CollectionLabel;

/// Upper bound on the frame name length.
pub const MAX_NAME_LEN: usize = 64;

/// A parsed chunk frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The emitting collection.
    pub label: CollectionLabel,
    /// 1-based chunk number.
    pub chunk: u64,
    /// One pad slot's bytes.
    pub payload: Vec<u8>,
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}

/// Write one frame.
///
/// # Errors
///
/// Returns any underlying I/O error.
#[allow(clippy::cast_possible_truncation)]
pub fn write_frame<W: Write + ?Sized>(
    out: &mut W,
    label: CollectionLabel,
    chunk: u64,
    payload: &[u8],
) -> io::Result<()> {
    let name = format!("{label}-{chunk}");
    debug_assert!(name.len() <= MAX_NAME_LEN);
    out.write_all(&[name.len() as u8])?;
    out.write_all(name.as_bytes())?;
    out.write_all(&(payload.len() as u32).to_be_bytes())?;
    out.write_all(payload)
}

/// Pull-parser for a collection's frame sequence with one frame of
/// lookahead.
pub struct FrameReader<R> {
    inner: R,
    peeked: Option<Frame>,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            finished: false,
        }
    }

    /// Look at the next frame without consuming it. `None` means the stream
    /// ended cleanly at a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Frame`] on layout violations and
    /// [`CodecError::Io`] on reader failures.
    pub fn peek(&mut self) -> Result<Option<&Frame>, CodecError> {
        if self.peeked.is_none() && !self.finished {
            match self.read_frame()? {
                Some(frame) => self.peeked = Some(frame),
                None => self.finished = true,
            }
        }
        Ok(self.peeked.as_ref())
    }

    /// Consume and return the next frame.
    ///
    /// # Errors
    ///
    /// As [`FrameReader::peek`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        self.peek()?;
        Ok(self.peeked.take())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        let mut len_byte = [0u8; 1];
        if !read_or_eof(&mut self.inner, &mut len_byte)? {
            return Ok(None);
        }
        let name_len = usize::from(len_byte[0]);
        if name_len == 0 {
            return Err(CodecError::frame("name length is zero"));
        }
        if name_len > MAX_NAME_LEN {
            return Err(CodecError::frame(format!(
                "name length {name_len} exceeds maximum {MAX_NAME_LEN}"
            )));
        }

        let mut name_buf = vec![0u8; name_len];
        read_exact_frame(&mut self.inner, &mut name_buf)?;
        if !name_buf.is_ascii() {
            return Err(CodecError::frame("name is not ASCII"));
        }
        let name = String::from_utf8_lossy(&name_buf);
        let (label_part, chunk_part) = name
            .rsplit_once('-')
            .ok_or_else(|| CodecError::frame(format!("name '{name}' has no chunk number")))?;
        let label: CollectionLabel = label_part
            .parse()
            .map_err(|e| CodecError::frame(format!("name '{name}': {e}")))?;
        let chunk: u64 = chunk_part
            .parse()
            .map_err(|_| CodecError::frame(format!("name '{name}' has a bad chunk number")))?;
        if chunk == 0 {
            return Err(CodecError::frame("chunk numbers are 1-based"));
        }

        let mut len_bytes = [0u8; 4];
        read_exact_frame(&mut self.inner, &mut len_bytes)?;
        let payload_len = u32::from_be_bytes(len_bytes);
        if payload_len == 0 {
            return Err(CodecError::frame("payload length is zero"));
        }
        let mut payload = vec![0u8; payload_len as usize];
        read_exact_frame(&mut self.inner, &mut payload)?;

        Ok(Some(Frame {
            label,
            chunk,
            payload,
        }))
    }
}

/// Fill `buf` exactly, or report a clean EOF if the stream ends before the
/// first byte. Returns `false` on clean EOF.
fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(CodecError::frame("stream truncated mid-frame")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(true)
}

/// Fill `buf` exactly; EOF anywhere inside is a framing error.
fn read_exact_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::frame("stream truncated mid-frame")
        } else {
            CodecError::Io(e)
        }
    })
}
