//! PNG steganographic wrapper.
//!
//! A chunk file in PNG format is a valid 1x1 transparent image carrying the
//! real payload in a custom ancillary chunk of type `rAWd`:
//!
//! ```text
//! [len: u32 BE]["rAWd"][payload][crc32: u32 BE]
//! ```
//!
//! The CRC uses the PNG polynomial over `type || payload`, so any standard
//! PNG tool preserves the chunk and any bit flip inside it is detectable.
//! Extraction scans for the first `rAWd` occurrence, mirroring the original
//! injection point right before IEND.

use std::io::Write;
use std::sync::OnceLock;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FormatError;

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PAYLOAD_TYPE: &[u8; 4] = b"rAWd";
/// IEND is a fixed 12-byte trailer: zero length, type, CRC.
const IEND_LEN: usize = 12;
/// Per-chunk framing overhead: length, type, CRC.
const CHUNK_OVERHEAD: usize = 12;

fn append_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// The carrier image: a complete 1x1 transparent RGBA PNG.
fn base_image() -> &'static [u8] {
    static BASE: OnceLock<Vec<u8>> = OnceLock::new();
    BASE.get_or_init(|| {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(&SIGNATURE);

        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        // depth 8, color type 6 (RGBA), default compression/filter, no interlace
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        append_chunk(&mut out, b"IHDR", &ihdr);

        // One scanline: filter byte + a single transparent RGBA pixel.
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&[0u8; 5])
            .expect("in-memory zlib write cannot fail");
        let idat = encoder
            .finish()
            .expect("in-memory zlib finish cannot fail");
        append_chunk(&mut out, b"IDAT", &idat);

        append_chunk(&mut out, b"IEND", &[]);
        out
    })
}

/// Wrap `payload` into a PNG with an embedded `rAWd` chunk.
#[must_use]
pub fn wrap_payload(payload: &[u8]) -> Vec<u8> {
    let base = base_image();
    let mut out = Vec::with_capacity(base.len() + CHUNK_OVERHEAD + payload.len());
    out.extend_from_slice(&base[..base.len() - IEND_LEN]);
    append_chunk(&mut out, PAYLOAD_TYPE, payload);
    out.extend_from_slice(&base[base.len() - IEND_LEN..]);
    out
}

/// Exact size of `wrap_payload`'s output for a given payload length.
#[must_use]
pub fn wrapped_len(payload_len: usize) -> usize {
    base_image().len() + CHUNK_OVERHEAD + payload_len
}

/// Extract and verify the embedded payload.
///
/// # Errors
///
/// - [`FormatError::MissingPayloadChunk`] when no `rAWd` chunk exists
/// - [`FormatError::InvalidStructure`] when lengths run out of bounds
/// - [`FormatError::CrcMismatch`] when the chunk fails its CRC
pub fn extract_payload(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let type_pos = bytes
        .windows(PAYLOAD_TYPE.len())
        .position(|window| window == PAYLOAD_TYPE)
        .ok_or(FormatError::MissingPayloadChunk)?;
    if type_pos < 4 {
        return Err(FormatError::structure("payload chunk at offset < 4"));
    }
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[type_pos - 4..type_pos]);
    let declared = u32::from_be_bytes(word) as usize;
    let data_start = type_pos + PAYLOAD_TYPE.len();
    let data_end = data_start
        .checked_add(declared)
        .ok_or_else(|| FormatError::structure("payload chunk length overflows"))?;
    if data_end + 4 > bytes.len() {
        return Err(FormatError::structure("payload chunk length out of range"));
    }
    let payload = &bytes[data_start..data_end];
    word.copy_from_slice(&bytes[data_end..data_end + 4]);
    let expected = u32::from_be_bytes(word);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(PAYLOAD_TYPE);
    hasher.update(payload);
    if hasher.finalize() != expected {
        return Err(FormatError::CrcMismatch);
    }
    Ok(payload.to_vec())
}
