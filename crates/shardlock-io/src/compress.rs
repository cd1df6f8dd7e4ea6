//! Gzip stream compression with sniffing on the way back in.

use std::io::{self, Chain, Cursor, Read};

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;

/// The two-byte gzip magic.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Wrap a reader so its contents come out gzip-compressed.
pub fn compress_reader<R: Read>(reader: R) -> GzEncoder<R> {
    GzEncoder::new(reader, Compression::default())
}

type Rewound<R> = Chain<Cursor<Vec<u8>>, R>;

/// A stream that may or may not have been gzip-compressed.
pub enum MaybeCompressed<R: Read> {
    /// Gzip magic seen; contents are inflated on the fly.
    Gzip(Box<GzDecoder<Rewound<R>>>),
    /// No gzip magic; bytes pass through unchanged.
    Plain(Rewound<R>),
}

impl<R: Read> MaybeCompressed<R> {
    /// Whether the stream sniffed as gzip.
    #[must_use]
    pub fn is_gzip(&self) -> bool {
        matches!(self, Self::Gzip(_))
    }
}

impl<R: Read> Read for MaybeCompressed<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(inner) => inner.read(buf),
            Self::Plain(inner) => inner.read(buf),
        }
    }
}

/// Peek the first two bytes of `reader`: gzip magic selects streaming
/// decompression, anything else passes through unchanged. Streams shorter
/// than two bytes pass through as-is.
///
/// # Errors
///
/// Returns any error from the initial peek.
pub fn decompress_reader<R: Read>(mut reader: R) -> io::Result<MaybeCompressed<R>> {
    let mut peek = [0u8; 2];
    let mut filled = 0;
    while filled < peek.len() {
        match reader.read(&mut peek[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    let rewound = Cursor::new(peek[..filled].to_vec()).chain(reader);
    if filled == 2 && peek == GZIP_MAGIC {
        tracing::debug!("gzip magic detected, inflating stream");
        Ok(MaybeCompressed::Gzip(Box::new(GzDecoder::new(rewound))))
    } else {
        tracing::debug!("no gzip magic, passing stream through");
        Ok(MaybeCompressed::Plain(rewound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let mut compressed = Vec::new();
        compress_reader(data.as_slice())
            .read_to_end(&mut compressed)
            .unwrap();
        assert_eq!(&compressed[..2], &GZIP_MAGIC);

        let mut out = Vec::new();
        let mut stream = decompress_reader(compressed.as_slice()).unwrap();
        assert!(stream.is_gzip());
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn plain_stream_passes_through() {
        let data = b"no gzip header here".to_vec();
        let mut stream = decompress_reader(data.as_slice()).unwrap();
        assert!(!stream.is_gzip());
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn empty_stream_passes_through() {
        let mut stream = decompress_reader(io::empty()).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn one_byte_stream_passes_through() {
        let data = [0x1Fu8];
        let mut stream = decompress_reader(data.as_slice()).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn compression_shrinks_repetitive_data() {
        let data = vec![7u8; 100_000];
        let mut compressed = Vec::new();
        compress_reader(data.as_slice())
            .read_to_end(&mut compressed)
            .unwrap();
        assert!(compressed.len() < data.len() / 10);
    }
}
