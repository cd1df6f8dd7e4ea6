//! Chunk reconstruction from any K collections.

use std::io::{Read, Write};

use zeroize::Zeroize;

use crate::error::{CodecError, SchemeError, MIN_COLLECTIONS};
use crate::frame::FrameReader;
use crate::label::CollectionLabel;
use crate::subsets::SubsetSpace;

/// Totals from a completed decode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Chunks reconstructed.
    pub chunks: u64,
    /// Plaintext bytes written to the sink.
    pub plaintext_bytes: u64,
}

/// Decoder half of the threshold scheme.
///
/// K and N are unknown until the first frame is read: the decoder pins them
/// from the first reader's first frame, verifies every selected reader
/// agrees, and rejects divergent frames thereafter. Of the supplied readers
/// the first K are used and the rest are never read.
pub struct PadDecoder {
    available: usize,
}

impl PadDecoder {
    /// Prepare a decoder over `available` collection readers.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::TotalOutOfRange`] when fewer than two readers
    /// are supplied; no scheme can decode from fewer.
    pub fn new(available: usize) -> Result<Self, SchemeError> {
        if available < MIN_COLLECTIONS {
            return Err(SchemeError::TotalOutOfRange(available));
        }
        Ok(Self { available })
    }

    /// Number of readers this decoder was set up with.
    #[must_use]
    pub const fn available(&self) -> usize {
        self.available
    }

    /// Reconstruct the plaintext stream, writing it to `sink`.
    ///
    /// Stops when every selected reader reports EOF at the same chunk
    /// boundary. An empty set of streams (all EOF before the first frame)
    /// yields an empty output.
    ///
    /// # Errors
    ///
    /// - [`CodecError::ShortCollection`] when fewer readers were supplied
    ///   than the pinned scheme requires
    /// - [`CodecError::UnevenEof`] when one collection ends while others
    ///   continue
    /// - [`CodecError::CollectionMismatch`] when two collections disagree on
    ///   a slot's bytes
    /// - [`CodecError::Frame`] on any framing violation
    pub fn run<R: Read, W: Write + ?Sized>(
        &self,
        readers: Vec<R>,
        sink: &mut W,
    ) -> Result<DecodeSummary, CodecError> {
        debug_assert_eq!(readers.len(), self.available);
        let mut frames: Vec<FrameReader<R>> = readers.into_iter().map(FrameReader::new).collect();

        // The first reader's first frame pins the scheme.
        let first_scheme = frames[0]
            .peek()?
            .map(|first| (usize::from(first.label.required()), usize::from(first.label.total())));
        let (required, total) = match first_scheme {
            Some(scheme) => scheme,
            None => {
                for (position, reader) in frames.iter_mut().enumerate().skip(1) {
                    if reader.peek()?.is_some() {
                        return Err(CodecError::UnevenEof {
                            label: format!("input #{}", position + 1),
                            chunk: 1,
                        });
                    }
                }
                return Ok(DecodeSummary {
                    chunks: 0,
                    plaintext_bytes: 0,
                });
            }
        };
        if frames.len() < required {
            return Err(CodecError::ShortCollection {
                required,
                available: frames.len(),
            });
        }
        // Any readers beyond the first K are ignored, never read.
        frames.truncate(required);

        let labels = pin_labels(&mut frames, required, total)?;
        tracing::debug!(
            required,
            total,
            collections = %labels
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            "pinned scheme from first frame"
        );

        #[allow(clippy::cast_possible_truncation)]
        let space = SubsetSpace::new(total as u8, required as u8 - 1);
        let mut chunk_no: u64 = 1;
        let mut plaintext_bytes: u64 = 0;

        loop {
            let mut eof = Vec::with_capacity(frames.len());
            for reader in frames.iter_mut() {
                eof.push(reader.peek()?.is_none());
            }
            if eof.iter().all(|&done| done) {
                break;
            }
            if let Some(position) = eof.iter().position(|&done| done) {
                return Err(CodecError::UnevenEof {
                    label: labels[position].to_string(),
                    chunk: chunk_no,
                });
            }

            let chunk_len = match frames[0].peek()? {
                Some(frame) => frame.payload.len(),
                None => {
                    return Err(CodecError::UnevenEof {
                        label: labels[0].to_string(),
                        chunk: chunk_no,
                    })
                }
            };

            let mut accumulator = vec![0u8; chunk_len];
            let mut first_copy = vec![0u8; chunk_len];
            let result = decode_chunk(
                &mut frames,
                &labels,
                &space,
                chunk_no,
                chunk_len,
                &mut accumulator,
                &mut first_copy,
            );
            first_copy.zeroize();
            match result {
                Ok(()) => {
                    sink.write_all(&accumulator)?;
                    accumulator.zeroize();
                }
                Err(e) => {
                    accumulator.zeroize();
                    return Err(e);
                }
            }

            plaintext_bytes += chunk_len as u64;
            tracing::debug!(chunk = chunk_no, len = chunk_len, "decoded chunk");
            chunk_no += 1;
        }

        Ok(DecodeSummary {
            chunks: chunk_no - 1,
            plaintext_bytes,
        })
    }
}

/// Read each selected reader's first frame and pin its label.
fn pin_labels<R: Read>(
    frames: &mut [FrameReader<R>],
    required: usize,
    total: usize,
) -> Result<Vec<CollectionLabel>, CodecError> {
    let mut labels = Vec::with_capacity(frames.len());
    for (position, reader) in frames.iter_mut().enumerate() {
        let frame = reader.peek()?.ok_or_else(|| CodecError::UnevenEof {
            label: format!("input #{}", position + 1),
            chunk: 1,
        })?;
        let label = frame.label;
        if usize::from(label.required()) != required || usize::from(label.total()) != total {
            return Err(CodecError::frame(format!(
                "collection {label} disagrees with the pinned {required}-of-{total} scheme"
            )));
        }
        labels.push(label);
    }
    let mut seen = [false; 27];
    for label in &labels {
        let index = usize::from(label.index());
        if seen[index] {
            return Err(CodecError::frame(format!(
                "collection {label} supplied more than once"
            )));
        }
        seen[index] = true;
    }
    Ok(labels)
}

/// Reconstruct one chunk by XORing one copy of every slot's pad.
fn decode_chunk<R: Read>(
    frames: &mut [FrameReader<R>],
    labels: &[CollectionLabel],
    space: &SubsetSpace,
    chunk_no: u64,
    chunk_len: usize,
    accumulator: &mut [u8],
    first_copy: &mut [u8],
) -> Result<(), CodecError> {
    for (slot, subset) in space.iter().enumerate() {
        let mut have_first = false;
        for (position, reader) in frames.iter_mut().enumerate() {
            if subset.contains(&labels[position].index()) {
                continue;
            }
            let frame = reader
                .next_frame()?
                .ok_or_else(|| CodecError::UnevenEof {
                    label: labels[position].to_string(),
                    chunk: chunk_no,
                })?;
            if frame.label != labels[position] {
                return Err(CodecError::frame(format!(
                    "collection label changed from {} to {} mid-stream",
                    labels[position], frame.label
                )));
            }
            if frame.chunk != chunk_no {
                return Err(CodecError::frame(format!(
                    "collection {} carries chunk {} where chunk {} was expected",
                    labels[position], frame.chunk, chunk_no
                )));
            }
            if frame.payload.len() != chunk_len {
                return Err(CodecError::frame(format!(
                    "payload length {} disagrees with chunk length {} in collection {}",
                    frame.payload.len(),
                    chunk_len,
                    labels[position]
                )));
            }
            if have_first {
                if frame.payload[..] != first_copy[..] {
                    return Err(CodecError::CollectionMismatch {
                        slot,
                        chunk: chunk_no,
                    });
                }
            } else {
                for (acc, byte) in accumulator.iter_mut().zip(frame.payload.iter()) {
                    *acc ^= *byte;
                }
                first_copy.copy_from_slice(&frame.payload);
                have_first = true;
            }
        }
        // Every slot is covered: a slot escapes K readers only if all K
        // indices lie inside its (K-1)-sized subset, which cannot happen.
        debug_assert!(have_first);
    }
    Ok(())
}
