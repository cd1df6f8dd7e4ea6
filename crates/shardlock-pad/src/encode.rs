//! Per-chunk pad construction.

use std::io::Write;

use shardlock_rng::EntropySource;
use zeroize::Zeroize;

use crate::error::{CodecError, SchemeError, MAX_COLLECTIONS, MIN_COLLECTIONS};
use crate::frame;
use crate::label::CollectionLabel;
use crate::subsets::{binomial, SubsetSpace};

/// Encoder half of the threshold scheme.
///
/// Holds the validated parameters, the collection labels, and the subset
/// space. One chunk is encoded at a time; the encoder itself is stateless
/// across chunks, so the same instance serves an entire stream.
pub struct PadEncoder {
    total: u8,
    required: u8,
    labels: Vec<CollectionLabel>,
    space: SubsetSpace,
}

impl PadEncoder {
    /// Validate parameters and derive the collection labels.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError`] for `total` outside `[2, 26]`, `required`
    /// below 2, or `required > total`.
    pub fn new(total: usize, required: usize) -> Result<Self, SchemeError> {
        if !(MIN_COLLECTIONS..=MAX_COLLECTIONS).contains(&total) {
            return Err(SchemeError::TotalOutOfRange(total));
        }
        if required < MIN_COLLECTIONS {
            return Err(SchemeError::RequiredTooSmall(required));
        }
        if required > total {
            return Err(SchemeError::RequiredExceedsTotal { required, total });
        }
        #[allow(clippy::cast_possible_truncation)]
        let (total_u8, required_u8) = (total as u8, required as u8);
        let labels = (1..=total_u8)
            .map(|index| CollectionLabel::from_parts(required_u8, index, total_u8))
            .collect();
        Ok(Self {
            total: total_u8,
            required: required_u8,
            labels,
            space: SubsetSpace::new(total_u8, required_u8 - 1),
        })
    }

    /// N: total collections.
    #[must_use]
    pub const fn total(&self) -> u8 {
        self.total
    }

    /// K: collections required for reconstruction.
    #[must_use]
    pub const fn required(&self) -> u8 {
        self.required
    }

    /// The collection labels, in index order.
    #[must_use]
    pub fn labels(&self) -> &[CollectionLabel] {
        &self.labels
    }

    /// Total pad slots per chunk, `C(N, K-1)`.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.space.len()
    }

    /// Pad slots carried by each collection per chunk, `C(N-1, K-1)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn slots_per_collection(&self) -> usize {
        binomial(u64::from(self.total) - 1, u64::from(self.required) - 1) as usize
    }

    /// Encode one chunk of plaintext into per-collection frame sequences.
    ///
    /// `writers` must hold one writer per collection, in label order. Slots
    /// are walked in lexicographic order and each pad is framed into every
    /// collection outside its subset, so per-collection frames land in
    /// ascending slot order without materialising the full pad matrix. The
    /// final slot is the injection slot: its pad is the XOR of the plaintext
    /// with every pad sampled before it. All pad material is zeroized before
    /// return.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Entropy`] if sampling fails and
    /// [`CodecError::Io`] if a writer fails.
    pub fn encode_chunk<W: Write>(
        &self,
        plaintext: &[u8],
        chunk: u64,
        rng: &dyn EntropySource,
        writers: &mut [W],
    ) -> Result<(), CodecError> {
        debug_assert_eq!(writers.len(), self.labels.len());
        debug_assert!(!plaintext.is_empty());

        let slot_count = self.space.len();
        // Running XOR of the plaintext with every random pad emitted so far;
        // after S-1 slots this is exactly the injection pad.
        let mut accumulator = plaintext.to_vec();
        let mut pad = vec![0u8; plaintext.len()];

        let result = (|| {
            for (slot, subset) in self.space.iter().enumerate() {
                if slot + 1 == slot_count {
                    pad.copy_from_slice(&accumulator);
                } else {
                    rng.fill(&mut pad)?;
                    for (acc, p) in accumulator.iter_mut().zip(pad.iter()) {
                        *acc ^= *p;
                    }
                }
                for (collection, label) in self.labels.iter().enumerate() {
                    #[allow(clippy::cast_possible_truncation)]
                    let member = collection as u8 + 1;
                    if !subset.contains(&member) {
                        frame::write_frame(&mut writers[collection], *label, chunk, &pad)?;
                    }
                }
            }
            Ok(())
        })();

        pad.zeroize();
        accumulator.zeroize();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardlock_testkit::CounterRng;

    #[test]
    fn valid_parameters_accepted() {
        for (n, k) in [(5, 3), (2, 2), (5, 5), (26, 13), (26, 26)] {
            let encoder = PadEncoder::new(n, k).unwrap();
            assert_eq!(usize::from(encoder.total()), n);
            assert_eq!(usize::from(encoder.required()), k);
            assert_eq!(encoder.labels().len(), n);
        }
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            PadEncoder::new(1, 1),
            Err(SchemeError::RequiredTooSmall(1))
        ));
        assert!(matches!(
            PadEncoder::new(27, 13),
            Err(SchemeError::TotalOutOfRange(27))
        ));
        assert!(matches!(
            PadEncoder::new(5, 6),
            Err(SchemeError::RequiredExceedsTotal {
                required: 6,
                total: 5
            })
        ));
        assert!(matches!(
            PadEncoder::new(5, 1),
            Err(SchemeError::RequiredTooSmall(1))
        ));
    }

    #[test]
    fn labels_follow_roman_index() {
        let encoder = PadEncoder::new(5, 3).unwrap();
        let rendered: Vec<String> = encoder.labels().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["3A5", "3B5", "3C5", "3D5", "3E5"]);
    }

    #[test]
    fn slot_counts_match_combinatorics() {
        let encoder = PadEncoder::new(5, 3).unwrap();
        assert_eq!(encoder.slot_count(), 10); // C(5, 2)
        assert_eq!(encoder.slots_per_collection(), 6); // C(4, 2)
    }

    #[test]
    fn chunk_xor_of_distinct_slots_recovers_plaintext() {
        let encoder = PadEncoder::new(3, 2).unwrap();
        let rng = CounterRng::new(0);
        let plaintext = b"hello";
        let mut outputs: Vec<Vec<u8>> = vec![Vec::new(); 3];
        encoder
            .encode_chunk(plaintext, 1, &rng, &mut outputs)
            .unwrap();

        // Collect each collection's payloads and XOR one copy per distinct
        // slot; with 3 slots each held by 2 of 3 collections, the distinct
        // set XORs back to the plaintext.
        let mut distinct: Vec<Vec<u8>> = Vec::new();
        for bytes in &outputs {
            let mut reader = crate::frame::FrameReader::new(std::io::Cursor::new(bytes.clone()));
            while let Some(frame) = reader.next_frame().unwrap() {
                if !distinct.contains(&frame.payload) {
                    distinct.push(frame.payload.clone());
                }
            }
        }
        assert_eq!(distinct.len(), 3);
        let mut recovered = vec![0u8; plaintext.len()];
        for payload in &distinct {
            for (r, p) in recovered.iter_mut().zip(payload.iter()) {
                *r ^= *p;
            }
        }
        assert_eq!(&recovered, plaintext);
    }

    #[test]
    fn each_collection_receives_expected_frame_count() {
        let encoder = PadEncoder::new(5, 3).unwrap();
        let rng = CounterRng::new(0);
        let mut outputs: Vec<Vec<u8>> = vec![Vec::new(); 5];
        encoder
            .encode_chunk(&[0u8; 20], 1, &rng, &mut outputs)
            .unwrap();
        for bytes in &outputs {
            let mut reader = crate::frame::FrameReader::new(std::io::Cursor::new(bytes.clone()));
            let mut frames = 0;
            while reader.next_frame().unwrap().is_some() {
                frames += 1;
            }
            assert_eq!(frames, encoder.slots_per_collection());
        }
    }

    #[test]
    fn encoding_is_deterministic_under_counter_rng() {
        let encoder = PadEncoder::new(4, 2).unwrap();
        let plaintext = b"deterministic payload";

        let mut first: Vec<Vec<u8>> = vec![Vec::new(); 4];
        encoder
            .encode_chunk(plaintext, 1, &CounterRng::new(0), &mut first)
            .unwrap();
        let mut second: Vec<Vec<u8>> = vec![Vec::new(); 4];
        encoder
            .encode_chunk(plaintext, 1, &CounterRng::new(0), &mut second)
            .unwrap();
        assert_eq!(first, second);
    }
}
