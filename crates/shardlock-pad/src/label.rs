//! Collection labels.
//!
//! A label is `"<K><letter><N>"` where the letter is the 1-based Roman index
//! of the collection (A=1 .. Z=26): `3B5` is collection #2 of a 3-of-5
//! scheme. Because the label travels inside every chunk frame, the decoder
//! can recover the scheme parameters from the wire without a descriptor
//! file.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{MAX_COLLECTIONS, MIN_COLLECTIONS};

/// Label parse/validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// The string does not match `^(\d+)([A-Za-z])(\d+)$`.
    #[error("malformed collection label '{0}'")]
    Malformed(String),

    /// The string parsed but its parameters are inconsistent.
    #[error("collection label '{0}' has out-of-range parameters")]
    OutOfRange(String),
}

/// A collection's identity within a K-of-N scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionLabel {
    required: u8,
    index: u8,
    total: u8,
}

impl CollectionLabel {
    /// Build a label, validating scheme bounds and the index range.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::OutOfRange`] when `total` is outside `[2, 26]`,
    /// `required` is outside `[2, total]`, or `index` is outside
    /// `[1, total]`.
    pub fn new(required: u8, index: u8, total: u8) -> Result<Self, LabelError> {
        let in_range = (MIN_COLLECTIONS..=MAX_COLLECTIONS).contains(&usize::from(total))
            && required >= MIN_COLLECTIONS as u8
            && required <= total
            && (1..=total).contains(&index);
        if !in_range {
            return Err(LabelError::OutOfRange(format!(
                "{required}{}{total}",
                (b'A' + index.wrapping_sub(1).min(25)) as char
            )));
        }
        Ok(Self {
            required,
            index,
            total,
        })
    }

    /// Construct from parts the caller has already validated.
    pub(crate) fn from_parts(required: u8, index: u8, total: u8) -> Self {
        debug_assert!(required >= 2 && required <= total && index >= 1 && index <= total);
        Self {
            required,
            index,
            total,
        }
    }

    /// K: collections required for reconstruction.
    #[must_use]
    pub const fn required(&self) -> u8 {
        self.required
    }

    /// The collection's 1-based index within the scheme.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// N: total collections in the scheme.
    #[must_use]
    pub const fn total(&self) -> u8 {
        self.total
    }

    /// The index rendered as its Roman letter (A=1 .. Z=26).
    #[must_use]
    pub const fn letter(&self) -> char {
        (b'A' + self.index - 1) as char
    }
}

impl fmt::Display for CollectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.required, self.letter(), self.total)
    }
}

impl FromStr for CollectionLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LabelError::Malformed(s.to_string());
        if !s.is_ascii() {
            return Err(malformed());
        }
        let bytes = s.as_bytes();
        let digits_end = bytes
            .iter()
            .position(|b| !b.is_ascii_digit())
            .ok_or_else(malformed)?;
        if digits_end == 0 {
            return Err(malformed());
        }
        let letter = bytes[digits_end];
        if !letter.is_ascii_alphabetic() {
            return Err(malformed());
        }
        let trailing = &s[digits_end + 1..];
        if trailing.is_empty() || !trailing.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let required: u8 = s[..digits_end].parse().map_err(|_| malformed())?;
        let total: u8 = trailing.parse().map_err(|_| malformed())?;
        let index = letter.to_ascii_uppercase() - b'A' + 1;
        Self::new(required, index, total).map_err(|_| LabelError::OutOfRange(s.to_string()))
    }
}

/// Whether a string looks like a collection label.
#[must_use]
pub fn is_collection_label(s: &str) -> bool {
    s.parse::<CollectionLabel>().is_ok()
}
