//! Error types shared across the crate
use std::fmt;

/// A display wrapper for 8-byte dataset name tags
///
/// Tags are ASCII in well-formed files but arbitrary bytes in corrupt
/// ones, so the raw bytes are kept and rendered lossily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag(pub [u8; 8]);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter().take_while(|&&b| b != 0) {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Errors raised while decoding ensemble frames
///
/// Offsets are relative to the start of the frame being decoded.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The buffer ends before a declared length is satisfied
    #[error("truncated frame at byte {offset}: {needed} more bytes required")]
    Truncated {
        /// Frame offset at which the data ran out
        offset: usize,
        /// Number of missing bytes
        needed: usize,
    },
    /// The computed checksum does not match the stored one
    #[error("checksum mismatch: computed {computed:#x}, stored {stored:#x}")]
    BadChecksum {
        /// Checksum computed over the frame contents
        computed: u32,
        /// Checksum stored in the frame
        stored: u32,
    },
    /// The frame does not start with the expected sync sequence
    #[error("bad sync header at byte {offset}")]
    BadSync {
        /// Frame offset of the offending byte
        offset: usize,
    },
    /// A dataset name tag is not in the recognized table
    #[error("unknown dataset {tag} at byte {offset}")]
    UnknownDataset {
        /// The unrecognized 8-byte name tag
        tag: Tag,
        /// Frame offset of the dataset base header
        offset: usize,
    },
    /// A data type id is not in the recognized table
    #[error("unknown data type {id:#06x} at byte {offset}")]
    UnknownDataType {
        /// The unrecognized 2-byte id
        id: u16,
        /// Frame offset of the id
        offset: usize,
    },
    /// Offsets in a PD0 header are non-monotonic or out of range
    #[error("offset table entry {index} ({offset}) out of order or out of range")]
    InconsistentOffsetTable {
        /// Index of the offending entry
        index: usize,
        /// Value of the offending entry
        offset: usize,
    },
    /// A dataset declares more data than its frame holds
    #[error("dataset {tag} declares {declared} data bytes but only {available} remain")]
    DimensionMismatch {
        /// Name tag of the offending dataset
        tag: Tag,
        /// Bytes implied by element count × multiplier × element size
        declared: usize,
        /// Bytes left in the payload
        available: usize,
    },
    /// A dataset value-kind field is not a recognized element type
    #[error("value kind {kind} is not a recognized element type")]
    BadValueKind {
        /// The unrecognized value-kind field
        kind: i32,
    },
    /// An NMEA sentence could not be parsed
    #[error("unparseable NMEA sentence: {reason}")]
    BadSentence {
        /// What went wrong
        reason: String,
    },
    /// An underlying I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
