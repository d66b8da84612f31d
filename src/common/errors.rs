use std::fmt;

/// Error raised while decoding a PDU byte buffer.
///
/// Buffers shorter than the fields they claim to contain are rejected up
/// front; no function in this crate reads past the end of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduParseErr {
    /// The buffer ended before the named field could be read.
    BufferEnded { field: &'static str },
    /// A field carried a value outside its allowed range.
    BadFieldValue { field: &'static str, value: u8 },
    /// Two length fields disagree with each other.
    InconsistentLength { expected: usize, found: usize },
}

impl fmt::Display for PduParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PduParseErr::BufferEnded { field } => {
                write!(f, "PDU ended while reading {}", field)
            }
            PduParseErr::BadFieldValue { field, value } => {
                write!(f, "invalid value {:#04x} for {}", value, field)
            }
            PduParseErr::InconsistentLength { expected, found } => {
                write!(f, "inconsistent length (expected {}, found {})", expected, found)
            }
        }
    }
}

impl std::error::Error for PduParseErr {}

/// Error raised while building a PDU or preparing text for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErr {
    /// A character exists in neither the GSM 7-bit default table nor the
    /// escape table; the whole message must fall back to UCS-2.
    NotEncodable { ch: char },
    /// A timestamp string could not be understood.
    BadTimestamp { reason: &'static str },
    /// Part count does not match the count declared in the concat header.
    PartMismatch { expected: usize, found: usize },
    /// Two parts claim the same position in a concatenated set.
    DuplicatePartIndex { index: u8 },
    /// Parts from different concatenated sets were mixed together.
    SignatureMismatch,
}

impl fmt::Display for EncodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeErr::NotEncodable { ch } => {
                write!(f, "character {:?} is not representable in the GSM 7-bit alphabet", ch)
            }
            EncodeErr::BadTimestamp { reason } => write!(f, "bad timestamp: {}", reason),
            EncodeErr::PartMismatch { expected, found } => {
                write!(f, "expected {} concatenated parts, found {}", expected, found)
            }
            EncodeErr::DuplicatePartIndex { index } => {
                write!(f, "duplicate concatenated part index {}", index)
            }
            EncodeErr::SignatureMismatch => {
                write!(f, "parts do not belong to the same concatenated set")
            }
        }
    }
}

impl std::error::Error for EncodeErr {}
