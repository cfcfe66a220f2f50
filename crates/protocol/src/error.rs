//! Error types for the protocol crate

use diana_core::{DianaError, ObjectKind, Provenance};

/// Structural decode/encode failures
///
/// Every variant is a hard error. Unrecognised container subtypes are not
/// errors at all; they surface as [`crate::Decoded::Unrecognized`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Format string has an unmatched `[` or `]`
    #[error("Bad format: unbalanced brackets")]
    UnbalancedBrackets,

    /// Format string contains a character that is not a type tag
    #[error("Bad format: unknown tag {0:?}")]
    UnknownFormatTag(char),

    /// Not enough input for the next field
    #[error("Truncated data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// String count field was zero, so there is no room for the terminator
    #[error("Zero-length string (no NUL trailer)")]
    ZeroLengthString,

    /// String code units were not followed by a 0x0000 terminator
    #[error("NUL trailer missing from string")]
    MissingNulTerminator,

    /// String code units are not valid UTF-16
    #[error("String is not valid UTF-16")]
    InvalidUtf16,

    /// Input left over after the last format token
    #[error("Trailing bytes: {0} unconsumed")]
    TrailingBytes(usize),

    /// Value supplied for encoding does not match its format tag
    #[error("Value mismatch: expected {expected}, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Fewer values than format tokens
    #[error("Not enough values for format")]
    MissingValue,

    /// More values than format tokens
    #[error("Too many values for format: {0} left over")]
    ExtraValues(usize),

    /// Frame does not start with 0xDEADBEEF
    #[error("Incorrect frame header: magic {0:#010x}")]
    BadMagic(u32),

    /// Frame length field smaller than the header
    #[error("Frame too short: length {0}")]
    FrameTooShort(u32),

    /// Frame length field above the accepted maximum
    #[error("Frame too long: length {length} exceeds {max}")]
    FrameTooLong { length: u32, max: u32 },

    /// Frame origin field does not match the stream direction
    #[error("Incorrect frame origin: expected {expected:?}, found {found}")]
    WrongProvenance { expected: Provenance, found: u32 },

    /// Redundant remaining-length field disagrees with the total length
    #[error("Inconsistent frame length fields: total {total}, remaining {remaining}")]
    InconsistentLength { total: u32, remaining: u32 },

    /// Object update record starts with an unknown tag
    #[error("Unknown object type {0}")]
    UnknownObjectType(u8),

    /// Object kind is known but has no record layout
    #[error("No update layout for object type {0}")]
    UnsupportedObjectType(ObjectKind),

    /// A bit with no known field is set in an object update mask
    #[error("Unknown data keys for {kind}: mask {mask_index} bits {bits:#04x}")]
    ReservedBits {
        kind: ObjectKind,
        mask_index: usize,
        bits: u8,
    },

    /// Enumerated field holds a value outside its range
    #[error("Invalid value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: u32 },

    /// Fixed-arity message carries the wrong number of entries
    #[error("Wrong number of {what}: expected {expected}, found {found}")]
    WrongCount {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<ProtocolError> for DianaError {
    fn from(err: ProtocolError) -> Self {
        DianaError::Protocol(err.to_string())
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
