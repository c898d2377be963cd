//! Error types for movie/media encoding, decoding and validation.

use thiserror::Error;

use crate::codec::context::ContextKey;

/// Broad classification of coder errors.
///
/// Callers use this to decide whether a failure aborts the whole file or
/// only the current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Declared and actual encoded lengths disagree, or input ran out.
    Structural,
    /// A closed family has no decoder for a discriminator.
    UnsupportedVariant,
    /// An open family has no decoder for a discriminator.
    UnknownTag,
    /// Invalid coder configuration (e.g. a text encoding name).
    Configuration,
    /// Malformed field values or framing.
    MalformedEncoding,
    /// Failure of the underlying stream or of (de)compression.
    Io,
}

impl ErrorKind {
    /// Returns true if the remaining records can still be decoded after an
    /// error of this kind, using the record length already consumed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Structural
                | ErrorKind::UnsupportedVariant
                | ErrorKind::UnknownTag
                | ErrorKind::MalformedEncoding
        )
    }
}

/// A context value was read before any ancestor set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context key {0:?} read before it was set")]
pub struct MissingContext(pub ContextKey);

/// Invalid coder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unsupported text encoding: {name:?}")]
    UnsupportedEncoding { name: String },
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input while reading {context} at bit {position}")]
    UnexpectedEof {
        context: &'static str,
        position: usize,
    },

    #[error("{object} at byte {location} declared {expected} bytes but consumed {} bits fewer", .delta.abs())]
    Underflow {
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    },

    #[error("{object} at byte {location} declared {expected} bytes but consumed {} bits more", .delta.abs())]
    Overflow {
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    },

    #[error("no {family} variant for code {code:#x} at byte {location}")]
    UnsupportedVariant {
        family: &'static str,
        code: u16,
        location: usize,
    },

    #[error("unknown {family} code {code:#x} ({length} bytes) at byte {location}")]
    UnknownTag {
        family: &'static str,
        code: u16,
        length: usize,
        location: usize,
    },

    #[error("invalid signature: {found:?}")]
    InvalidSignature { found: [u8; 3] },

    #[error("unsupported version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("variable-length integer exceeds {max} groups")]
    VarintTooLong { max: usize },

    #[error("variable-length integer overflows u32")]
    VarintOverflow,

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {encoding} text in {field}")]
    InvalidText {
        encoding: &'static str,
        field: &'static str,
    },

    #[error("malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    #[error(transparent)]
    MissingContext(#[from] MissingContext),

    #[error("zlib decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DecodeError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnexpectedEof { .. }
            | DecodeError::Underflow { .. }
            | DecodeError::Overflow { .. } => ErrorKind::Structural,
            DecodeError::UnsupportedVariant { .. } => ErrorKind::UnsupportedVariant,
            DecodeError::UnknownTag { .. } => ErrorKind::UnknownTag,
            DecodeError::MissingContext(_) => ErrorKind::Configuration,
            DecodeError::DecompressionFailed(_) | DecodeError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::MalformedEncoding,
        }
    }

    /// Builds the structural mismatch error for a signed bit delta
    /// (`actual - expected`).
    pub(crate) fn mismatch(
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    ) -> Self {
        if delta < 0 {
            DecodeError::Underflow { object, location, expected, delta }
        } else {
            DecodeError::Overflow { object, location, expected, delta }
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.to_string())
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{object} at byte {location} declared {expected} bytes but wrote {} bits fewer", .delta.abs())]
    Underflow {
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    },

    #[error("{object} at byte {location} declared {expected} bytes but wrote {} bits more", .delta.abs())]
    Overflow {
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    },

    #[error("{field} value {value} does not fit in {bits} bits")]
    ValueOutOfRange {
        field: &'static str,
        value: i64,
        bits: u32,
    },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("text in {field} cannot be represented in {encoding}")]
    UnrepresentableText {
        encoding: &'static str,
        field: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },

    #[error("mark stack is empty")]
    UnbalancedMark,

    #[error(transparent)]
    MissingContext(#[from] MissingContext),

    #[error("zlib compression failed: {0}")]
    CompressionFailed(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl EncodeError {
    pub(crate) fn mismatch(
        object: &'static str,
        location: usize,
        expected: usize,
        delta: i64,
    ) -> Self {
        if delta < 0 {
            EncodeError::Underflow { object, location, expected, delta }
        } else {
            EncodeError::Overflow { object, location, expected, delta }
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io(err.to_string())
    }
}

/// Error during semantic validation of a decoded or constructed movie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("character id {id} is defined more than once")]
    DuplicateCharacter { id: u16 },

    #[error("header declares {declared} frames but {actual} ShowFrame records were found")]
    FrameCountMismatch { declared: u16, actual: u16 },

    #[error("tag code {code} is not allowed inside a sprite")]
    NotAllowedInSprite { code: u16 },

    #[error("FileAttributes must be the first tag for version {version}")]
    FileAttributesNotFirst { version: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_sign_selects_variant() {
        assert!(matches!(
            DecodeError::mismatch("Shape", 10, 4, -1),
            DecodeError::Underflow { delta: -1, .. }
        ));
        assert!(matches!(
            DecodeError::mismatch("Shape", 10, 4, 8),
            DecodeError::Overflow { delta: 8, .. }
        ));
    }

    #[test]
    fn test_error_kinds() {
        let eof = DecodeError::UnexpectedEof { context: "byte", position: 0 };
        assert_eq!(eof.kind(), ErrorKind::Structural);
        assert!(eof.kind().is_recoverable());

        let io = DecodeError::Io("broken pipe".to_string());
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(!io.kind().is_recoverable());

        let missing: DecodeError = MissingContext(ContextKey::Version).into();
        assert_eq!(missing.kind(), ErrorKind::Configuration);
    }
}
