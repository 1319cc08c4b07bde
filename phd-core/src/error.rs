use thiserror::Error;

/// Main error type for 11073-20601 operations
#[derive(Error, Debug)]
pub enum PhdError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Buffer overflow: need {needed} bytes, capacity {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },

    #[error("Unknown {context} choice: 0x{choice:04X}")]
    UnknownChoice { context: &'static str, choice: u16 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Classification of codec failures
///
/// Decoders only ever fail with one of these three kinds; everything else
/// in [`PhdError`] comes from the transport, service or state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    OutOfMemory,
    InvalidContent,
    InsufficientData,
}

impl PhdError {
    /// Map this error onto the decode taxonomy, if it is a codec error
    #[must_use]
    pub fn decode_kind(&self) -> Option<DecodeErrorKind> {
        match self {
            Self::OutOfMemory(_) => Some(DecodeErrorKind::OutOfMemory),
            Self::InvalidData(_) | Self::UnknownChoice { .. } => {
                Some(DecodeErrorKind::InvalidContent)
            }
            Self::InsufficientData { .. } => Some(DecodeErrorKind::InsufficientData),
            _ => None,
        }
    }

    /// Check whether this error was produced while decoding
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        self.decode_kind().is_some()
    }
}

/// Result type alias for 11073-20601 operations
pub type PhdResult<T> = Result<T, PhdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_kind_classification() {
        let err = PhdError::InsufficientData { needed: 4, available: 1 };
        assert_eq!(err.decode_kind(), Some(DecodeErrorKind::InsufficientData));

        let err = PhdError::UnknownChoice { context: "APDU", choice: 0xE800 };
        assert_eq!(err.decode_kind(), Some(DecodeErrorKind::InvalidContent));
        assert_eq!(err.to_string(), "Unknown APDU choice: 0xE800");

        assert!(PhdError::OutOfMemory("list".into()).is_decode_error());
        assert!(!PhdError::Timeout.is_decode_error());
    }
}
