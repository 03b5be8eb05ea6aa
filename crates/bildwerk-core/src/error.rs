// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Caller errors --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("image association violated: {0}")]
    InvariantViolation(String),

    // -- Image errors --
    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    // -- Page documents --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`BildwerkError`], for callers that branch on
/// the failure rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    DecodeFailure,
    EncodeFailure,
    InvariantViolation,
    Pdf,
    Io,
    Config,
}

impl ErrorKind {
    /// Whether repeating the call with the same input could succeed.
    ///
    /// Only raw I/O qualifies (a flaky stream or a file that appears later).
    /// Nothing in Bildwerk retries on its own; this is advice for the caller.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Io)
    }
}

impl BildwerkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::Encode(_) => ErrorKind::EncodeFailure,
            Self::Pdf(_) => ErrorKind::Pdf,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Config,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            BildwerkError::Encode("released".into()).kind(),
            ErrorKind::EncodeFailure
        );
        assert_eq!(
            BildwerkError::InvariantViolation("double associate".into()).kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            BildwerkError::Decode("truncated".into()).kind(),
            ErrorKind::DecodeFailure
        );
    }

    #[test]
    fn only_io_is_retriable() {
        let io = BildwerkError::from(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "stream reset",
        ));
        assert!(io.kind().is_retriable());
        assert!(!BildwerkError::Decode("bad header".into()).kind().is_retriable());
        assert!(!BildwerkError::InvalidArgument("quality".into()).kind().is_retriable());
    }

    #[test]
    fn messages_carry_detail() {
        let err = BildwerkError::InvalidArgument("quality 0 outside 1..=100".into());
        assert_eq!(err.to_string(), "invalid argument: quality 0 outside 1..=100");
    }
}
