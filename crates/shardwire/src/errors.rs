use std::backtrace::Backtrace;

use thiserror::Error;

/// Represents errors that can occur when constructing, serializing, or deserializing sharding descriptors. The error
/// classes are based on the [Abseil status codes](https://abseil.io/docs/cpp/guides/status-codes) used by the runtimes
/// that produce and consume these descriptors.
///
/// Each variant includes a `backtrace` field that captures the call stack at the point where the error was created,
/// which is useful for debugging. Note that it is represented as a [`String`] and not as a [`Backtrace`] because using
/// the latter is only currently supported in unstable Rust.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// Error returned when a structural invariant is violated, either at construction time or while decoding a
    /// serialized sharding (e.g., mismatched shard counts, rank mismatches, unresolvable device IDs, or requesting
    /// the wrong sharding kind during deserialization).
    #[error("{message}")]
    InvalidArgument { message: String, backtrace: String },

    /// Error returned when a requested or encountered wire-format version has no registered codec.
    #[error("{message}")]
    Unimplemented { message: String, backtrace: String },

    /// Error returned when encoding or decoding fails in a way that is not attributable to caller input
    /// (e.g., payload bytes that cannot be parsed at all).
    #[error("{message}")]
    Internal { message: String, backtrace: String },
}

impl Error {
    /// Creates a new [`Error::InvalidArgument`].
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self::InvalidArgument { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Unimplemented`].
    pub fn unimplemented<M: Into<String>>(message: M) -> Self {
        Self::Unimplemented { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Creates a new [`Error::Internal`].
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal { message: message.into(), backtrace: Backtrace::capture().to_string() }
    }

    /// Returns the message that is stored in this [`Error`].
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument { message, .. }
            | Self::Unimplemented { message, .. }
            | Self::Internal { message, .. } => message.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = Error::invalid_argument("bad input");
        assert_eq!(error.message(), "bad input");
        assert_eq!(format!("{error}"), "bad input");
        assert!(matches!(error, Error::InvalidArgument { .. }));

        let error = Error::unimplemented("version 7 is not supported");
        assert_eq!(error.message(), "version 7 is not supported");
        assert!(matches!(error, Error::Unimplemented { .. }));

        let error = Error::internal("parse failure");
        assert_eq!(error.message(), "parse failure");
        assert!(matches!(error, Error::Internal { .. }));
    }

    #[test]
    fn test_error_debug_includes_backtrace_field() {
        let error = Error::invalid_argument("bad input");
        let debug = format!("{error:?}");
        assert!(debug.starts_with("InvalidArgument { message: \"bad input\", backtrace: \""));
    }
}
