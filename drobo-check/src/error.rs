//! Error types for a single check run
//!
//! Every failure here is unrecoverable for the run: the caller reports
//! UNKNOWN and exits. Variants map onto the failure classes an operator
//! needs to tell apart (transport, framing, document shape, field values).

use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("connection closed after {got} of {expected} expected bytes")]
    ConnectionClosed { expected: usize, got: usize },

    #[error("{what} timed out after {secs}s")]
    Timeout { what: &'static str, secs: u64 },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("status payload is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),

    #[error("malformed status document: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("status document is missing required element <{0}>")]
    MissingElement(&'static str),

    #[error("invalid value in <{element}>: {reason}")]
    InvalidValue {
        element: &'static str,
        reason: String,
    },
}

impl CheckError {
    /// Transport-level failures are the only ones a retry can help with;
    /// framing and document errors would just reproduce.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CheckError::Connection(_)
                | CheckError::ConnectionClosed { .. }
                | CheckError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        let refused = CheckError::Connection(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        ));
        assert!(refused.is_transient());
        assert!(CheckError::ConnectionClosed { expected: 16, got: 3 }.is_transient());
        assert!(CheckError::Timeout { what: "connect", secs: 10 }.is_transient());
    }

    #[test]
    fn document_errors_are_not_transient() {
        assert!(!CheckError::Protocol("bad length".into()).is_transient());
        assert!(!CheckError::MissingElement("mSlotsExp").is_transient());
    }
}
