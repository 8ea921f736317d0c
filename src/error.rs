//! Caller-visible error taxonomy.

use displaydoc::Display;
use thiserror::Error;

/// Failure modes of executing a selection against an endpoint.
///
/// Every failure is returned to the caller as-is: nothing in this crate
/// retries, logs-and-swallows, or surfaces partial results.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum HttpError {
    /// endpoint is not a valid URL: {reason}
    BadUrl {
        /// Why the endpoint string failed to parse.
        reason: String,
    },

    /// request timed out
    Timeout,

    /// transport failed: {reason}
    ///
    /// note that this relates to a transport fault and not a GraphQL error
    Network {
        /// The underlying transport failure.
        reason: String,
    },

    /// response was malformed: {reason}
    BadPayload {
        /// The reason decoding failed.
        reason: String,
    },

    /// server returned non-success status code {status}
    BadStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// subscription was cancelled by its owner
    Cancelled,
}

impl From<DecodeError> for HttpError {
    fn from(err: DecodeError) -> Self {
        HttpError::BadPayload { reason: err.reason }
    }
}

/// A structural mismatch between response data and the selection that
/// requested it: a required field missing, a value of the wrong shape,
/// or a key the selection never asked for.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{reason}")]
pub struct DecodeError {
    pub(crate) reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The human-readable reason the decode failed.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
