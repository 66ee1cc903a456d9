//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias over
//! [`Error`]. The variants mirror the backend failure taxonomy the cycle scheduler
//! needs to distinguish: a [`ConfigInvalid`](Error::ConfigInvalid) is always fatal, a
//! [`BackendUnreachable`](Error::BackendUnreachable) mid-cycle just skips a step, and so
//! on. The scheduler is the only place that decides what an `Error` means for control
//! flow; everything below it just classifies and propagates.

use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration failed to load or failed validation. Always fatal.
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Human-readable description of what is wrong.
        message: String,
    },

    /// A backend (curator or download client) could not be reached at all, or timed
    /// out, or returned a response the gateway could not make sense of.
    #[error("{backend} is unreachable: {detail}")]
    BackendUnreachable {
        /// Name or base URL of the backend that failed.
        backend: String,
        /// Underlying detail (transport error, timeout, or parse failure).
        detail: String,
    },

    /// Authentication against a backend failed.
    #[error("authentication failed against {backend}")]
    AuthFailed {
        /// Name or base URL of the backend.
        backend: String,
    },

    /// A backend reported a version older than the minimum this crate supports.
    #[error("{backend} reports version {actual}, minimum supported is {minimum}")]
    VersionTooLow {
        /// Name or base URL of the backend.
        backend: String,
        /// Minimum supported version.
        minimum: String,
        /// Actual version reported.
        actual: String,
    },

    /// A download client's connectivity probe reported it as disconnected.
    #[error("download client {client} is disconnected")]
    BackendDisconnected {
        /// Name of the download client.
        client: String,
    },

    /// A mutating action (remove, tag) was rejected by the backend.
    #[error("{backend} rejected action: {detail}")]
    ActionRejected {
        /// Name or base URL of the backend.
        backend: String,
        /// Detail returned by the backend, if any.
        detail: String,
    },

    /// Low-level network error, converted into [`Error::BackendUnreachable`] at call
    /// sites that know which backend was being reached; kept as a distinct `#[from]`
    /// variant for code paths that have not yet attached backend context.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// Filesystem error, surfaced by the deletion bridge and config file loading.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The process received a shutdown signal while awaiting I/O.
    #[error("shutting down")]
    ShuttingDown,
}

impl Error {
    /// Build a [`BackendUnreachable`](Error::BackendUnreachable) from a transport error,
    /// attaching which backend was being reached.
    pub fn unreachable(backend: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Error::BackendUnreachable {
            backend: backend.into(),
            detail: detail.to_string(),
        }
    }

    /// Build a [`BackendUnreachable`](Error::BackendUnreachable) from a JSON decoding
    /// failure (the `BadResponse` kind is folded into `BackendUnreachable` per the
    /// error-handling policy: a bad response is treated the same as an unreachable
    /// backend for that call).
    pub fn bad_response(backend: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Error::BackendUnreachable {
            backend: backend.into(),
            detail: format!("bad response: {detail}"),
        }
    }

    /// Whether this error should be treated as the backend simply being unreachable
    /// for the duration of the current step (as opposed to fatal or disconnection).
    pub fn is_unreachable_class(&self) -> bool {
        matches!(
            self,
            Error::BackendUnreachable { .. } | Error::Network(_) | Error::Io(_)
        )
    }
}
