// Error types shared by the library modules.
//
// `ClientError` covers every API operation. Each variant names the operation
// that failed so the message printed by the UI is enough to locate the
// problem. `kind()` folds the variants back into the five failure classes the
// protocol distinguishes (validation, transport, auth, server, decode).

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

/// Failure class of a `ClientError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Auth,
    Server,
    Decode,
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// A caller-supplied argument is empty or malformed. Raised before any I/O.
    #[error("{operation} -> invalid argument `{argument}`: {reason}")]
    Validation {
        operation: &'static str,
        argument: &'static str,
        reason: String,
    },

    #[error("{operation} -> request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    /// Credentials or token rejected by the server.
    #[error("{operation} -> rejected by server (HTTP {status})")]
    Auth { operation: &'static str, status: u16 },

    #[error("{operation} -> server returned HTTP {status}")]
    Server { operation: &'static str, status: u16 },

    /// Non-200 answer to a single page request.
    #[error("page {sequence} -> server returned HTTP {status}")]
    PageStatus { sequence: u64, status: u16 },

    #[error("{operation} -> cannot decode response: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    /// Paginated retrieval stopped at `sequence`; nothing fetched so far is kept.
    #[error("retrieval aborted at page {sequence}")]
    PageAborted {
        sequence: u64,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Auth { .. } => ErrorKind::Auth,
            ClientError::Server { .. } | ClientError::PageStatus { .. } => ErrorKind::Server,
            ClientError::Decode { .. } => ErrorKind::Decode,
            ClientError::PageAborted { source, .. } => source.kind(),
        }
    }

    /// Name of the argument that failed validation, if this is a validation error.
    pub fn invalid_argument(&self) -> Option<&'static str> {
        match self {
            ClientError::Validation { argument, .. } => Some(*argument),
            ClientError::PageAborted { source, .. } => source.invalid_argument(),
            _ => None,
        }
    }

    /// Sequence index of the page that broke a retrieval.
    pub fn failed_page(&self) -> Option<u64> {
        match self {
            ClientError::PageStatus { sequence, .. } | ClientError::PageAborted { sequence, .. } => {
                Some(*sequence)
            }
            _ => None,
        }
    }

    pub(crate) fn validation(
        operation: &'static str,
        argument: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ClientError::Validation {
            operation,
            argument,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(operation: &'static str, reason: impl Into<String>) -> Self {
        ClientError::Decode {
            operation,
            reason: reason.into(),
        }
    }
}

/// Errors raised while assembling `Config` from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised by the spreadsheet export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to write spreadsheet")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
