//! Unified error types for walletmux
//!
//! Every backend-specific failure is funneled into this one taxonomy at
//! the adapter boundary; callers never need to know which backend raised
//! an error. Nothing here is surfaced to a user directly, the UI layer
//! decides presentation from the error kind and severity alone.

use serde::{Deserialize, Serialize};

use crate::types::{Backend, Network};

/// Main error type for all walletmux operations
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("{backend} is not installed in this host environment")]
    BackendAbsent { backend: Backend },

    #[error("no wallet backend is connected")]
    NoActiveSession,

    #[error("connecting to {backend} failed: {cause}")]
    Connection {
        backend: Backend,
        #[source]
        cause: anyhow::Error,
    },

    #[error("address role resolution failed: {0}")]
    RoleResolution(String),

    #[error("{backend} does not support {operation}")]
    UnsupportedOperation {
        backend: Backend,
        operation: &'static str,
    },

    #[error("request cancelled by the user")]
    UserCancelled,

    #[error("insufficient input data: {0}")]
    InsufficientInputData(String),

    #[error("address {address} is not valid on {expected}")]
    NetworkMismatch { expected: Network, address: String },

    #[error("invalid PSBT: {0}")]
    Psbt(String),

    #[error("{backend} request failed: {cause}")]
    RequestFailed {
        backend: Backend,
        #[source]
        cause: anyhow::Error,
    },
}

/// Error kinds for categorization across the FFI-free UI boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendAbsent,
    NoActiveSession,
    Connection,
    RoleResolution,
    UnsupportedOperation,
    UserCancelled,
    InsufficientInputData,
    NetworkMismatch,
    Psbt,
    RequestFailed,
}

/// How a caller should surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Clean user action; never an error toast or error-level log.
    Info,
    Error,
}

impl MuxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MuxError::BackendAbsent { .. } => ErrorKind::BackendAbsent,
            MuxError::NoActiveSession => ErrorKind::NoActiveSession,
            MuxError::Connection { .. } => ErrorKind::Connection,
            MuxError::RoleResolution(_) => ErrorKind::RoleResolution,
            MuxError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            MuxError::UserCancelled => ErrorKind::UserCancelled,
            MuxError::InsufficientInputData(_) => ErrorKind::InsufficientInputData,
            MuxError::NetworkMismatch { .. } => ErrorKind::NetworkMismatch,
            MuxError::Psbt(_) => ErrorKind::Psbt,
            MuxError::RequestFailed { .. } => ErrorKind::RequestFailed,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MuxError::UserCancelled => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MuxError::UserCancelled)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, MuxError::UnsupportedOperation { .. })
    }
}

/// Result type alias for walletmux operations
pub type MuxResult<T> = Result<T, MuxError>;

// Conversions from common error types

impl From<bitcoin::psbt::Error> for MuxError {
    fn from(e: bitcoin::psbt::Error) -> Self {
        MuxError::Psbt(e.to_string())
    }
}

impl From<hex::FromHexError> for MuxError {
    fn from(e: hex::FromHexError) -> Self {
        MuxError::Psbt(format!("hex decode: {}", e))
    }
}

impl From<base64::DecodeError> for MuxError {
    fn from(e: base64::DecodeError) -> Self {
        MuxError::Psbt(format!("base64 decode: {}", e))
    }
}
