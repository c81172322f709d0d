//! Error types for the conformance checker
//!
//! Two layers: [`DeviceError`] is what a device under test returns from a
//! member call, [`ConformError`] is what can go wrong in the harness itself.

use ascom_alpaca::ASCOMError;

/// Errors returned by a device member call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("ASCOM error 0x{code:X}: {message}")]
    Ascom { code: i32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DeviceError {
    /// Build an ASCOM error from a raw error number
    pub fn ascom(code: i32, message: impl Into<String>) -> Self {
        DeviceError::Ascom {
            code,
            message: message.into(),
        }
    }

    /// The raw ASCOM error number, if the device returned one
    pub fn code(&self) -> Option<i32> {
        match self {
            DeviceError::Ascom { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<ASCOMError> for DeviceError {
    fn from(err: ASCOMError) -> Self {
        DeviceError::Ascom {
            code: i32::from(err.code.raw()),
            message: err.message.to_string(),
        }
    }
}

/// Result of a device member call
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur in the conformance harness
#[derive(Debug, thiserror::Error)]
pub enum ConformError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Operation invalid: {0}")]
    OperationInvalid(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Run cancelled")]
    Cancelled,
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, ConformError>;
