//! Error types for Backdrop Core

use thiserror::Error;

use crate::sdk::SdkBackend;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Usage errors
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    // SDK errors
    #[error("{backend} SDK did not become ready within {waited_ms}ms")]
    SdkLoadStall { backend: SdkBackend, waited_ms: u64 },

    // Host errors
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a contract violation
    pub fn contract(msg: impl Into<String>) -> Self {
        Error::ContractViolation(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    /// Returns true if this error indicates a programming or configuration mistake
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::ContractViolation(_))
    }

    /// Returns the error code reported to the host page
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION",
            Error::ContractViolation(_) => "CONTRACT_VIOLATION",
            Error::SdkLoadStall { .. } => "SDK_LOAD_STALL",
            Error::Backend(_) => "BACKEND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::config("x").error_code(), "CONFIGURATION");
        assert_eq!(Error::contract("x").error_code(), "CONTRACT_VIOLATION");
        assert_eq!(
            Error::SdkLoadStall { backend: SdkBackend::Vimeo, waited_ms: 10 }.error_code(),
            "SDK_LOAD_STALL"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("no backend").is_fatal());
        assert!(Error::contract("play before ready").is_fatal());
        assert!(!Error::backend("iframe").is_fatal());
        assert!(!Error::SdkLoadStall { backend: SdkBackend::YouTube, waited_ms: 1 }.is_fatal());
    }

    #[test]
    fn test_stall_message_names_backend() {
        let err = Error::SdkLoadStall { backend: SdkBackend::YouTube, waited_ms: 15000 };
        assert_eq!(err.to_string(), "YouTube SDK did not become ready within 15000ms");
    }
}
