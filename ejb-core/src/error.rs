//! Error types for EJB wire and transport operations.

use std::io;
use thiserror::Error;

/// The main error type for protocol, codec and transport failures.
#[derive(Debug, Error)]
pub enum EjbError {
    /// Connection-related errors (connect refused, broken pipe, closed stream).
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol-related errors (bad magic, unknown discriminant, version mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timeout errors.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// Authentication errors (denied login, missing identity).
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Configuration errors (invalid URI, unknown strategy or scheme).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A class named on the wire could not be resolved locally.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// An incoming object graph named a class refused by the class filter.
    #[error("deserialization rejected for security reasons: class {0} is not allowed")]
    DeserializationRejected(String),

    /// Every candidate server, including the last-resort location, failed.
    #[error("exhausted all servers: {0}")]
    ExhaustedAllServers(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EjbError {
    /// Returns true for failures that happen before a request reaches a server.
    ///
    /// These are the failures the failover layer is allowed to retry elsewhere.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EjbError::Connection(_)
                | EjbError::Timeout(_)
                | EjbError::Io(_)
                | EjbError::ExhaustedAllServers(_)
        )
    }

    /// Returns true for security-classified failures.
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            EjbError::DeserializationRejected(_) | EjbError::Authentication(_)
        )
    }
}

/// A specialized `Result` type for EJB wire operations.
pub type Result<T> = std::result::Result<T, EjbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = EjbError::Connection("failed to connect to server".to_string());
        assert_eq!(
            err.to_string(),
            "connection error: failed to connect to server"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = EjbError::Protocol("unknown request type 42".to_string());
        assert_eq!(err.to_string(), "protocol error: unknown request type 42");
    }

    #[test]
    fn test_deserialization_rejected_display() {
        let err = EjbError::DeserializationRejected("com.acme.Gadget".to_string());
        assert_eq!(
            err.to_string(),
            "deserialization rejected for security reasons: class com.acme.Gadget is not allowed"
        );
        assert!(err.is_security());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_class_not_found_display() {
        let err = EjbError::ClassNotFound("com.acme.AccountHome".to_string());
        assert_eq!(err.to_string(), "class not found: com.acme.AccountHome");
    }

    #[test]
    fn test_transport_classification() {
        assert!(EjbError::Connection("x".into()).is_transport());
        assert!(EjbError::Timeout("x".into()).is_transport());
        assert!(EjbError::ExhaustedAllServers("x".into()).is_transport());
        assert!(!EjbError::Protocol("x".into()).is_transport());
        assert!(!EjbError::Serialization("x".into()).is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: EjbError = io_err.into();
        assert!(matches!(err, EjbError::Io(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_transport());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EjbError>();
    }
}
