//! Caller-facing error types.
//!
//! Wire-level failures arrive as [`EjbError`]; they are converted into the
//! conventions below only at the proxy and naming-context boundary.

use ejb_core::{EjbError, RemoteThrowable};
use thiserror::Error;

/// Boxed underlying cause of a remote or container failure.
pub type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Error returned from proxy operations.
///
/// `Remote`/`NoSuchObject` are what callers of legacy remote interfaces see;
/// `Ejb`/`NoSuchEjb` are what callers of business interfaces see. Both carry
/// the original cause.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Business logic rejected the call. The reference stays valid.
    #[error("application exception: {0}")]
    Application(RemoteThrowable),

    /// System failure seen through a legacy remote interface.
    #[error("remote exception: {message}")]
    Remote {
        /// Description of the failure.
        message: String,
        /// Original cause.
        #[source]
        cause: Option<Cause>,
    },

    /// Stale reference seen through a legacy remote interface.
    #[error("no such object: {0}")]
    NoSuchObject(String),

    /// System failure seen through a business interface.
    #[error("EJB exception: {message}")]
    Ejb {
        /// Description of the failure.
        message: String,
        /// Original cause.
        #[source]
        cause: Option<Cause>,
    },

    /// Stale reference seen through a business interface.
    #[error("no such EJB: {0}")]
    NoSuchEjb(String),

    /// A finder by primary key matched nothing.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The operation is not legal for this kind of component or interface.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// An incoming object graph was refused by the class filter.
    #[error("security failure: {0}")]
    Security(#[source] EjbError),

    /// The response could not be understood.
    #[error("protocol failure: {0}")]
    Protocol(#[source] EjbError),

    /// The asynchronous invocation was cancelled.
    #[error("invocation cancelled")]
    Cancelled,
}

impl InvocationError {
    /// Returns true for stale-reference errors of either convention.
    pub fn is_no_such_object(&self) -> bool {
        matches!(self, InvocationError::NoSuchObject(_) | InvocationError::NoSuchEjb(_))
    }

    /// Returns true for system failures of either convention.
    pub fn is_system(&self) -> bool {
        matches!(self, InvocationError::Remote { .. } | InvocationError::Ejb { .. })
    }

    /// Returns the application exception, if this is one.
    pub fn application_exception(&self) -> Option<&RemoteThrowable> {
        match self {
            InvocationError::Application(t) => Some(t),
            _ => None,
        }
    }
}

/// Error returned from naming operations.
#[derive(Debug, Error)]
pub enum NamingError {
    /// The name is not bound.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// The server raised a naming exception.
    #[error("naming exception: {0}")]
    Naming(RemoteThrowable),

    /// The server raised a runtime exception.
    #[error("runtime exception: {0}")]
    Runtime(RemoteThrowable),

    /// The server reported an error.
    #[error("remote error: {0}")]
    Remote(RemoteThrowable),

    /// Authentication was refused.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The context has not authenticated or has been closed.
    #[error("context is not authenticated")]
    NotAuthenticated,

    /// The bound object cannot be used as requested.
    #[error("bound object of class {class} cannot be used as {expected}")]
    UnexpectedBinding {
        /// Class of what is bound.
        class: String,
        /// What the caller asked for.
        expected: &'static str,
    },

    /// Transport, protocol or codec failure.
    #[error(transparent)]
    Communication(#[from] EjbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_classification() {
        assert!(InvocationError::NoSuchEjb("x".into()).is_no_such_object());
        assert!(InvocationError::NoSuchObject("x".into()).is_no_such_object());
        let remote = InvocationError::Remote {
            message: "boom".into(),
            cause: None,
        };
        assert!(remote.is_system());
        assert!(!remote.is_no_such_object());
    }

    #[test]
    fn test_system_error_keeps_cause() {
        let cause = RemoteThrowable::new("java.lang.NullPointerException", Some("npe".into()));
        let err = InvocationError::Ejb {
            message: "invocation failed".into(),
            cause: Some(Box::new(cause)),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "java.lang.NullPointerException: npe");
    }

    #[test]
    fn test_naming_error_from_core() {
        let err: NamingError = EjbError::Connection("refused".into()).into();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InvocationError>();
        assert_send_sync::<NamingError>();
    }
}
