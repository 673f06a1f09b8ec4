//! Login credentials sent in authentication requests.

use std::fmt;

use ejb_core::protocol::AuthenticationRequest;
use ejb_core::Value;

use crate::config::SecurityConfig;

/// Credentials presented to the server when a naming context authenticates.
#[derive(Clone, PartialEq)]
pub enum Credentials {
    /// User name and password.
    UsernamePassword {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },
    /// An opaque bearer token, sent with an anonymous principal.
    Token(String),
}

impl Credentials {
    /// Creates user name and password credentials.
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads credentials from the security configuration.
    ///
    /// A user name without a password logs in with an empty password.
    pub fn from_config(config: &SecurityConfig) -> Option<Self> {
        config.username().map(|username| {
            Self::username_password(username, config.password().unwrap_or_default())
        })
    }

    /// Returns the principal name, if any.
    pub fn principal(&self) -> Option<&str> {
        match self {
            Credentials::UsernamePassword { username, .. } => Some(username),
            Credentials::Token(_) => None,
        }
    }

    /// Builds the authentication request for these credentials.
    pub fn to_request(&self, realm: Option<&str>) -> AuthenticationRequest {
        let request = match self {
            Credentials::UsernamePassword { username, password } => {
                AuthenticationRequest::new(username.as_str(), password.as_str())
            }
            Credentials::Token(token) => AuthenticationRequest::new(Value::Null, token.as_str()),
        };
        match realm {
            Some(realm) => request.with_realm(realm),
            None => request,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}
