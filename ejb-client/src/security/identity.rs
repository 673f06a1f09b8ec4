//! Caller identity resolution.
//!
//! Every outgoing request asks an [`IdentityResolver`] for the identity token
//! to attach. A token set with [`with_identity`] applies to the enclosed
//! future only and wins over the process-wide login held by
//! [`SecurityContext`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use ejb_core::{EjbError, Result, Value};
use tracing::debug;

tokio::task_local! {
    static SCOPED_IDENTITY: Value;
}

/// Names of the built-in resolvers.
const RESOLVER_NAMES: [&str; 3] = ["default", "static", "scoped"];

/// Returns true if `name` is a built-in resolver name.
pub fn is_known_resolver(name: &str) -> bool {
    RESOLVER_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// Runs `f` with `identity` as the scoped caller identity.
pub async fn with_identity<F>(identity: Value, f: F) -> F::Output
where
    F: Future,
{
    SCOPED_IDENTITY.scope(identity, f).await
}

/// Returns the scoped identity of the current task, if any.
pub fn scoped_identity() -> Option<Value> {
    SCOPED_IDENTITY.try_with(Value::clone).ok()
}

/// The process-wide login of one client.
#[derive(Debug, Default)]
pub struct GlobalLogin {
    identity: RwLock<Option<Value>>,
}

impl GlobalLogin {
    /// Creates an empty login.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identity returned by a successful authentication.
    pub fn login(&self, identity: Value) {
        let mut guard = self.identity.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(identity);
    }

    /// Forgets the current login and returns it.
    pub fn logout(&self) -> Option<Value> {
        let mut guard = self.identity.write().unwrap_or_else(|p| p.into_inner());
        guard.take()
    }

    /// Returns the current login.
    pub fn current(&self) -> Option<Value> {
        self.identity
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Strategy for choosing the identity attached to a request.
pub trait IdentityResolver: Send + Sync {
    /// Returns the resolver's name.
    fn name(&self) -> &str;

    /// Resolves the identity for the current call.
    fn resolve(&self, login: &GlobalLogin) -> Option<Value>;
}

impl fmt::Debug for dyn IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityResolver({})", self.name())
    }
}

/// Scoped identity first, then the global login.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIdentityResolver;

impl IdentityResolver for DefaultIdentityResolver {
    fn name(&self) -> &str {
        "default"
    }

    fn resolve(&self, login: &GlobalLogin) -> Option<Value> {
        scoped_identity().or_else(|| login.current())
    }
}

/// The global login only.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticIdentityResolver;

impl IdentityResolver for StaticIdentityResolver {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve(&self, login: &GlobalLogin) -> Option<Value> {
        login.current()
    }
}

/// The scoped identity only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopedIdentityResolver;

impl IdentityResolver for ScopedIdentityResolver {
    fn name(&self) -> &str {
        "scoped"
    }

    fn resolve(&self, _login: &GlobalLogin) -> Option<Value> {
        scoped_identity()
    }
}

/// Returns the built-in resolver with the given name.
pub fn resolver_for_name(name: &str) -> Result<Arc<dyn IdentityResolver>> {
    match name.to_ascii_lowercase().as_str() {
        "default" => Ok(Arc::new(DefaultIdentityResolver)),
        "static" => Ok(Arc::new(StaticIdentityResolver)),
        "scoped" => Ok(Arc::new(ScopedIdentityResolver)),
        other => Err(EjbError::Configuration(format!(
            "unknown identity resolver '{}'",
            other
        ))),
    }
}

/// Identity state owned by one client.
pub struct SecurityContext {
    login: GlobalLogin,
    resolver: Arc<dyn IdentityResolver>,
}

impl SecurityContext {
    /// Creates a context using the named built-in resolver.
    pub fn new(resolver: &str) -> Result<Self> {
        Ok(Self::with_resolver(resolver_for_name(resolver)?))
    }

    /// Creates a context with a custom resolver.
    pub fn with_resolver(resolver: Arc<dyn IdentityResolver>) -> Self {
        debug!(resolver = resolver.name(), "identity resolver selected");
        Self {
            login: GlobalLogin::new(),
            resolver,
        }
    }

    /// Returns the process-wide login.
    pub fn login(&self) -> &GlobalLogin {
        &self.login
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &Arc<dyn IdentityResolver> {
        &self.resolver
    }

    /// Resolves the identity for the current call.
    pub fn identity(&self) -> Option<Value> {
        self.resolver.resolve(&self.login)
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::with_resolver(Arc::new(DefaultIdentityResolver))
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("resolver", &self.resolver.name())
            .field("logged_in", &self.login.current().is_some())
            .finish()
    }
}
