use std::fmt;
use std::sync::{Arc, RwLock};

use ejb_core::protocol::{
    AuthenticationResponse, JndiMethod, JndiRequest, JndiResponse, NameClassPair, Response,
};
use ejb_core::{ClientMetaData, EjbError, ServerMetaData, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::EjbClient;
use crate::error::NamingError;
use crate::invocation::{EjbHome, EjbObject};
use crate::security::Credentials;

const URL_PREFIX: &str = "java:";
const CONTEXT_CLASS: &str = "javax.naming.Context";

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A plain bound value.
    Value(Value),
    /// A sub-context.
    Context(InitialContext),
    /// A home proxy.
    Home(EjbHome),
    /// A business-interface object proxy.
    Object(EjbObject),
}

impl Binding {
    /// Returns the class name of what is bound.
    pub fn class_name(&self) -> String {
        match self {
            Binding::Value(value) => value_class(value).to_string(),
            Binding::Context(_) => CONTEXT_CLASS.to_string(),
            Binding::Home(home) => home.interface().name().to_string(),
            Binding::Object(object) => object
                .interfaces()
                .first()
                .map(|i| i.name().to_string())
                .unwrap_or_else(|| object.handler().deployment_id().to_string()),
        }
    }
}

fn value_class(value: &Value) -> &str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "java.lang.Boolean",
        Value::Byte(_) => "java.lang.Byte",
        Value::Short(_) => "java.lang.Short",
        Value::Char(_) => "java.lang.Character",
        Value::Int(_) => "java.lang.Integer",
        Value::Long(_) => "java.lang.Long",
        Value::Float(_) => "java.lang.Float",
        Value::Double(_) => "java.lang.Double",
        Value::String(_) => "java.lang.String",
        Value::Bytes(_) => "byte[]",
        Value::List(_) => "java.util.List",
        Value::Map(_) => "java.util.Map",
        Value::Object(object) => object.class_name(),
    }
}

#[derive(Debug, Clone)]
enum ContextState {
    Unauthenticated,
    Authenticated {
        server: ServerMetaData,
        identity: ClientMetaData,
    },
}

struct ContextInner {
    client: EjbClient,
    state: RwLock<ContextState>,
}

/// A naming context bound to one server and one identity.
///
/// Sub-contexts returned by [`lookup`](Self::lookup) share the parent's
/// state, so closing any of them closes all.
#[derive(Clone)]
pub struct InitialContext {
    inner: Arc<ContextInner>,
    prefix: String,
}

impl InitialContext {
    /// Connects using the credentials in the client configuration, if any.
    pub async fn connect(client: &EjbClient, url: &str) -> Result<Self, NamingError> {
        let credentials = Credentials::from_config(client.config().security());
        Self::connect_with(client, url, credentials).await
    }

    /// Connects with explicit credentials.
    ///
    /// Without credentials the context is usable at once with an empty
    /// identity and no round trip is made.
    #[instrument(name = "ejb_client.jndi.connect", skip(client, credentials))]
    pub async fn connect_with(
        client: &EjbClient,
        url: &str,
        credentials: Option<Credentials>,
    ) -> Result<Self, NamingError> {
        let server = ServerMetaData::parse(url)?;
        let state = match credentials {
            None => ContextState::Authenticated {
                server,
                identity: ClientMetaData::new(Value::Null),
            },
            Some(credentials) => match client.authenticate(&server, &credentials).await? {
                AuthenticationResponse::Granted(identity) => {
                    info!(server = %server, "naming context authenticated");
                    ContextState::Authenticated { server, identity }
                }
                AuthenticationResponse::Redirected(identity, target) => {
                    info!(from = %server, to = %target, "naming context redirected");
                    ContextState::Authenticated {
                        server: target,
                        identity,
                    }
                }
                AuthenticationResponse::Denied(reason) => {
                    warn!(server = %server, "naming context authentication denied");
                    return Err(NamingError::Authentication(
                        reason.unwrap_or_else(|| "authentication denied".to_string()),
                    ));
                }
            },
        };
        Ok(Self {
            inner: Arc::new(ContextInner {
                client: client.clone(),
                state: RwLock::new(state),
            }),
            prefix: String::new(),
        })
    }

    /// Returns the server all traffic of this context goes to.
    pub fn server(&self) -> Result<ServerMetaData, NamingError> {
        self.authenticated().map(|(server, _)| server)
    }

    /// Returns the identity token of this context.
    pub fn identity(&self) -> Result<Value, NamingError> {
        self.authenticated().map(|(_, identity)| identity.identity().clone())
    }

    /// Returns the name path of this context relative to the root.
    pub fn name_in_namespace(&self) -> &str {
        &self.prefix
    }

    /// Returns true until the context is closed.
    pub fn is_open(&self) -> bool {
        matches!(self.read_state(), ContextState::Authenticated { .. })
    }

    /// Resolves a name.
    ///
    /// An empty name returns this context. Sub-contexts are built locally.
    pub async fn lookup(&self, name: &str) -> Result<Binding, NamingError> {
        let (server, identity) = self.authenticated()?;
        let relative = normalize(name);
        if relative.is_empty() {
            return Ok(Binding::Context(self.clone()));
        }
        let full = self.compose(relative);
        debug!(name = %full, "lookup");

        match self.request(&server, JndiMethod::Lookup, &full).await? {
            JndiResponse::Ok(value) => Ok(Binding::Value(value)),
            JndiResponse::Context => Ok(Binding::Context(Self {
                inner: Arc::clone(&self.inner),
                prefix: full,
            })),
            JndiResponse::EjbHome(meta) => {
                let home = EjbHome::new(self.client().clone(), Arc::new(meta), server, identity)?;
                Ok(Binding::Home(home))
            }
            JndiResponse::BusinessObject(meta, primary_key) => {
                let object = EjbObject::business(
                    self.client().clone(),
                    Arc::new(meta),
                    server,
                    identity,
                    primary_key,
                )?;
                Ok(Binding::Object(object))
            }
            other => Err(failure(other, &full)),
        }
    }

    /// Looks up a home proxy.
    pub async fn lookup_home(&self, name: &str) -> Result<EjbHome, NamingError> {
        match self.lookup(name).await? {
            Binding::Home(home) => Ok(home),
            other => Err(NamingError::UnexpectedBinding {
                class: other.class_name(),
                expected: "a home",
            }),
        }
    }

    /// Looks up a business-interface object proxy.
    pub async fn lookup_object(&self, name: &str) -> Result<EjbObject, NamingError> {
        match self.lookup(name).await? {
            Binding::Object(object) => Ok(object),
            other => Err(NamingError::UnexpectedBinding {
                class: other.class_name(),
                expected: "a business object",
            }),
        }
    }

    /// Looks up a sub-context.
    pub async fn lookup_context(&self, name: &str) -> Result<InitialContext, NamingError> {
        match self.lookup(name).await? {
            Binding::Context(context) => Ok(context),
            other => Err(NamingError::UnexpectedBinding {
                class: other.class_name(),
                expected: "a context",
            }),
        }
    }

    /// Lists the names and classes bound in a context.
    pub async fn list(&self, name: &str) -> Result<Vec<NameClassPair>, NamingError> {
        self.enumerate(JndiMethod::List, name).await
    }

    /// Lists the names, classes and bound values of a context.
    pub async fn list_bindings(&self, name: &str) -> Result<Vec<NameClassPair>, NamingError> {
        self.enumerate(JndiMethod::ListBindings, name).await
    }

    /// Logs the context's identity out and makes the context unusable.
    ///
    /// A logout refused by the server is logged and otherwise ignored.
    /// Closing an already closed context does nothing.
    pub async fn close(&self) -> Result<(), NamingError> {
        let previous = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *state, ContextState::Unauthenticated)
        };
        let ContextState::Authenticated { server, identity } = previous else {
            return Ok(());
        };
        let identity = identity.into_identity();
        if identity.is_null() {
            debug!(server = %server, "closing anonymous naming context");
            return Ok(());
        }
        match self.client().release(&server, identity).await {
            Ok(()) => {
                info!(server = %server, "naming context logged out");
                Ok(())
            }
            Err(EjbError::Authentication(reason)) => {
                warn!(server = %server, reason = %reason, "logout refused, context closed anyway");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn client(&self) -> &EjbClient {
        &self.inner.client
    }

    async fn enumerate(
        &self,
        method: JndiMethod,
        name: &str,
    ) -> Result<Vec<NameClassPair>, NamingError> {
        let (server, _) = self.authenticated()?;
        let full = self.compose(normalize(name));
        match self.request(&server, method, &full).await? {
            JndiResponse::Enumeration(entries) => Ok(entries),
            other => Err(failure(other, &full)),
        }
    }

    async fn request(
        &self,
        server: &ServerMetaData,
        method: JndiMethod,
        name: &str,
    ) -> Result<JndiResponse, NamingError> {
        match self
            .client()
            .execute(server, JndiRequest::new(method, name))
            .await?
        {
            Response::Jndi(response) => Ok(response),
            other => Err(NamingError::Communication(EjbError::Protocol(format!(
                "naming request answered with a {:?} response",
                other.request_type()
            )))),
        }
    }

    fn read_state(&self) -> ContextState {
        self.inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn authenticated(&self) -> Result<(ServerMetaData, ClientMetaData), NamingError> {
        match self.read_state() {
            ContextState::Authenticated { server, identity } => Ok((server, identity)),
            ContextState::Unauthenticated => Err(NamingError::NotAuthenticated),
        }
    }

    fn compose(&self, relative: &str) -> String {
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, relative),
        }
    }
}

/// Strips the URL scheme and leading slashes from a name.
fn normalize(name: &str) -> &str {
    name.strip_prefix(URL_PREFIX)
        .unwrap_or(name)
        .trim_start_matches('/')
}

fn failure(response: JndiResponse, name: &str) -> NamingError {
    match response {
        JndiResponse::NotFound => NamingError::NameNotFound(name.to_string()),
        JndiResponse::NamingException(t) => NamingError::Naming(t),
        JndiResponse::RuntimeException(t) => NamingError::Runtime(t),
        JndiResponse::Error(t) => NamingError::Remote(t),
        other => NamingError::Communication(EjbError::Protocol(format!(
            "unexpected naming response code {} for {}",
            other.code(),
            name
        ))),
    }
}

impl fmt::Debug for InitialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("InitialContext");
        s.field("prefix", &self.prefix);
        match self.read_state() {
            ContextState::Authenticated { server, .. } => {
                s.field("server", &server.location().as_str())
            }
            ContextState::Unauthenticated => s.field("server", &"<closed>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejb_core::RemoteThrowable;

    #[test]
    fn test_normalize_strips_scheme_and_slashes() {
        assert_eq!(normalize("java:/comp/env"), "comp/env");
        assert_eq!(normalize("/Calculator"), "Calculator");
        assert_eq!(normalize("java:"), "");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn test_failure_keeps_remote_kind() {
        let t = RemoteThrowable::new("javax.naming.NamingException", Some("bad".into()));
        assert!(matches!(
            failure(JndiResponse::NamingException(t.clone()), "x"),
            NamingError::Naming(_)
        ));
        assert!(matches!(
            failure(JndiResponse::RuntimeException(t.clone()), "x"),
            NamingError::Runtime(_)
        ));
        assert!(matches!(failure(JndiResponse::Error(t), "x"), NamingError::Remote(_)));
        assert!(matches!(
            failure(JndiResponse::NotFound, "a/b"),
            NamingError::NameNotFound(name) if name == "a/b"
        ));
        assert!(matches!(
            failure(JndiResponse::Context, "x"),
            NamingError::Communication(EjbError::Protocol(_))
        ));
    }

    #[test]
    fn test_value_class_names() {
        assert_eq!(value_class(&Value::from("s")), "java.lang.String");
        assert_eq!(value_class(&Value::from(1i32)), "java.lang.Integer");
        let object = Value::object("org.acme.Config", [("k", Value::from(1i64))]);
        assert_eq!(value_class(&object), "org.acme.Config");
    }
}
