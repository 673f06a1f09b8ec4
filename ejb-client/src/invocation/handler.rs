//! The dispatch engine shared by home and object proxies.
//!
//! A handler is valid until the server reports a system failure, the object
//! is removed, or another handler with the same identity key is invalidated.
//! Invalid handlers fail every call without touching the network.

use std::fmt;
use std::sync::Arc;

use ejb_core::protocol::{Argument, EjbRequest, EjbResponse, Response};
use ejb_core::{ClientMetaData, EjbError, EjbMetaData, ServerMetaData, Value};
use tracing::{debug, warn};

use super::interface::InterfaceStyle;
use super::operation::{Operation, Reply};
use super::policy::{key_bytes, BeanPolicy, IdentityKey};
use super::registry::HandlerState;
use crate::client::EjbClient;
use crate::error::{Cause, InvocationError};
use crate::event::ClientEvent;

/// Whether a handler backs a home or an object proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// Home proxy.
    Home,
    /// Object proxy.
    Object,
}

/// The invocation handler behind one proxy.
pub struct InvocationHandler {
    client: EjbClient,
    meta: Arc<EjbMetaData>,
    server: ServerMetaData,
    context: ClientMetaData,
    style: InterfaceStyle,
    policy: BeanPolicy,
    kind: ProxyKind,
    primary_key: Value,
    key_bytes: Vec<u8>,
    identity_key: Option<IdentityKey>,
    state: Arc<HandlerState>,
}

impl InvocationHandler {
    /// Creates a home handler.
    pub(crate) fn home(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
        style: InterfaceStyle,
    ) -> Arc<Self> {
        let policy = BeanPolicy::for_component(meta.component_type);
        Arc::new(Self {
            client,
            meta,
            server,
            context,
            style,
            policy,
            kind: ProxyKind::Home,
            primary_key: Value::Null,
            key_bytes: Vec::new(),
            identity_key: None,
            state: HandlerState::new(),
        })
    }

    /// Creates an object handler and registers it under its identity key.
    pub(crate) fn object(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
        style: InterfaceStyle,
        primary_key: Value,
    ) -> ejb_core::Result<Arc<Self>> {
        let policy = BeanPolicy::for_component(meta.component_type);
        let key_bytes = key_bytes(client.codec(), &primary_key)?;
        let identity_key = policy.identity_key(client.codec(), &meta.deployment_id, &primary_key)?;
        let handler = Arc::new(Self {
            client,
            meta,
            server,
            context,
            style,
            policy,
            kind: ProxyKind::Object,
            primary_key,
            key_bytes,
            identity_key,
            state: HandlerState::new(),
        });
        if let Some(key) = &handler.identity_key {
            handler.client.handles().register(key.clone(), &handler.state);
        }
        Ok(handler)
    }

    /// Returns the bean descriptor.
    pub fn meta(&self) -> &Arc<EjbMetaData> {
        &self.meta
    }

    /// Returns the deployment id.
    pub fn deployment_id(&self) -> &str {
        &self.meta.deployment_id
    }

    /// Returns the server this proxy talks to.
    pub fn server(&self) -> &ServerMetaData {
        &self.server
    }

    /// Returns the primary key; `Null` for homes and stateless objects.
    pub fn primary_key(&self) -> &Value {
        &self.primary_key
    }

    /// Returns the error convention of the proxy's interface.
    pub fn style(&self) -> InterfaceStyle {
        self.style
    }

    /// Returns the component policy.
    pub fn policy(&self) -> BeanPolicy {
        self.policy
    }

    /// Returns whether this is a home or object handler.
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    /// Returns the registry key, if this handler is grouped.
    pub fn identity_key(&self) -> Option<&IdentityKey> {
        self.identity_key.as_ref()
    }

    /// Returns true until the handler is invalidated.
    pub fn is_valid(&self) -> bool {
        !self.state.is_invalid()
    }

    pub(crate) fn client(&self) -> &EjbClient {
        &self.client
    }

    pub(crate) fn context(&self) -> &ClientMetaData {
        &self.context
    }

    /// Identity used for equality and hashing of proxies.
    pub(crate) fn proxy_identity(&self) -> (ProxyKind, &str, &[u8]) {
        (self.kind, self.meta.deployment_id.as_str(), self.key_bytes.as_slice())
    }

    /// Invalidates this handler and every handler sharing its identity key.
    ///
    /// Returns the number of handlers that changed state; calling it again is
    /// a no-op returning 0.
    pub fn invalidate(&self) -> usize {
        let mut count = usize::from(self.state.invalidate());
        if let Some(key) = &self.identity_key {
            count += self.client.handles().invalidate_group(key);
        }
        if count > 0 {
            warn!(
                deployment = %self.meta.deployment_id,
                primary_key = %self.primary_key,
                count,
                "reference invalidated"
            );
            self.client.events().publish(ClientEvent::ReferenceInvalidated {
                deployment_id: self.meta.deployment_id.clone(),
                primary_key: self.primary_key.to_string(),
                count,
            });
        }
        count
    }

    /// Invalidates every registered object proxy of `primary_key` in this
    /// handler's deployment.
    pub(crate) fn invalidate_identity(&self, primary_key: &Value) -> usize {
        let key = match self
            .policy
            .identity_key(self.client.codec(), &self.meta.deployment_id, primary_key)
        {
            Ok(Some(key)) => key,
            Ok(None) => return 0,
            Err(e) => {
                debug!(error = %e, "primary key cannot be keyed, nothing to invalidate");
                return 0;
            }
        };
        let count = self.client.handles().invalidate_group(&key);
        if count > 0 {
            warn!(
                deployment = %self.meta.deployment_id,
                primary_key = %primary_key,
                count,
                "references invalidated by removal"
            );
            self.client.events().publish(ClientEvent::ReferenceInvalidated {
                deployment_id: self.meta.deployment_id.clone(),
                primary_key: primary_key.to_string(),
                count,
            });
        }
        count
    }

    /// Fails with the stale-reference error if the handler is invalid.
    pub(crate) fn ensure_valid(&self) -> Result<(), InvocationError> {
        if self.state.is_invalid() {
            return Err(self.stale());
        }
        Ok(())
    }

    /// Sends one operation and maps the response.
    pub(crate) async fn dispatch(&self, operation: Operation) -> Result<Reply, InvocationError> {
        self.ensure_valid()?;
        debug!(
            deployment = %self.meta.deployment_id,
            operation = %operation,
            "dispatching"
        );
        let request = self.request(operation);

        let response = match self.client.execute(&self.server, request).await {
            Ok(Response::Ejb(response)) => response,
            Ok(other) => {
                self.invalidate();
                return Err(InvocationError::Protocol(EjbError::Protocol(format!(
                    "invocation answered with a {:?} response",
                    other.request_type()
                ))));
            }
            Err(error) => return Err(self.communication_failure(error)),
        };

        match Reply::from_response(response) {
            Ok(reply) => Ok(reply),
            Err(EjbResponse::ApplicationException(t)) => {
                debug!(exception = %t, "application exception");
                Err(InvocationError::Application(t))
            }
            Err(EjbResponse::SystemException(t)) => {
                self.invalidate();
                let message = t.to_string();
                Err(self.system_error(message, Some(Box::new(t))))
            }
            Err(EjbResponse::Error(t)) => {
                self.invalidate();
                Err(InvocationError::Protocol(EjbError::Protocol(format!(
                    "server error: {}",
                    t
                ))))
            }
            Err(other) => {
                self.invalidate();
                Err(InvocationError::Protocol(EjbError::Protocol(format!(
                    "unrecognized invocation response code {}",
                    other.code()
                ))))
            }
        }
    }

    /// Invalidates and reports a reply that does not fit the operation.
    pub(crate) fn unexpected(&self, reply: Reply) -> InvocationError {
        self.invalidate();
        InvocationError::Protocol(EjbError::Protocol(format!(
            "unexpected {} reply",
            reply.kind()
        )))
    }

    /// Maps a failure below the response level.
    ///
    /// Transport failures leave the reference valid; undecodable responses
    /// invalidate it.
    pub(crate) fn communication_failure(&self, error: EjbError) -> InvocationError {
        if error.is_security() {
            warn!(error = %error, "invocation refused on security grounds");
            return InvocationError::Security(error);
        }
        if error.is_transport() || matches!(error, EjbError::Configuration(_)) {
            let message = error.to_string();
            return self.system_error(message, Some(Box::new(error)));
        }
        self.invalidate();
        InvocationError::Protocol(error)
    }

    fn system_error(&self, message: String, cause: Option<Cause>) -> InvocationError {
        match self.style {
            InterfaceStyle::Legacy => InvocationError::Remote { message, cause },
            InterfaceStyle::Business => InvocationError::Ejb { message, cause },
        }
    }

    fn stale(&self) -> InvocationError {
        let description = self.to_string();
        match self.style {
            InterfaceStyle::Legacy => InvocationError::NoSuchObject(description),
            InterfaceStyle::Business => InvocationError::NoSuchEjb(description),
        }
    }

    /// Resolves the caller identity on the current task.
    ///
    /// The naming context's identity wins; otherwise the client's resolver
    /// decides.
    pub(crate) fn identity(&self) -> Value {
        match self.context.identity() {
            Value::Null => self.client.security().identity().unwrap_or_default(),
            identity => identity.clone(),
        }
    }

    fn request(&self, operation: Operation) -> EjbRequest {
        let mut request = EjbRequest::new(operation.request_method(), self.meta.deployment_id.as_str());
        request.deployment_code = self.meta.deployment_code;
        request.client_identity = self.identity();
        request.primary_key = self.primary_key.clone();
        match operation {
            Operation::Create(call)
            | Operation::Find(call)
            | Operation::HomeMethod(call)
            | Operation::Business(call) => {
                request.interface_class = Some(call.signature.declaring_class.clone());
                request.signature = Some(call.signature);
                request.arguments = call.arguments;
                request.request_id = call.request_id;
                if let Some(identity) = call.identity {
                    request.client_identity = identity;
                }
            }
            Operation::RemoveByPrimaryKey(key) | Operation::IsIdentical(key) => {
                request.arguments = vec![Argument::Object(key)];
            }
            Operation::Cancel {
                request_id,
                may_interrupt,
            } => {
                request.request_id = Some(request_id);
                request.arguments = vec![Argument::Boolean(may_interrupt)];
            }
            Operation::GetMetaData
            | Operation::GetHomeHandle
            | Operation::Remove
            | Operation::GetPrimaryKey
            | Operation::GetHandle => {}
        }
        request
    }
}

impl fmt::Display for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProxyKind::Home => write!(f, "{} home", self.meta.deployment_id),
            ProxyKind::Object => write!(f, "{}:{}", self.meta.deployment_id, self.primary_key),
        }
    }
}

impl fmt::Debug for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandler")
            .field("deployment", &self.meta.deployment_id)
            .field("kind", &self.kind)
            .field("primary_key", &self.primary_key)
            .field("server", &self.server.location().as_str())
            .field("style", &self.style)
            .field("valid", &self.is_valid())
            .finish()
    }
}
