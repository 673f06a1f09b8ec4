//! Object proxies.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ejb_core::{ClientMetaData, EjbError, EjbMetaData, ServerMetaData, Value};
use tracing::debug;

use super::future::AsyncResult;
use super::handle::Handle;
use super::handler::InvocationHandler;
use super::home::EjbHome;
use super::interface::{InterfaceDescriptor, InterfaceStyle};
use super::operation::{Call, Operation, Reply};
use crate::client::EjbClient;
use crate::error::InvocationError;

/// Proxy for one remote component instance.
///
/// Clones share the handler, so invalidating one invalidates all clones.
#[derive(Clone)]
pub struct EjbObject {
    handler: Arc<InvocationHandler>,
    interfaces: Arc<[Arc<InterfaceDescriptor>]>,
}

impl EjbObject {
    /// Creates a proxy through the descriptor's remote interface.
    pub(crate) fn legacy(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
        primary_key: Value,
    ) -> ejb_core::Result<Self> {
        let name = meta.remote_interface.as_deref().ok_or_else(|| {
            EjbError::Configuration(format!(
                "{} has no remote interface",
                meta.deployment_id
            ))
        })?;
        let interface = client.interfaces().get(name)?;
        Self::build(client, meta, server, context, primary_key, vec![interface])
    }

    /// Creates a proxy through the descriptor's business interfaces.
    pub(crate) fn business(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
        primary_key: Value,
    ) -> ejb_core::Result<Self> {
        if meta.business_interfaces.is_empty() {
            return Err(EjbError::Configuration(format!(
                "{} has no business interface",
                meta.deployment_id
            )));
        }
        let interfaces = meta
            .business_interfaces
            .iter()
            .map(|name| client.interfaces().get(name))
            .collect::<ejb_core::Result<Vec<_>>>()?;
        Self::build(client, meta, server, context, primary_key, interfaces)
    }

    fn build(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
        primary_key: Value,
        interfaces: Vec<Arc<InterfaceDescriptor>>,
    ) -> ejb_core::Result<Self> {
        // The first interface decides the error convention.
        let style = interfaces
            .first()
            .map(|i| i.style())
            .unwrap_or(InterfaceStyle::Legacy);
        let handler = InvocationHandler::object(client, meta, server, context, style, primary_key)?;
        Ok(Self {
            handler,
            interfaces: interfaces.into(),
        })
    }

    /// Returns the invocation handler.
    pub fn handler(&self) -> &InvocationHandler {
        &self.handler
    }

    /// Returns the interfaces this proxy implements.
    pub fn interfaces(&self) -> &[Arc<InterfaceDescriptor>] {
        &self.interfaces
    }

    /// Returns true until the reference is invalidated.
    pub fn is_valid(&self) -> bool {
        self.handler.is_valid()
    }

    /// Invokes a business method and waits for its result.
    ///
    /// Asynchronous methods go through the client's pool.
    pub async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<Value, InvocationError> {
        self.handler.ensure_valid()?;
        let (call, asynchronous) = self.resolve(method, arguments)?;
        if asynchronous {
            return self.submit(call).await?.get().await;
        }
        match self.handler.dispatch(Operation::Business(call)).await? {
            Reply::Value(value) => Ok(value),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Submits an asynchronous business method.
    ///
    /// Fails with [`InvocationError::Unsupported`] if the method is not
    /// asynchronous.
    pub async fn invoke_async(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<AsyncResult, InvocationError> {
        self.handler.ensure_valid()?;
        let (call, asynchronous) = self.resolve(method, arguments)?;
        if !asynchronous {
            return Err(InvocationError::Unsupported(format!(
                "{} is not an asynchronous method",
                call.signature
            )));
        }
        self.submit(call).await
    }

    /// Removes the instance. The reference is invalid afterwards.
    pub async fn remove(&self) -> Result<(), InvocationError> {
        match self.handler.dispatch(Operation::Remove).await? {
            Reply::Value(_) => {
                self.handler.invalidate();
                Ok(())
            }
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Asks the server for the primary key.
    pub async fn get_primary_key(&self) -> Result<Value, InvocationError> {
        match self.handler.dispatch(Operation::GetPrimaryKey).await? {
            Reply::Value(key) => Ok(key),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Asks the server for a handle to this object.
    pub async fn get_handle(&self) -> Result<Handle, InvocationError> {
        match self.handler.dispatch(Operation::GetHandle).await? {
            Reply::Value(_) => Ok(self.handle()),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Asks the server whether `other` is the same instance.
    pub async fn is_identical(&self, other: &EjbObject) -> Result<bool, InvocationError> {
        let other_key = other.handler.primary_key().clone();
        match self.handler.dispatch(Operation::IsIdentical(other_key)).await? {
            Reply::Value(Value::Bool(identical)) => Ok(identical),
            reply => Err(self.handler.unexpected(reply)),
        }
    }

    /// Returns the home of this object's component, without a round trip.
    pub fn get_ejb_home(&self) -> Result<EjbHome, InvocationError> {
        self.handler.ensure_valid()?;
        EjbHome::new(
            self.handler.client().clone(),
            Arc::clone(self.handler.meta()),
            self.handler.server().clone(),
            self.handler.context().clone(),
        )
        .map_err(InvocationError::Protocol)
    }

    /// Returns the serializable replacement of this proxy, without a round trip.
    pub fn write_replace(&self) -> Result<Handle, InvocationError> {
        self.handler.ensure_valid()?;
        Ok(self.handle())
    }

    fn handle(&self) -> Handle {
        Handle::new(
            Arc::clone(self.handler.meta()),
            self.handler.server().clone(),
            self.handler.primary_key().clone(),
            self.handler.style(),
        )
    }

    fn resolve(&self, method: &str, arguments: Vec<Value>) -> Result<(Call, bool), InvocationError> {
        let arity = arguments.len();
        let (interface, descriptor) = self
            .interfaces
            .iter()
            .find_map(|i| i.method(method, arity).map(|m| (i, m)))
            .ok_or_else(|| {
                InvocationError::Unsupported(format!(
                    "{} declares no method {} taking {} arguments",
                    self.handler.deployment_id(),
                    method,
                    arity
                ))
            })?;
        let call = Call::new(interface, descriptor, arguments)
            .map_err(|e| InvocationError::Unsupported(e.to_string()))?;
        let asynchronous =
            descriptor.is_asynchronous() || self.handler.meta().is_asynchronous(&call.signature);
        Ok((call, asynchronous))
    }

    async fn submit(&self, call: Call) -> Result<AsyncResult, InvocationError> {
        let (result, job) = AsyncResult::prepare(Arc::clone(&self.handler), call);
        debug!(request_id = result.request_id(), "submitting asynchronous invocation");
        self.handler
            .client()
            .pool()
            .submit(result.request_id(), job)
            .await
            .map_err(|e| self.handler.communication_failure(e))?;
        Ok(result)
    }
}

impl fmt::Display for EjbObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy={}", self.handler)
    }
}

impl fmt::Debug for EjbObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjbObject")
            .field("handler", &self.handler)
            .finish()
    }
}

impl PartialEq for EjbObject {
    fn eq(&self, other: &Self) -> bool {
        self.handler.proxy_identity() == other.handler.proxy_identity()
    }
}

impl Eq for EjbObject {}

impl Hash for EjbObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handler.proxy_identity().hash(state);
    }
}
