//! Home proxies: factories and finders for component instances.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ejb_core::{BufferInput, ClientMetaData, EjbError, EjbMetaData, ServerMetaData, Value};

use super::handle::{Handle, HomeHandle};
use super::handler::InvocationHandler;
use super::interface::{InterfaceDescriptor, MethodDescriptor};
use super::object::EjbObject;
use super::operation::{Call, Operation, Reply};
use crate::client::EjbClient;
use crate::error::InvocationError;

const FIND_BY_PRIMARY_KEY: &str = "findByPrimaryKey";
const DEFAULT_KEY_CLASS: &str = "java.lang.Object";

/// Outcome of a finder.
#[derive(Debug, Clone, PartialEq)]
pub enum FindResult {
    /// A single instance.
    One(EjbObject),
    /// Several instances, in server order.
    Many(Vec<EjbObject>),
    /// Nothing matched.
    None,
}

impl FindResult {
    /// Returns every found object.
    pub fn into_vec(self) -> Vec<EjbObject> {
        match self {
            FindResult::One(object) => vec![object],
            FindResult::Many(objects) => objects,
            FindResult::None => Vec::new(),
        }
    }

    /// Returns the single object, if exactly one was found.
    pub fn into_one(self) -> Option<EjbObject> {
        match self {
            FindResult::One(object) => Some(object),
            _ => None,
        }
    }
}

/// Proxy for a component's home interface.
#[derive(Clone)]
pub struct EjbHome {
    handler: Arc<InvocationHandler>,
    interface: Arc<InterfaceDescriptor>,
}

impl EjbHome {
    /// Creates a home proxy for a descriptor with a home interface.
    pub(crate) fn new(
        client: EjbClient,
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        context: ClientMetaData,
    ) -> ejb_core::Result<Self> {
        let name = meta.home_interface.as_deref().ok_or_else(|| {
            EjbError::Configuration(format!("{} has no home interface", meta.deployment_id))
        })?;
        let interface = client.interfaces().get(name)?;
        let handler = InvocationHandler::home(client, meta, server, context, interface.style());
        Ok(Self { handler, interface })
    }

    /// Returns the invocation handler.
    pub fn handler(&self) -> &InvocationHandler {
        &self.handler
    }

    /// Returns the home interface.
    pub fn interface(&self) -> &InterfaceDescriptor {
        &self.interface
    }

    /// Returns true until the reference is invalidated.
    pub fn is_valid(&self) -> bool {
        self.handler.is_valid()
    }

    /// Calls the `create` method taking `arguments`.
    pub async fn create(&self, arguments: Vec<Value>) -> Result<EjbObject, InvocationError> {
        self.create_with("create", arguments).await
    }

    /// Calls a named create method.
    pub async fn create_with(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<EjbObject, InvocationError> {
        let call = self.resolve(method, arguments)?;
        match self.handler.dispatch(Operation::Create(call)).await? {
            Reply::Created(primary_key) => self.object(primary_key),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Calls a finder.
    ///
    /// A not-found response yields [`FindResult::None`]. Finders are only
    /// available on entity homes.
    pub async fn find(
        &self,
        finder: &str,
        arguments: Vec<Value>,
    ) -> Result<FindResult, InvocationError> {
        self.ensure_findable()?;
        let call = self.resolve(finder, arguments)?;
        self.find_call(call).await
    }

    /// Finds by primary key; not-found is an error.
    ///
    /// Works whether or not the home interface declares `findByPrimaryKey`.
    pub async fn find_by_primary_key(
        &self,
        primary_key: Value,
    ) -> Result<FindResult, InvocationError> {
        self.ensure_findable()?;
        let described = format!("{}:{}", self.handler.deployment_id(), primary_key);
        let call = match self.interface.method(FIND_BY_PRIMARY_KEY, 1) {
            Some(method) => Call::new(&self.interface, method, vec![primary_key]),
            None => {
                let key_class = self
                    .handler
                    .meta()
                    .primary_key_class
                    .as_deref()
                    .unwrap_or(DEFAULT_KEY_CLASS);
                let method = MethodDescriptor::new(FIND_BY_PRIMARY_KEY, [key_class]);
                Call::new(&self.interface, &method, vec![primary_key])
            }
        }
        .map_err(|e| InvocationError::Unsupported(e.to_string()))?;

        match self.find_call(call).await? {
            FindResult::None => Err(InvocationError::ObjectNotFound(described)),
            found => Ok(found),
        }
    }

    /// Calls any other home method.
    pub async fn home_method(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, InvocationError> {
        let call = self.resolve(method, arguments)?;
        match self.handler.dispatch(Operation::HomeMethod(call)).await? {
            Reply::Value(value) => Ok(value),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Removes an entity by primary key and invalidates every proxy of it.
    pub async fn remove_by_primary_key(&self, primary_key: Value) -> Result<(), InvocationError> {
        if !self.handler.policy().allows_remove_by_primary_key() {
            self.handler.ensure_valid()?;
            return Err(InvocationError::Unsupported(format!(
                "{} is a session component and cannot be removed by primary key",
                self.handler.deployment_id()
            )));
        }
        match self
            .handler
            .dispatch(Operation::RemoveByPrimaryKey(primary_key.clone()))
            .await?
        {
            Reply::Value(_) => {
                self.handler.invalidate_identity(&primary_key);
                Ok(())
            }
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Removes the object a handle refers to.
    ///
    /// Stateful and entity homes only accept handles of their own deployment.
    pub async fn remove_by_handle(&self, handle: &Handle) -> Result<(), InvocationError> {
        self.handler.ensure_valid()?;
        if self.handler.policy().checks_handle_deployment()
            && handle.deployment_id() != self.handler.deployment_id()
        {
            return Err(InvocationError::Unsupported(format!(
                "handle of {} cannot be removed through the home of {}",
                handle.deployment_id(),
                self.handler.deployment_id()
            )));
        }
        let object = handle
            .object(self.handler.client())
            .map_err(InvocationError::Protocol)?;
        object.remove().await
    }

    /// Asks the server for the component's descriptor.
    ///
    /// A reply carrying an encoded descriptor is returned as sent; any other
    /// value means the server accepted the call and the descriptor this home
    /// was resolved with stands.
    pub async fn get_ejb_meta_data(&self) -> Result<Arc<EjbMetaData>, InvocationError> {
        match self.handler.dispatch(Operation::GetMetaData).await? {
            Reply::Value(Value::Bytes(bytes)) => EjbMetaData::decode(&mut BufferInput::new(&bytes))
                .map(Arc::new)
                .map_err(InvocationError::Protocol),
            Reply::Value(_) => Ok(Arc::clone(self.handler.meta())),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Asks the server for a handle to this home.
    pub async fn get_home_handle(&self) -> Result<HomeHandle, InvocationError> {
        match self.handler.dispatch(Operation::GetHomeHandle).await? {
            Reply::Value(_) => Ok(self.home_handle()),
            other => Err(self.handler.unexpected(other)),
        }
    }

    /// Returns the serializable replacement of this proxy, without a round trip.
    pub fn write_replace(&self) -> Result<HomeHandle, InvocationError> {
        self.handler.ensure_valid()?;
        Ok(self.home_handle())
    }

    fn home_handle(&self) -> HomeHandle {
        HomeHandle::new(Arc::clone(self.handler.meta()), self.handler.server().clone())
    }

    fn ensure_findable(&self) -> Result<(), InvocationError> {
        self.handler.ensure_valid()?;
        if !self.handler.policy().allows_find() {
            return Err(InvocationError::Unsupported(format!(
                "{} is a session component and has no finders",
                self.handler.deployment_id()
            )));
        }
        Ok(())
    }

    async fn find_call(&self, call: Call) -> Result<FindResult, InvocationError> {
        match self.handler.dispatch(Operation::Find(call)).await? {
            Reply::Found(primary_key) => Ok(FindResult::One(self.object(primary_key)?)),
            Reply::FoundMany(keys) => keys
                .into_iter()
                .map(|key| self.object(key))
                .collect::<Result<Vec<_>, _>>()
                .map(FindResult::Many),
            Reply::NotFound => Ok(FindResult::None),
            other => Err(self.handler.unexpected(other)),
        }
    }

    fn resolve(&self, method: &str, arguments: Vec<Value>) -> Result<Call, InvocationError> {
        self.handler.ensure_valid()?;
        Call::resolve(&self.interface, method, arguments)
            .map(|(call, _)| call)
            .map_err(|e| InvocationError::Unsupported(e.to_string()))
    }

    fn object(&self, primary_key: Value) -> Result<EjbObject, InvocationError> {
        EjbObject::legacy(
            self.handler.client().clone(),
            Arc::clone(self.handler.meta()),
            self.handler.server().clone(),
            self.handler.context().clone(),
            primary_key,
        )
        .map_err(InvocationError::Protocol)
    }
}

impl fmt::Display for EjbHome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy={}", self.handler)
    }
}

impl fmt::Debug for EjbHome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjbHome")
            .field("handler", &self.handler)
            .field("interface", &self.interface.name())
            .finish()
    }
}

impl PartialEq for EjbHome {
    fn eq(&self, other: &Self) -> bool {
        self.handler.proxy_identity() == other.handler.proxy_identity()
    }
}

impl Eq for EjbHome {}

impl Hash for EjbHome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handler.proxy_identity().hash(state);
    }
}
