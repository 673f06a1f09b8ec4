//! Serializable references to homes and objects.

use std::sync::Arc;

use ejb_core::{
    ClientMetaData, DataInput, DataOutput, EjbError, EjbMetaData, ObjectCodec, Result,
    ServerMetaData, Value,
};

use super::home::EjbHome;
use super::interface::InterfaceStyle;
use super::object::EjbObject;
use crate::client::EjbClient;

/// A portable reference to one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    meta: Arc<EjbMetaData>,
    server: ServerMetaData,
    primary_key: Value,
    style: InterfaceStyle,
}

impl Handle {
    pub(crate) fn new(
        meta: Arc<EjbMetaData>,
        server: ServerMetaData,
        primary_key: Value,
        style: InterfaceStyle,
    ) -> Self {
        Self {
            meta,
            server,
            primary_key,
            style,
        }
    }

    /// Returns the bean descriptor.
    pub fn meta(&self) -> &EjbMetaData {
        &self.meta
    }

    /// Returns the deployment id.
    pub fn deployment_id(&self) -> &str {
        &self.meta.deployment_id
    }

    /// Returns the server the object lives on.
    pub fn server(&self) -> &ServerMetaData {
        &self.server
    }

    /// Returns the primary key.
    pub fn primary_key(&self) -> &Value {
        &self.primary_key
    }

    /// Builds a proxy for the referenced object.
    pub fn object(&self, client: &EjbClient) -> Result<EjbObject> {
        let context = ClientMetaData::new(Value::Null);
        match self.style {
            InterfaceStyle::Legacy => EjbObject::legacy(
                client.clone(),
                Arc::clone(&self.meta),
                self.server.clone(),
                context,
                self.primary_key.clone(),
            ),
            InterfaceStyle::Business => EjbObject::business(
                client.clone(),
                Arc::clone(&self.meta),
                self.server.clone(),
                context,
                self.primary_key.clone(),
            ),
        }
    }

    /// Writes the handle.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        self.meta.encode(out)?;
        self.server.encode(out)?;
        codec.write_value(out, &self.primary_key)?;
        out.write_bool(self.style == InterfaceStyle::Business)
    }

    /// Reads a handle.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let meta = Arc::new(EjbMetaData::decode(input)?);
        let server = ServerMetaData::decode(input)?;
        let primary_key = codec.read_value(input)?;
        let style = match input.read_bool()? {
            true => InterfaceStyle::Business,
            false => InterfaceStyle::Legacy,
        };
        Ok(Self::new(meta, server, primary_key, style))
    }
}

/// A portable reference to a home.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeHandle {
    meta: Arc<EjbMetaData>,
    server: ServerMetaData,
}

impl HomeHandle {
    pub(crate) fn new(meta: Arc<EjbMetaData>, server: ServerMetaData) -> Self {
        Self { meta, server }
    }

    /// Returns the bean descriptor.
    pub fn meta(&self) -> &EjbMetaData {
        &self.meta
    }

    /// Returns the server the home lives on.
    pub fn server(&self) -> &ServerMetaData {
        &self.server
    }

    /// Builds a proxy for the referenced home.
    pub fn home(&self, client: &EjbClient) -> Result<EjbHome> {
        EjbHome::new(
            client.clone(),
            Arc::clone(&self.meta),
            self.server.clone(),
            ClientMetaData::new(Value::Null),
        )
    }

    /// Writes the handle.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        self.meta.encode(out)?;
        self.server.encode(out)
    }

    /// Reads a handle.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let meta = EjbMetaData::decode(input)?;
        if meta.home_interface.is_none() {
            return Err(EjbError::Protocol(format!(
                "home handle for {} names no home interface",
                meta.deployment_id
            )));
        }
        Ok(Self::new(Arc::new(meta), ServerMetaData::decode(input)?))
    }
}
