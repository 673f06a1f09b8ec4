//! Response variants. The response code alone decides which fields follow.

use crate::error::{EjbError, Result};
use crate::metadata::{ClientMetaData, ClusterMetaData, EjbMetaData, ServerMetaData};
use crate::serialization::{DataInput, DataOutput, ObjectCodec, RemoteThrowable, Value};

use super::constants::*;
use super::request::RequestType;

fn write_values<W: DataOutput>(codec: &ObjectCodec, out: &mut W, values: &[Value]) -> Result<()> {
    out.write_int(values.len() as i32)?;
    for v in values {
        codec.write_value(out, v)?;
    }
    Ok(())
}

fn read_values<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Vec<Value>> {
    let count = input.read_length(1)?;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(codec.read_value(input)?);
    }
    Ok(values)
}

/// Outcome of a remote invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EjbResponse {
    /// Plain return value.
    Ok(Value),
    /// Create succeeded; carries the new instance's primary key.
    OkCreate(Value),
    /// Single finder succeeded; carries the primary key.
    OkFound(Value),
    /// Bulk finder succeeded; carries primary keys in order.
    OkFoundCollection(Vec<Value>),
    /// Bulk finder succeeded; carries primary keys in order.
    OkFoundEnumeration(Vec<Value>),
    /// Single finder matched nothing.
    OkNotFound,
    /// Business logic rejected the call.
    ApplicationException(RemoteThrowable),
    /// Infrastructure fault tied to the instance.
    SystemException(RemoteThrowable),
    /// Fatal server error.
    Error(RemoteThrowable),
}

impl EjbResponse {
    /// Returns the response code.
    pub fn code(&self) -> u8 {
        match self {
            EjbResponse::Ok(_) => EJB_OK,
            EjbResponse::OkCreate(_) => EJB_OK_CREATE,
            EjbResponse::OkFound(_) => EJB_OK_FOUND,
            EjbResponse::OkFoundCollection(_) => EJB_OK_FOUND_COLLECTION,
            EjbResponse::OkFoundEnumeration(_) => EJB_OK_FOUND_ENUMERATION,
            EjbResponse::OkNotFound => EJB_OK_NOT_FOUND,
            EjbResponse::ApplicationException(_) => EJB_APP_EXCEPTION,
            EjbResponse::SystemException(_) => EJB_SYS_EXCEPTION,
            EjbResponse::Error(_) => EJB_ERROR,
        }
    }

    /// Writes the code and its payload.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.code())?;
        match self {
            EjbResponse::Ok(v) | EjbResponse::OkCreate(v) | EjbResponse::OkFound(v) => {
                codec.write_value(out, v)
            }
            EjbResponse::OkFoundCollection(keys) | EjbResponse::OkFoundEnumeration(keys) => {
                write_values(codec, out, keys)
            }
            EjbResponse::OkNotFound => Ok(()),
            EjbResponse::ApplicationException(t)
            | EjbResponse::SystemException(t)
            | EjbResponse::Error(t) => codec.write_throwable(out, t),
        }
    }

    /// Reads a code and its payload.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let response = match input.read_u8()? {
            EJB_OK => EjbResponse::Ok(codec.read_value(input)?),
            EJB_OK_CREATE => EjbResponse::OkCreate(codec.read_value(input)?),
            EJB_OK_FOUND => EjbResponse::OkFound(codec.read_value(input)?),
            EJB_OK_FOUND_COLLECTION => EjbResponse::OkFoundCollection(read_values(codec, input)?),
            EJB_OK_FOUND_ENUMERATION => EjbResponse::OkFoundEnumeration(read_values(codec, input)?),
            EJB_OK_NOT_FOUND => EjbResponse::OkNotFound,
            EJB_APP_EXCEPTION => EjbResponse::ApplicationException(codec.read_throwable(input)?),
            EJB_SYS_EXCEPTION => EjbResponse::SystemException(codec.read_throwable(input)?),
            EJB_ERROR => EjbResponse::Error(codec.read_throwable(input)?),
            other => {
                return Err(EjbError::Protocol(format!(
                    "unknown invocation response code: {}",
                    other
                )))
            }
        };
        Ok(response)
    }
}

/// One entry of a naming enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct NameClassPair {
    /// Name relative to the listed context.
    pub name: String,
    /// Class of the bound object.
    pub class_name: String,
    /// Bound object, present for binding listings.
    pub object: Option<Value>,
}

impl NameClassPair {
    /// Creates a pair without a bound object.
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            object: None,
        }
    }

    /// Attaches the bound object.
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }
}

/// Outcome of a naming request.
#[derive(Debug, Clone, PartialEq)]
pub enum JndiResponse {
    /// Plain bound value.
    Ok(Value),
    /// Home descriptor.
    EjbHome(EjbMetaData),
    /// Business-interface descriptor with the instance's primary key.
    BusinessObject(EjbMetaData, Value),
    /// The name is a sub-context.
    Context,
    /// Listing.
    Enumeration(Vec<NameClassPair>),
    /// Name not bound.
    NotFound,
    /// Remote naming exception.
    NamingException(RemoteThrowable),
    /// Remote runtime exception.
    RuntimeException(RemoteThrowable),
    /// Remote error.
    Error(RemoteThrowable),
}

impl JndiResponse {
    /// Returns the response code.
    pub fn code(&self) -> u8 {
        match self {
            JndiResponse::Ok(_) => JNDI_OK,
            JndiResponse::EjbHome(_) => JNDI_EJBHOME,
            JndiResponse::BusinessObject(..) => JNDI_BUSINESS_OBJECT,
            JndiResponse::Context => JNDI_CONTEXT,
            JndiResponse::Enumeration(_) => JNDI_ENUMERATION,
            JndiResponse::NotFound => JNDI_NOT_FOUND,
            JndiResponse::NamingException(_) => JNDI_NAMING_EXCEPTION,
            JndiResponse::RuntimeException(_) => JNDI_RUNTIME_EXCEPTION,
            JndiResponse::Error(_) => JNDI_ERROR,
        }
    }

    /// Writes the code and its payload.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.code())?;
        match self {
            JndiResponse::Ok(v) => codec.write_value(out, v),
            JndiResponse::EjbHome(meta) => meta.encode(out),
            JndiResponse::BusinessObject(meta, key) => {
                meta.encode(out)?;
                codec.write_value(out, key)
            }
            JndiResponse::Context | JndiResponse::NotFound => Ok(()),
            JndiResponse::Enumeration(pairs) => {
                out.write_int(pairs.len() as i32)?;
                for pair in pairs {
                    out.write_utf(&pair.name)?;
                    out.write_utf(&pair.class_name)?;
                    match &pair.object {
                        Some(object) => {
                            out.write_bool(true)?;
                            codec.write_value(out, object)?;
                        }
                        None => out.write_bool(false)?,
                    }
                }
                Ok(())
            }
            JndiResponse::NamingException(t)
            | JndiResponse::RuntimeException(t)
            | JndiResponse::Error(t) => codec.write_throwable(out, t),
        }
    }

    /// Reads a code and its payload.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let response = match input.read_u8()? {
            JNDI_OK => JndiResponse::Ok(codec.read_value(input)?),
            JNDI_EJBHOME => JndiResponse::EjbHome(EjbMetaData::decode(input)?),
            JNDI_BUSINESS_OBJECT => {
                let meta = EjbMetaData::decode(input)?;
                JndiResponse::BusinessObject(meta, codec.read_value(input)?)
            }
            JNDI_CONTEXT => JndiResponse::Context,
            JNDI_ENUMERATION => {
                let count = input.read_length(5)?;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = input.read_utf()?;
                    let class_name = input.read_utf()?;
                    let object = if input.read_bool()? {
                        Some(codec.read_value(input)?)
                    } else {
                        None
                    };
                    pairs.push(NameClassPair {
                        name,
                        class_name,
                        object,
                    });
                }
                JndiResponse::Enumeration(pairs)
            }
            JNDI_NOT_FOUND => JndiResponse::NotFound,
            JNDI_NAMING_EXCEPTION => JndiResponse::NamingException(codec.read_throwable(input)?),
            JNDI_RUNTIME_EXCEPTION => JndiResponse::RuntimeException(codec.read_throwable(input)?),
            JNDI_ERROR => JndiResponse::Error(codec.read_throwable(input)?),
            other => {
                return Err(EjbError::Protocol(format!(
                    "unknown naming response code: {}",
                    other
                )))
            }
        };
        Ok(response)
    }
}

/// Outcome of an authentication handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationResponse {
    /// Identity established on this server.
    Granted(ClientMetaData),
    /// Identity established; all further traffic goes to the named server.
    Redirected(ClientMetaData, ServerMetaData),
    /// Login refused, optionally with a reason.
    Denied(Option<String>),
}

impl AuthenticationResponse {
    /// Returns the response code.
    pub fn code(&self) -> u8 {
        match self {
            AuthenticationResponse::Granted(_) => AUTH_GRANTED,
            AuthenticationResponse::Redirected(..) => AUTH_REDIRECT,
            AuthenticationResponse::Denied(_) => AUTH_DENIED,
        }
    }

    /// Writes the code and its payload.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.code())?;
        match self {
            AuthenticationResponse::Granted(identity) => identity.encode(codec, out),
            AuthenticationResponse::Redirected(identity, server) => {
                identity.encode(codec, out)?;
                server.encode(out)
            }
            AuthenticationResponse::Denied(reason) => out.write_nullable_utf(reason.as_deref()),
        }
    }

    /// Reads a code and its payload.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let response = match input.read_u8()? {
            AUTH_GRANTED => AuthenticationResponse::Granted(ClientMetaData::decode(codec, input)?),
            AUTH_REDIRECT => {
                let identity = ClientMetaData::decode(codec, input)?;
                AuthenticationResponse::Redirected(identity, ServerMetaData::decode(input)?)
            }
            AUTH_DENIED => AuthenticationResponse::Denied(input.read_nullable_utf()?),
            other => {
                return Err(EjbError::Protocol(format!(
                    "unknown authentication response code: {}",
                    other
                )))
            }
        };
        Ok(response)
    }
}

/// Outcome of a logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutResponse {
    /// The identity was released.
    Success,
    /// The server refused, optionally with a reason.
    Failed(Option<String>),
}

impl LogoutResponse {
    /// Writes the code and its payload.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        match self {
            LogoutResponse::Success => out.write_u8(LOGOUT_SUCCESS),
            LogoutResponse::Failed(reason) => {
                out.write_u8(LOGOUT_FAILED)?;
                out.write_nullable_utf(reason.as_deref())
            }
        }
    }

    /// Reads a code and its payload.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        match input.read_u8()? {
            LOGOUT_SUCCESS => Ok(LogoutResponse::Success),
            LOGOUT_FAILED => Ok(LogoutResponse::Failed(input.read_nullable_utf()?)),
            other => Err(EjbError::Protocol(format!("unknown logout response code: {}", other))),
        }
    }
}

/// Cluster view exchange result.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterResponse {
    /// The client's view is current.
    Current,
    /// A newer view.
    Updated(ClusterMetaData),
    /// The server could not produce a view.
    Failure(String),
}

impl ClusterResponse {
    /// Writes the code and its payload.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        match self {
            ClusterResponse::Current => out.write_u8(CLUSTER_CURRENT),
            ClusterResponse::Updated(cluster) => {
                out.write_u8(CLUSTER_UPDATE)?;
                cluster.encode(out)
            }
            ClusterResponse::Failure(reason) => {
                out.write_u8(CLUSTER_FAILURE)?;
                out.write_utf(reason)
            }
        }
    }

    /// Reads a code and its payload.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        match input.read_u8()? {
            CLUSTER_CURRENT => Ok(ClusterResponse::Current),
            CLUSTER_UPDATE => Ok(ClusterResponse::Updated(ClusterMetaData::decode(input)?)),
            CLUSTER_FAILURE => Ok(ClusterResponse::Failure(input.read_utf()?)),
            other => Err(EjbError::Protocol(format!("unknown cluster response code: {}", other))),
        }
    }
}

/// Any response. The kind mirrors the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Answers a remote invocation.
    Ejb(EjbResponse),
    /// Answers a naming request.
    Jndi(JndiResponse),
    /// Answers an authentication request.
    Authentication(AuthenticationResponse),
    /// Answers a logout request.
    Logout(LogoutResponse),
    /// Answers an explicit cluster request.
    Cluster(ClusterResponse),
}

impl Response {
    /// Returns the kind of request this answers.
    pub fn request_type(&self) -> RequestType {
        match self {
            Response::Ejb(_) => RequestType::Ejb,
            Response::Jndi(_) => RequestType::Jndi,
            Response::Authentication(_) => RequestType::Authentication,
            Response::Logout(_) => RequestType::Logout,
            Response::Cluster(_) => RequestType::Cluster,
        }
    }

    /// Writes the kind byte and the response.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.request_type().code())?;
        match self {
            Response::Ejb(r) => r.encode(codec, out),
            Response::Jndi(r) => r.encode(codec, out),
            Response::Authentication(r) => r.encode(codec, out),
            Response::Logout(r) => r.encode(out),
            Response::Cluster(r) => r.encode(out),
        }
    }

    /// Reads the kind byte and the response it selects.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let response = match RequestType::from_code(input.read_u8()?)? {
            RequestType::Ejb => Response::Ejb(EjbResponse::decode(codec, input)?),
            RequestType::Jndi => Response::Jndi(JndiResponse::decode(codec, input)?),
            RequestType::Authentication => {
                Response::Authentication(AuthenticationResponse::decode(codec, input)?)
            }
            RequestType::Logout => Response::Logout(LogoutResponse::decode(input)?),
            RequestType::Cluster => Response::Cluster(ClusterResponse::decode(input)?),
            RequestType::Stop => {
                return Err(EjbError::Protocol("stop requests have no response".to_string()))
            }
        };
        Ok(response)
    }
}
