//! Request variants and their field layouts.

use std::fmt;

use crate::error::{EjbError, Result};
use crate::metadata::MethodSignature;
use crate::serialization::{DataInput, DataOutput, ObjectCodec, Value};

use super::constants::*;

/// Discriminant selecting the kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// Remote invocation.
    Ejb,
    /// Naming operation.
    Jndi,
    /// Authentication handshake.
    Authentication,
    /// Explicit cluster metadata fetch.
    Cluster,
    /// Logout of an identity.
    Logout,
    /// Server stop signal.
    Stop,
}

impl RequestType {
    /// Returns the wire code.
    pub fn code(&self) -> u8 {
        match self {
            RequestType::Ejb => REQUEST_EJB,
            RequestType::Jndi => REQUEST_JNDI,
            RequestType::Authentication => REQUEST_AUTH,
            RequestType::Cluster => REQUEST_CLUSTER,
            RequestType::Logout => REQUEST_LOGOUT,
            RequestType::Stop => REQUEST_STOP,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            REQUEST_EJB => Ok(RequestType::Ejb),
            REQUEST_JNDI => Ok(RequestType::Jndi),
            REQUEST_AUTH => Ok(RequestType::Authentication),
            REQUEST_CLUSTER => Ok(RequestType::Cluster),
            REQUEST_LOGOUT => Ok(RequestType::Logout),
            REQUEST_STOP => Ok(RequestType::Stop),
            other => Err(EjbError::Protocol(format!("unknown request type: {}", other))),
        }
    }
}

/// Remote invocation sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// Fetch the bean descriptor.
    HomeGetEjbMetaData,
    /// Fetch a home handle.
    HomeGetHomeHandle,
    /// Remove an instance through its handle.
    HomeRemoveByHandle,
    /// Remove an instance through its primary key.
    HomeRemoveByPkey,
    /// Finder.
    HomeFind,
    /// Create.
    HomeCreate,
    /// Other home method.
    HomeMethod,
    /// Fetch the home of an object.
    ObjectGetEjbHome,
    /// Fetch an object handle.
    ObjectGetHandle,
    /// Fetch the primary key.
    ObjectGetPrimaryKey,
    /// Identity comparison.
    ObjectIsIdentical,
    /// Remove the object.
    ObjectRemove,
    /// Business method.
    ObjectBusinessMethod,
    /// Cancel an asynchronous invocation.
    FutureCancel,
}

impl RequestMethod {
    /// Returns the wire code.
    pub fn code(&self) -> u8 {
        match self {
            RequestMethod::HomeGetEjbMetaData => HOME_GET_EJB_META_DATA,
            RequestMethod::HomeGetHomeHandle => HOME_GET_HOME_HANDLE,
            RequestMethod::HomeRemoveByHandle => HOME_REMOVE_BY_HANDLE,
            RequestMethod::HomeRemoveByPkey => HOME_REMOVE_BY_PKEY,
            RequestMethod::HomeFind => HOME_FIND,
            RequestMethod::HomeCreate => HOME_CREATE,
            RequestMethod::HomeMethod => HOME_METHOD,
            RequestMethod::ObjectGetEjbHome => OBJECT_GET_EJB_HOME,
            RequestMethod::ObjectGetHandle => OBJECT_GET_HANDLE,
            RequestMethod::ObjectGetPrimaryKey => OBJECT_GET_PRIMARY_KEY,
            RequestMethod::ObjectIsIdentical => OBJECT_IS_IDENTICAL,
            RequestMethod::ObjectRemove => OBJECT_REMOVE,
            RequestMethod::ObjectBusinessMethod => OBJECT_BUSINESS_METHOD,
            RequestMethod::FutureCancel => FUTURE_CANCEL,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Result<Self> {
        let method = match code {
            HOME_GET_EJB_META_DATA => RequestMethod::HomeGetEjbMetaData,
            HOME_GET_HOME_HANDLE => RequestMethod::HomeGetHomeHandle,
            HOME_REMOVE_BY_HANDLE => RequestMethod::HomeRemoveByHandle,
            HOME_REMOVE_BY_PKEY => RequestMethod::HomeRemoveByPkey,
            HOME_FIND => RequestMethod::HomeFind,
            HOME_CREATE => RequestMethod::HomeCreate,
            HOME_METHOD => RequestMethod::HomeMethod,
            OBJECT_GET_EJB_HOME => RequestMethod::ObjectGetEjbHome,
            OBJECT_GET_HANDLE => RequestMethod::ObjectGetHandle,
            OBJECT_GET_PRIMARY_KEY => RequestMethod::ObjectGetPrimaryKey,
            OBJECT_IS_IDENTICAL => RequestMethod::ObjectIsIdentical,
            OBJECT_REMOVE => RequestMethod::ObjectRemove,
            OBJECT_BUSINESS_METHOD => RequestMethod::ObjectBusinessMethod,
            FUTURE_CANCEL => RequestMethod::FutureCancel,
            other => {
                return Err(EjbError::Protocol(format!(
                    "unknown invocation request method: {}",
                    other
                )))
            }
        };
        Ok(method)
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A method argument tagged with its declared type.
///
/// Primitives use their natural fixed-width encoding; anything else goes
/// through the object codec. The receiving side never has to re-derive
/// parameter types.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// `int`
    Int(i32),
    /// `byte`
    Byte(i8),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `short`
    Short(i16),
    /// `char`
    Char(u16),
    /// `boolean`
    Boolean(bool),
    /// Any non-primitive.
    Object(Value),
}

impl Argument {
    /// Returns the one-byte type tag.
    pub fn tag(&self) -> u8 {
        match self {
            Argument::Int(_) => b'I',
            Argument::Byte(_) => b'B',
            Argument::Long(_) => b'J',
            Argument::Float(_) => b'F',
            Argument::Double(_) => b'D',
            Argument::Short(_) => b'S',
            Argument::Char(_) => b'C',
            Argument::Boolean(_) => b'Z',
            Argument::Object(_) => b'L',
        }
    }

    /// Tags `value` according to the declared parameter type.
    ///
    /// Integral values are narrowed only if they fit.
    pub fn from_value(parameter_type: &str, value: Value) -> Result<Self> {
        let mismatch = |value: &Value| {
            EjbError::Serialization(format!(
                "argument of type {} cannot carry value {}",
                parameter_type, value
            ))
        };
        let arg = match parameter_type {
            "int" => Argument::Int(
                value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| mismatch(&value))?,
            ),
            "byte" => Argument::Byte(
                value
                    .as_i64()
                    .and_then(|v| i8::try_from(v).ok())
                    .ok_or_else(|| mismatch(&value))?,
            ),
            "short" => Argument::Short(
                value
                    .as_i64()
                    .and_then(|v| i16::try_from(v).ok())
                    .ok_or_else(|| mismatch(&value))?,
            ),
            "long" => Argument::Long(value.as_i64().ok_or_else(|| mismatch(&value))?),
            "float" => match value {
                Value::Float(v) => Argument::Float(v),
                Value::Double(v) => Argument::Float(v as f32),
                other => return Err(mismatch(&other)),
            },
            "double" => match value {
                Value::Double(v) => Argument::Double(v),
                Value::Float(v) => Argument::Double(v as f64),
                other => return Err(mismatch(&other)),
            },
            "char" => match value {
                Value::Char(c) => Argument::Char(c),
                other => return Err(mismatch(&other)),
            },
            "boolean" => Argument::Boolean(value.as_bool().ok_or_else(|| mismatch(&value))?),
            _ => Argument::Object(value),
        };
        Ok(arg)
    }

    /// Converts back into a dynamically typed value.
    pub fn into_value(self) -> Value {
        match self {
            Argument::Int(v) => Value::Int(v),
            Argument::Byte(v) => Value::Byte(v),
            Argument::Long(v) => Value::Long(v),
            Argument::Float(v) => Value::Float(v),
            Argument::Double(v) => Value::Double(v),
            Argument::Short(v) => Value::Short(v),
            Argument::Char(v) => Value::Char(v),
            Argument::Boolean(v) => Value::Bool(v),
            Argument::Object(v) => v,
        }
    }

    fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.tag())?;
        match self {
            Argument::Int(v) => out.write_int(*v),
            Argument::Byte(v) => out.write_byte(*v),
            Argument::Long(v) => out.write_long(*v),
            Argument::Float(v) => out.write_float(*v),
            Argument::Double(v) => out.write_double(*v),
            Argument::Short(v) => out.write_short(*v),
            Argument::Char(v) => out.write_char(*v),
            Argument::Boolean(v) => out.write_bool(*v),
            Argument::Object(v) => codec.write_value(out, v),
        }
    }

    fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let tag = input.read_u8()?;
        let arg = match tag {
            b'I' => Argument::Int(input.read_int()?),
            b'B' => Argument::Byte(input.read_byte()?),
            b'J' => Argument::Long(input.read_long()?),
            b'F' => Argument::Float(input.read_float()?),
            b'D' => Argument::Double(input.read_double()?),
            b'S' => Argument::Short(input.read_short()?),
            b'C' => Argument::Char(input.read_char()?),
            b'Z' => Argument::Boolean(input.read_bool()?),
            b'L' => Argument::Object(codec.read_value(input)?),
            other => {
                return Err(EjbError::Protocol(format!(
                    "unknown argument type tag: 0x{:02x}",
                    other
                )))
            }
        };
        Ok(arg)
    }
}

/// A remote invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct EjbRequest {
    /// Invocation sub-kind.
    pub method: RequestMethod,
    /// Deployment id; may be absent once a deployment code is known.
    pub deployment_id: Option<String>,
    /// Numeric deployment code, zero if unassigned.
    pub deployment_code: i16,
    /// Identity token of the caller.
    pub client_identity: Value,
    /// Primary key of the target instance.
    pub primary_key: Value,
    /// Interface the caller invoked through.
    pub interface_class: Option<String>,
    /// Method being invoked.
    pub signature: Option<MethodSignature>,
    /// Tagged arguments.
    pub arguments: Vec<Argument>,
    /// Client-assigned id of an asynchronous invocation.
    pub request_id: Option<String>,
}

impl EjbRequest {
    /// Creates a request for the given deployment with no arguments.
    pub fn new(method: RequestMethod, deployment_id: impl Into<String>) -> Self {
        Self {
            method,
            deployment_id: Some(deployment_id.into()),
            deployment_code: 0,
            client_identity: Value::Null,
            primary_key: Value::Null,
            interface_class: None,
            signature: None,
            arguments: Vec::new(),
            request_id: None,
        }
    }

    /// Writes the request body.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.method.code())?;
        out.write_nullable_utf(self.deployment_id.as_deref())?;
        out.write_short(self.deployment_code)?;
        codec.write_value(out, &self.client_identity)?;
        codec.write_value(out, &self.primary_key)?;
        out.write_nullable_utf(self.interface_class.as_deref())?;
        match &self.signature {
            Some(signature) => {
                out.write_bool(true)?;
                signature.encode(out)?;
            }
            None => out.write_bool(false)?,
        }
        out.write_int(self.arguments.len() as i32)?;
        for argument in &self.arguments {
            argument.encode(codec, out)?;
        }
        out.write_nullable_utf(self.request_id.as_deref())
    }

    /// Reads a request body.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let method = RequestMethod::from_code(input.read_u8()?)?;
        let deployment_id = input.read_nullable_utf()?;
        let deployment_code = input.read_short()?;
        if deployment_id.is_none() && deployment_code <= 0 {
            return Err(EjbError::Protocol(
                "invocation request names neither a deployment id nor a deployment code".to_string(),
            ));
        }
        let client_identity = codec.read_value(input)?;
        let primary_key = codec.read_value(input)?;
        let interface_class = input.read_nullable_utf()?;
        let signature = if input.read_bool()? {
            Some(MethodSignature::decode(input)?)
        } else {
            None
        };
        let count = input.read_length(2)?;
        let mut arguments = Vec::with_capacity(count);
        for _ in 0..count {
            arguments.push(Argument::decode(codec, input)?);
        }
        let request_id = input.read_nullable_utf()?;
        Ok(Self {
            method,
            deployment_id,
            deployment_code,
            client_identity,
            primary_key,
            interface_class,
            signature,
            arguments,
            request_id,
        })
    }
}

/// Naming sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JndiMethod {
    /// Resolve one name.
    Lookup,
    /// List names and classes.
    List,
    /// List names, classes and bound values.
    ListBindings,
}

impl JndiMethod {
    /// Returns the wire code.
    pub fn code(&self) -> u8 {
        match self {
            JndiMethod::Lookup => JNDI_LOOKUP,
            JndiMethod::List => JNDI_LIST,
            JndiMethod::ListBindings => JNDI_LIST_BINDINGS,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            JNDI_LOOKUP => Ok(JndiMethod::Lookup),
            JNDI_LIST => Ok(JndiMethod::List),
            JNDI_LIST_BINDINGS => Ok(JndiMethod::ListBindings),
            other => Err(EjbError::Protocol(format!("unknown naming request method: {}", other))),
        }
    }
}

/// A naming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JndiRequest {
    /// Naming sub-kind.
    pub method: JndiMethod,
    /// Hierarchical name, relative to the global root.
    pub name: String,
}

impl JndiRequest {
    /// Creates a naming request.
    pub fn new(method: JndiMethod, name: impl Into<String>) -> Self {
        Self {
            method,
            name: name.into(),
        }
    }

    /// Writes the request body.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_u8(self.method.code())?;
        out.write_utf(&self.name)
    }

    /// Reads a request body.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let method = JndiMethod::from_code(input.read_u8()?)?;
        let name = input.read_utf()?;
        Ok(Self { method, name })
    }
}

/// An authentication request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthenticationRequest {
    /// Security realm, if the server hosts several.
    pub realm: Option<String>,
    /// Principal, usually a user name.
    pub principal: Value,
    /// Credentials, usually a password.
    pub credentials: Value,
}

impl AuthenticationRequest {
    /// Creates a request for a principal and credentials.
    pub fn new(principal: impl Into<Value>, credentials: impl Into<Value>) -> Self {
        Self {
            realm: None,
            principal: principal.into(),
            credentials: credentials.into(),
        }
    }

    /// Sets the realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Writes the request body.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_nullable_utf(self.realm.as_deref())?;
        codec.write_value(out, &self.principal)?;
        codec.write_value(out, &self.credentials)
    }

    /// Reads a request body.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        Ok(Self {
            realm: input.read_nullable_utf()?,
            principal: codec.read_value(input)?,
            credentials: codec.read_value(input)?,
        })
    }
}

/// A logout request for one identity token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogoutRequest {
    /// Token to release.
    pub identity: Value,
}

/// An explicit request for the server's cluster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterRequest {
    /// Version of the client's cached view.
    pub version: i64,
}

/// Any request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Remote invocation.
    Ejb(EjbRequest),
    /// Naming.
    Jndi(JndiRequest),
    /// Authentication.
    Authentication(AuthenticationRequest),
    /// Cluster fetch.
    Cluster(ClusterRequest),
    /// Logout.
    Logout(LogoutRequest),
    /// Stop.
    Stop,
}

impl Request {
    /// Returns the request discriminant.
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Ejb(_) => RequestType::Ejb,
            Request::Jndi(_) => RequestType::Jndi,
            Request::Authentication(_) => RequestType::Authentication,
            Request::Cluster(_) => RequestType::Cluster,
            Request::Logout(_) => RequestType::Logout,
            Request::Stop => RequestType::Stop,
        }
    }

    /// Writes the discriminant byte followed by the body.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        out.write_u8(self.request_type().code())?;
        match self {
            Request::Ejb(r) => r.encode(codec, out),
            Request::Jndi(r) => r.encode(out),
            Request::Authentication(r) => r.encode(codec, out),
            Request::Cluster(r) => out.write_long(r.version),
            Request::Logout(r) => codec.write_value(out, &r.identity),
            Request::Stop => Ok(()),
        }
    }

    /// Reads the discriminant byte and the body it selects.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        let request = match RequestType::from_code(input.read_u8()?)? {
            RequestType::Ejb => Request::Ejb(EjbRequest::decode(codec, input)?),
            RequestType::Jndi => Request::Jndi(JndiRequest::decode(input)?),
            RequestType::Authentication => {
                Request::Authentication(AuthenticationRequest::decode(codec, input)?)
            }
            RequestType::Cluster => Request::Cluster(ClusterRequest {
                version: input.read_long()?,
            }),
            RequestType::Logout => Request::Logout(LogoutRequest {
                identity: codec.read_value(input)?,
            }),
            RequestType::Stop => Request::Stop,
        };
        Ok(request)
    }
}

impl From<EjbRequest> for Request {
    fn from(r: EjbRequest) -> Self {
        Request::Ejb(r)
    }
}

impl From<JndiRequest> for Request {
    fn from(r: JndiRequest) -> Self {
        Request::Jndi(r)
    }
}

impl From<AuthenticationRequest> for Request {
    fn from(r: AuthenticationRequest) -> Self {
        Request::Authentication(r)
    }
}

impl From<LogoutRequest> for Request {
    fn from(r: LogoutRequest) -> Self {
        Request::Logout(r)
    }
}

impl From<ClusterRequest> for Request {
    fn from(r: ClusterRequest) -> Self {
        Request::Cluster(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{BufferInput, BufferOutput};

    fn round_trip(request: &Request) -> Request {
        let codec = ObjectCodec::new();
        let mut out = BufferOutput::new();
        request.encode(&codec, &mut out).unwrap();
        let bytes = out.into_bytes();
        let mut input = BufferInput::new(&bytes);
        let decoded = Request::decode(&codec, &mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        decoded
    }

    #[test]
    fn test_business_method_with_mixed_arguments() {
        let mut req = EjbRequest::new(RequestMethod::ObjectBusinessMethod, "AccountBean");
        req.deployment_code = 3;
        req.client_identity = Value::from("token-1");
        req.primary_key = Value::Long(42);
        req.interface_class = Some("com.acme.Account".into());
        req.signature = Some(MethodSignature::new(
            "com.acme.Account",
            "transfer",
            ["int", "char", "boolean", "double", "com.acme.Memo"],
        ));
        req.arguments = vec![
            Argument::Int(-7),
            Argument::Char(0x263A),
            Argument::Boolean(true),
            Argument::Double(1.5),
            Argument::Object(Value::object("com.acme.Memo", [("text", Value::from("rent"))])),
        ];
        req.request_id = Some("9b1d".into());

        let request = Request::Ejb(req);
        assert_eq!(round_trip(&request), request);
    }

    #[test]
    fn test_naming_and_auth_requests() {
        let lookup = Request::Jndi(JndiRequest::new(JndiMethod::ListBindings, "ejb/app"));
        assert_eq!(round_trip(&lookup), lookup);

        let auth = Request::Authentication(AuthenticationRequest::new("alice", "secret").with_realm("PropertiesLogin"));
        assert_eq!(round_trip(&auth), auth);

        let logout = Request::Logout(LogoutRequest { identity: Value::Long(77) });
        assert_eq!(round_trip(&logout), logout);

        assert_eq!(round_trip(&Request::Stop), Request::Stop);
    }

    #[test]
    fn test_unknown_argument_tag_is_protocol_error() {
        let codec = ObjectCodec::new();
        let data = [b'Q', 0, 0];
        let err = Argument::decode(&codec, &mut BufferInput::new(&data)).unwrap_err();
        assert!(matches!(err, EjbError::Protocol(_)));
    }

    #[test]
    fn test_unknown_request_type() {
        let codec = ObjectCodec::new();
        let data = [99u8];
        let err = Request::decode(&codec, &mut BufferInput::new(&data)).unwrap_err();
        assert!(matches!(err, EjbError::Protocol(_)));
    }

    #[test]
    fn test_argument_from_value_narrowing() {
        assert_eq!(Argument::from_value("int", Value::Long(5)).unwrap(), Argument::Int(5));
        assert!(Argument::from_value("byte", Value::Int(300)).is_err());
        assert!(Argument::from_value("boolean", Value::Int(1)).is_err());
        assert_eq!(
            Argument::from_value("java.lang.String", Value::from("x")).unwrap(),
            Argument::Object(Value::from("x"))
        );
        assert_eq!(Argument::Short(4).into_value(), Value::Short(4));
    }

    #[test]
    fn test_decode_requires_deployment_identity() {
        let mut req = EjbRequest::new(RequestMethod::HomeCreate, "x");
        req.deployment_id = None;
        let codec = ObjectCodec::new();
        let mut out = BufferOutput::new();
        Request::Ejb(req).encode(&codec, &mut out).unwrap();
        let bytes = out.into_bytes();
        let err = Request::decode(&codec, &mut BufferInput::new(&bytes)).unwrap_err();
        assert!(matches!(err, EjbError::Protocol(_)));
    }

    #[test]
    fn test_method_codes_are_distinct() {
        let all = [
            RequestMethod::HomeGetEjbMetaData,
            RequestMethod::HomeGetHomeHandle,
            RequestMethod::HomeRemoveByHandle,
            RequestMethod::HomeRemoveByPkey,
            RequestMethod::HomeFind,
            RequestMethod::HomeCreate,
            RequestMethod::HomeMethod,
            RequestMethod::ObjectGetEjbHome,
            RequestMethod::ObjectGetHandle,
            RequestMethod::ObjectGetPrimaryKey,
            RequestMethod::ObjectIsIdentical,
            RequestMethod::ObjectRemove,
            RequestMethod::ObjectBusinessMethod,
            RequestMethod::FutureCancel,
        ];
        for m in all {
            assert_eq!(RequestMethod::from_code(m.code()).unwrap(), m);
        }
    }
}
