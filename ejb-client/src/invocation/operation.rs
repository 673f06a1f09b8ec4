//! The closed set of operations a proxy sends to the server.

use std::fmt;

use ejb_core::protocol::{Argument, EjbResponse, RequestMethod};
use ejb_core::{EjbError, MethodSignature, Result, Value};

use super::interface::{InterfaceDescriptor, MethodDescriptor};

/// A resolved method call with tagged arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method being invoked; the declaring class is the interface.
    pub signature: MethodSignature,
    /// Arguments tagged by declared parameter type.
    pub arguments: Vec<Argument>,
    /// Client-assigned id, set for asynchronous calls.
    pub request_id: Option<String>,
    /// Identity resolved when the call was submitted, for calls dispatched
    /// from another task.
    pub identity: Option<Value>,
}

impl Call {
    /// Resolves `name` with the arity of `arguments` and tags the arguments.
    pub fn resolve(
        interface: &InterfaceDescriptor,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<(Self, bool)> {
        let method = interface.method(name, arguments.len()).ok_or_else(|| {
            EjbError::Configuration(format!(
                "{} has no method {} taking {} arguments",
                interface.name(),
                name,
                arguments.len()
            ))
        })?;
        let call = Self::new(interface, method, arguments)?;
        Ok((call, method.is_asynchronous()))
    }

    /// Tags `arguments` against a known method.
    pub fn new(
        interface: &InterfaceDescriptor,
        method: &MethodDescriptor,
        arguments: Vec<Value>,
    ) -> Result<Self> {
        let arguments = method
            .parameter_types()
            .iter()
            .zip(arguments)
            .map(|(ty, value)| Argument::from_value(ty, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            signature: interface.signature(method),
            arguments,
            request_id: None,
            identity: None,
        })
    }

    /// Sets the asynchronous request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Pins the caller identity sent with this call.
    pub fn with_identity(mut self, identity: Value) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// A remote operation of a home or object proxy.
///
/// Every variant maps to exactly one invocation sub-kind on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Home `create`.
    Create(Call),
    /// Home finder.
    Find(Call),
    /// Any other home method.
    HomeMethod(Call),
    /// Home `remove` by primary key.
    RemoveByPrimaryKey(Value),
    /// Home `getEJBMetaData`.
    GetMetaData,
    /// Home `getHomeHandle`.
    GetHomeHandle,
    /// Business method on an object.
    Business(Call),
    /// Object `remove`.
    Remove,
    /// Object `getPrimaryKey`.
    GetPrimaryKey,
    /// Object `getHandle`.
    GetHandle,
    /// Object `isIdentical`, carrying the other object's primary key.
    IsIdentical(Value),
    /// Cancellation of a dispatched asynchronous call.
    Cancel {
        /// Id of the call to cancel.
        request_id: String,
        /// Whether a running call may be interrupted.
        may_interrupt: bool,
    },
}

impl Operation {
    /// Returns the wire sub-kind.
    pub fn request_method(&self) -> RequestMethod {
        match self {
            Operation::Create(_) => RequestMethod::HomeCreate,
            Operation::Find(_) => RequestMethod::HomeFind,
            Operation::HomeMethod(_) => RequestMethod::HomeMethod,
            Operation::RemoveByPrimaryKey(_) => RequestMethod::HomeRemoveByPkey,
            Operation::GetMetaData => RequestMethod::HomeGetEjbMetaData,
            Operation::GetHomeHandle => RequestMethod::HomeGetHomeHandle,
            Operation::Business(_) => RequestMethod::ObjectBusinessMethod,
            Operation::Remove => RequestMethod::ObjectRemove,
            Operation::GetPrimaryKey => RequestMethod::ObjectGetPrimaryKey,
            Operation::GetHandle => RequestMethod::ObjectGetHandle,
            Operation::IsIdentical(_) => RequestMethod::ObjectIsIdentical,
            Operation::Cancel { .. } => RequestMethod::FutureCancel,
        }
    }

    /// Returns the call, for operations that invoke a declared method.
    pub fn call(&self) -> Option<&Call> {
        match self {
            Operation::Create(c)
            | Operation::Find(c)
            | Operation::HomeMethod(c)
            | Operation::Business(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.call() {
            Some(call) => write!(f, "{} {}", self.request_method(), call.signature),
            None => write!(f, "{}", self.request_method()),
        }
    }
}

/// Successful outcome of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain return value.
    Value(Value),
    /// Primary key of a created instance.
    Created(Value),
    /// Primary key of a single found instance.
    Found(Value),
    /// Primary keys of found instances, in order.
    FoundMany(Vec<Value>),
    /// A finder matched nothing.
    NotFound,
}

impl Reply {
    /// Extracts the successful part of a response; failures are returned as is.
    pub(crate) fn from_response(response: EjbResponse) -> std::result::Result<Self, EjbResponse> {
        match response {
            EjbResponse::Ok(v) => Ok(Reply::Value(v)),
            EjbResponse::OkCreate(v) => Ok(Reply::Created(v)),
            EjbResponse::OkFound(v) => Ok(Reply::Found(v)),
            EjbResponse::OkFoundCollection(keys) | EjbResponse::OkFoundEnumeration(keys) => {
                Ok(Reply::FoundMany(keys))
            }
            EjbResponse::OkNotFound => Ok(Reply::NotFound),
            failure => Err(failure),
        }
    }

    /// Returns a short name for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Value(_) => "value",
            Reply::Created(_) => "created",
            Reply::Found(_) => "found",
            Reply::FoundMany(_) => "found-many",
            Reply::NotFound => "not-found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejb_core::RemoteThrowable;

    fn iface() -> InterfaceDescriptor {
        InterfaceDescriptor::business("org.acme.Account")
            .with_method(MethodDescriptor::new("deposit", ["int", "java.lang.String"]))
    }

    #[test]
    fn test_resolve_tags_arguments() {
        let (call, asynchronous) =
            Call::resolve(&iface(), "deposit", vec![Value::from(5i64), Value::from("memo")]).unwrap();
        assert!(!asynchronous);
        assert_eq!(
            call.arguments,
            vec![Argument::Int(5), Argument::Object(Value::from("memo"))]
        );
        assert_eq!(call.signature.declaring_class, "org.acme.Account");
    }

    #[test]
    fn test_resolve_rejects_unknown_method_and_bad_argument() {
        assert!(Call::resolve(&iface(), "deposit", vec![Value::from(1i64)]).is_err());
        assert!(matches!(
            Call::resolve(&iface(), "deposit", vec![Value::from("x"), Value::Null]),
            Err(EjbError::Serialization(_))
        ));
    }

    #[test]
    fn test_every_operation_has_its_own_sub_kind() {
        let call = Call::resolve(&iface(), "deposit", vec![Value::from(1i64), Value::Null])
            .unwrap()
            .0;
        let ops = vec![
            Operation::Create(call.clone()),
            Operation::Find(call.clone()),
            Operation::HomeMethod(call.clone()),
            Operation::RemoveByPrimaryKey(Value::Null),
            Operation::GetMetaData,
            Operation::GetHomeHandle,
            Operation::Business(call),
            Operation::Remove,
            Operation::GetPrimaryKey,
            Operation::GetHandle,
            Operation::IsIdentical(Value::Null),
            Operation::Cancel {
                request_id: "r".into(),
                may_interrupt: true,
            },
        ];
        let mut codes: Vec<u8> = ops.iter().map(|op| op.request_method().code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ops.len());
    }

    #[test]
    fn test_reply_from_response() {
        assert_eq!(
            Reply::from_response(EjbResponse::OkFoundEnumeration(vec![Value::from(1i64)])),
            Ok(Reply::FoundMany(vec![Value::from(1i64)]))
        );
        assert_eq!(Reply::from_response(EjbResponse::OkNotFound), Ok(Reply::NotFound));
        let failure = EjbResponse::SystemException(RemoteThrowable::new("java.lang.Error", None));
        assert_eq!(Reply::from_response(failure.clone()), Err(failure));
    }
}
