//! Dynamically typed values carried as method arguments, return values,
//! primary keys and identity tokens.

use std::fmt;

/// Wire tag for [`Value::Null`].
pub const TAG_NULL: u8 = 0;
/// Wire tag for [`Value::Bool`].
pub const TAG_BOOL: u8 = 1;
/// Wire tag for [`Value::Byte`].
pub const TAG_BYTE: u8 = 2;
/// Wire tag for [`Value::Short`].
pub const TAG_SHORT: u8 = 3;
/// Wire tag for [`Value::Char`].
pub const TAG_CHAR: u8 = 4;
/// Wire tag for [`Value::Int`].
pub const TAG_INT: u8 = 5;
/// Wire tag for [`Value::Long`].
pub const TAG_LONG: u8 = 6;
/// Wire tag for [`Value::Float`].
pub const TAG_FLOAT: u8 = 7;
/// Wire tag for [`Value::Double`].
pub const TAG_DOUBLE: u8 = 8;
/// Wire tag for [`Value::String`].
pub const TAG_STRING: u8 = 9;
/// Wire tag for [`Value::Bytes`].
pub const TAG_BYTES: u8 = 10;
/// Wire tag for [`Value::List`].
pub const TAG_LIST: u8 = 11;
/// Wire tag for [`Value::Map`].
pub const TAG_MAP: u8 = 12;
/// Wire tag for [`Value::Object`].
pub const TAG_OBJECT: u8 = 13;

/// An opaque object graph as seen by the client.
///
/// The server's object model is not known locally; values are decoded into
/// this tree and only named classes (`Object`) go through the class filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    Byte(i8),
    /// Signed 16-bit integer.
    Short(i16),
    /// UTF-16 code unit.
    Char(u16),
    /// Signed 32-bit integer.
    Int(i32),
    /// Signed 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    /// An instance of a named remote class.
    Object(RemoteObject),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value widened to `i64`, if this is an integral number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the remote object, if this is one.
    pub fn as_object(&self) -> Option<&RemoteObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Builds an object value from a class name and fields.
    pub fn object<I, K>(class_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(RemoteObject::new(class_name, fields))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "\\u{:04x}", v),
            },
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Object(o) => write!(f, "{}", o),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An instance of a named class with its fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    class_name: String,
    fields: Vec<(String, Value)>,
}

impl RemoteObject {
    /// Creates a new object with the given class name and fields.
    pub fn new<I, K>(class_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            class_name: class_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns all fields in declaration order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Returns the value of a named field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Consumes the object, returning its fields.
    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.class_name)?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        f.write_str(")")
    }
}

/// An exception raised on the server, transported by class name and message.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteThrowable {
    class_name: String,
    message: Option<String>,
    cause: Option<Box<RemoteThrowable>>,
}

impl RemoteThrowable {
    /// Creates a throwable with the given class name and message.
    pub fn new(class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message,
            cause: None,
        }
    }

    /// Attaches a cause.
    pub fn with_cause(mut self, cause: RemoteThrowable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the remote class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the cause, if any.
    pub fn cause(&self) -> Option<&RemoteThrowable> {
        self.cause.as_deref()
    }
}

impl fmt::Display for RemoteThrowable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}: {}", self.class_name, m),
            None => f.write_str(&self.class_name),
        }
    }
}

impl std::error::Error for RemoteThrowable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}
