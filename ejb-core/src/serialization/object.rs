//! Object graph codec with class filtering and resolve hooks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::filter::ClassFilter;
use super::value::*;
use super::{DataInput, DataOutput};
use crate::error::{EjbError, Result};

/// Default maximum nesting depth of a decoded object graph.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hook that turns a decoded remote object into its local representation.
pub type ResolveHook = Arc<dyn Fn(RemoteObject) -> Result<Value> + Send + Sync>;

/// Classes the client knows how to materialize.
///
/// A hook runs only after the class has passed the [`ClassFilter`]. In strict
/// mode, objects of unregistered classes are reported as
/// [`EjbError::ClassNotFound`] instead of being kept as generic objects.
#[derive(Clone, Default)]
pub struct ClassRegistry {
    hooks: HashMap<String, ResolveHook>,
    strict: bool,
}

impl ClassRegistry {
    /// Creates an empty, lenient registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires every decoded object class to be registered.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Registers a resolve hook for a class.
    pub fn register<F>(mut self, class_name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(RemoteObject) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.insert(class_name.into(), Arc::new(hook));
        self
    }

    /// Returns true if the class has a hook.
    pub fn contains(&self, class_name: &str) -> bool {
        self.hooks.contains_key(class_name)
    }

    fn resolve(&self, object: RemoteObject) -> Result<Value> {
        match self.hooks.get(object.class_name()) {
            Some(hook) => hook(object),
            None if self.strict => Err(EjbError::ClassNotFound(object.class_name().to_string())),
            None => Ok(Value::Object(object)),
        }
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("ClassRegistry")
            .field("classes", &names)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Encodes and decodes [`Value`] graphs and [`RemoteThrowable`]s.
///
/// Encoding never consults the filter. Decoding checks every class name
/// (objects and throwables) against the filter before reading the object's
/// fields, so rejected classes are never materialized.
#[derive(Debug, Clone)]
pub struct ObjectCodec {
    filter: ClassFilter,
    registry: ClassRegistry,
    max_depth: usize,
}

impl Default for ObjectCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCodec {
    /// Creates a codec that accepts every class.
    pub fn new() -> Self {
        Self {
            filter: ClassFilter::allow_all(),
            registry: ClassRegistry::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the class filter.
    pub fn with_filter(mut self, filter: ClassFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the class registry.
    pub fn with_registry(mut self, registry: ClassRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the class filter.
    pub fn filter(&self) -> &ClassFilter {
        &self.filter
    }

    /// Writes a value with its type tag.
    pub fn write_value<W: DataOutput>(&self, out: &mut W, value: &Value) -> Result<()> {
        match value {
            Value::Null => out.write_u8(TAG_NULL),
            Value::Bool(v) => {
                out.write_u8(TAG_BOOL)?;
                out.write_bool(*v)
            }
            Value::Byte(v) => {
                out.write_u8(TAG_BYTE)?;
                out.write_byte(*v)
            }
            Value::Short(v) => {
                out.write_u8(TAG_SHORT)?;
                out.write_short(*v)
            }
            Value::Char(v) => {
                out.write_u8(TAG_CHAR)?;
                out.write_char(*v)
            }
            Value::Int(v) => {
                out.write_u8(TAG_INT)?;
                out.write_int(*v)
            }
            Value::Long(v) => {
                out.write_u8(TAG_LONG)?;
                out.write_long(*v)
            }
            Value::Float(v) => {
                out.write_u8(TAG_FLOAT)?;
                out.write_float(*v)
            }
            Value::Double(v) => {
                out.write_u8(TAG_DOUBLE)?;
                out.write_double(*v)
            }
            Value::String(v) => {
                out.write_u8(TAG_STRING)?;
                out.write_string(v)
            }
            Value::Bytes(v) => {
                out.write_u8(TAG_BYTES)?;
                write_len(out, v.len())?;
                out.write_bytes(v)
            }
            Value::List(items) => {
                out.write_u8(TAG_LIST)?;
                write_len(out, items.len())?;
                for item in items {
                    self.write_value(out, item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                out.write_u8(TAG_MAP)?;
                write_len(out, entries.len())?;
                for (k, v) in entries {
                    self.write_value(out, k)?;
                    self.write_value(out, v)?;
                }
                Ok(())
            }
            Value::Object(o) => {
                out.write_u8(TAG_OBJECT)?;
                out.write_utf(o.class_name())?;
                write_len(out, o.fields().len())?;
                for (name, v) in o.fields() {
                    out.write_utf(name)?;
                    self.write_value(out, v)?;
                }
                Ok(())
            }
        }
    }

    /// Reads a tagged value.
    pub fn read_value<R: DataInput>(&self, input: &mut R) -> Result<Value> {
        self.read_value_at(input, 0)
    }

    fn read_value_at<R: DataInput>(&self, input: &mut R, depth: usize) -> Result<Value> {
        if depth > self.max_depth {
            return Err(EjbError::Serialization(format!(
                "object graph exceeds maximum depth {}",
                self.max_depth
            )));
        }
        let tag = input.read_u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => Value::Bool(input.read_bool()?),
            TAG_BYTE => Value::Byte(input.read_byte()?),
            TAG_SHORT => Value::Short(input.read_short()?),
            TAG_CHAR => Value::Char(input.read_char()?),
            TAG_INT => Value::Int(input.read_int()?),
            TAG_LONG => Value::Long(input.read_long()?),
            TAG_FLOAT => Value::Float(input.read_float()?),
            TAG_DOUBLE => Value::Double(input.read_double()?),
            TAG_STRING => Value::String(input.read_string()?),
            TAG_BYTES => {
                let len = input.read_length(1)?;
                Value::Bytes(input.read_bytes(len)?)
            }
            TAG_LIST => {
                let len = input.read_length(1)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_value_at(input, depth + 1)?);
                }
                Value::List(items)
            }
            TAG_MAP => {
                let len = input.read_length(2)?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = self.read_value_at(input, depth + 1)?;
                    let v = self.read_value_at(input, depth + 1)?;
                    entries.push((k, v));
                }
                Value::Map(entries)
            }
            TAG_OBJECT => {
                let class_name = input.read_utf()?;
                self.check_class(&class_name)?;
                let len = input.read_length(3)?;
                let mut fields = Vec::with_capacity(len);
                for _ in 0..len {
                    let name = input.read_utf()?;
                    let v = self.read_value_at(input, depth + 1)?;
                    fields.push((name, v));
                }
                self.registry.resolve(RemoteObject::new(class_name, fields))?
            }
            other => {
                return Err(EjbError::Protocol(format!("unknown value tag: {}", other)));
            }
        };
        Ok(value)
    }

    /// Writes a throwable: class name, optional message and optional cause chain.
    pub fn write_throwable<W: DataOutput>(&self, out: &mut W, t: &RemoteThrowable) -> Result<()> {
        out.write_utf(t.class_name())?;
        out.write_nullable_utf(t.message())?;
        match t.cause() {
            Some(cause) => {
                out.write_bool(true)?;
                self.write_throwable(out, cause)
            }
            None => out.write_bool(false),
        }
    }

    /// Reads a throwable, filtering every class in the cause chain.
    pub fn read_throwable<R: DataInput>(&self, input: &mut R) -> Result<RemoteThrowable> {
        self.read_throwable_at(input, 0)
    }

    fn read_throwable_at<R: DataInput>(&self, input: &mut R, depth: usize) -> Result<RemoteThrowable> {
        if depth > self.max_depth {
            return Err(EjbError::Serialization(format!(
                "cause chain exceeds maximum depth {}",
                self.max_depth
            )));
        }
        let class_name = input.read_utf()?;
        self.check_class(&class_name)?;
        let message = input.read_nullable_utf()?;
        let throwable = RemoteThrowable::new(class_name, message);
        if input.read_bool()? {
            let cause = self.read_throwable_at(input, depth + 1)?;
            Ok(throwable.with_cause(cause))
        } else {
            Ok(throwable)
        }
    }

    fn check_class(&self, class_name: &str) -> Result<()> {
        if self.filter.accepts(class_name) {
            Ok(())
        } else {
            tracing::warn!(class = %class_name, "refused to deserialize filtered class");
            Err(EjbError::DeserializationRejected(class_name.to_string()))
        }
    }
}

fn write_len<W: DataOutput>(out: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| EjbError::Serialization(format!("collection too large: {}", len)))?;
    out.write_int(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{BufferInput, BufferOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn encode(codec: &ObjectCodec, value: &Value) -> Vec<u8> {
        let mut out = BufferOutput::new();
        codec.write_value(&mut out, value).unwrap();
        out.into_bytes()
    }

    #[test]
    fn test_nested_graph_round_trip() {
        let codec = ObjectCodec::new();
        let value = Value::List(vec![
            Value::Int(1),
            Value::Char('x' as u16),
            Value::Map(vec![(Value::from("k"), Value::Bytes(vec![1, 2, 3]))]),
            Value::object(
                "com.acme.Key",
                [("id", Value::Long(9)), ("tags", Value::List(vec![Value::Null]))],
            ),
        ]);
        let bytes = encode(&codec, &value);
        let decoded = codec.read_value(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_unknown_tag_is_protocol_error() {
        let codec = ObjectCodec::new();
        let err = codec.read_value(&mut BufferInput::new(&[99])).unwrap_err();
        assert!(matches!(err, EjbError::Protocol(_)));
    }

    #[test]
    fn test_denied_class_is_rejected_without_instantiation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = ClassRegistry::new().register("org.evil.Gadget", move |o| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Object(o))
        });
        let writer = ObjectCodec::new();
        let reader = ObjectCodec::new()
            .with_filter(ClassFilter::allow_all().exclude("org.evil.*"))
            .with_registry(registry);

        let bytes = encode(&writer, &Value::object("org.evil.Gadget", [("cmd", Value::from("rm"))]));
        let err = reader.read_value(&mut BufferInput::new(&bytes)).unwrap_err();

        assert!(matches!(err, EjbError::DeserializationRejected(ref c) if c == "org.evil.Gadget"));
        assert!(err.is_security());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_allowed_class_runs_hook() {
        let registry = ClassRegistry::new()
            .register("com.acme.Money", |o| Ok(o.field("cents").cloned().unwrap_or_default()));
        let codec = ObjectCodec::new().with_registry(registry);
        let bytes = encode(&codec, &Value::object("com.acme.Money", [("cents", Value::Long(250))]));
        let decoded = codec.read_value(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, Value::Long(250));
    }

    #[test]
    fn test_strict_registry_reports_class_not_found() {
        let codec = ObjectCodec::new().with_registry(ClassRegistry::new().strict(true));
        let bytes = encode(&codec, &Value::object("com.acme.Unknown", Vec::<(String, Value)>::new()));
        let err = codec.read_value(&mut BufferInput::new(&bytes)).unwrap_err();
        assert!(matches!(err, EjbError::ClassNotFound(ref c) if c == "com.acme.Unknown"));
    }

    #[test]
    fn test_max_depth_enforced() {
        let codec = ObjectCodec::new().with_max_depth(2);
        let mut value = Value::Int(0);
        for _ in 0..5 {
            value = Value::List(vec![value]);
        }
        let bytes = encode(&codec, &value);
        let err = codec.read_value(&mut BufferInput::new(&bytes)).unwrap_err();
        assert!(err.to_string().contains("maximum depth"));
    }

    #[test]
    fn test_throwable_cause_chain_round_trip() {
        let codec = ObjectCodec::new();
        let t = RemoteThrowable::new("com.acme.AppError", Some("insufficient funds".into()))
            .with_cause(RemoteThrowable::new("com.acme.Root", None));
        let mut out = BufferOutput::new();
        codec.write_throwable(&mut out, &t).unwrap();
        let bytes = out.into_bytes();
        let decoded = codec.read_throwable(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, t);
    }

    #[test]
    fn test_throwable_cause_is_filtered() {
        let writer = ObjectCodec::new();
        let reader = ObjectCodec::new().with_filter(ClassFilter::allow_all().exclude("org.evil.*"));
        let t = RemoteThrowable::new("com.acme.AppError", None)
            .with_cause(RemoteThrowable::new("org.evil.Cause", None));
        let mut out = BufferOutput::new();
        writer.write_throwable(&mut out, &t).unwrap();
        let bytes = out.into_bytes();
        let err = reader.read_throwable(&mut BufferInput::new(&bytes)).unwrap_err();
        assert!(matches!(err, EjbError::DeserializationRejected(_)));
    }
}
