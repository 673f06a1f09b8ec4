//! Server, cluster, client and bean metadata exchanged on the wire.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, RwLock};

use url::Url;

use crate::error::{EjbError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectCodec, Value};

/// Parses a location string into a URL, mapping failures to configuration errors.
pub fn parse_location(location: &str) -> Result<Url> {
    Url::parse(location.trim())
        .map_err(|e| EjbError::Configuration(format!("invalid server URI '{}': {}", location, e)))
}

/// A single network location of a server.
///
/// Immutable after construction. Travels on the wire as its string form and
/// is reparsed on arrival.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerMetaData {
    location: Url,
}

impl ServerMetaData {
    /// Creates server metadata for a parsed location.
    pub fn new(location: Url) -> Self {
        Self { location }
    }

    /// Parses a location string such as `ejbd://10.0.0.1:4201`.
    pub fn parse(location: &str) -> Result<Self> {
        parse_location(location).map(Self::new)
    }

    /// Returns the location.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Returns the URI scheme, which selects the transport.
    pub fn scheme(&self) -> &str {
        self.location.scheme()
    }

    /// Returns the host, if the URI has one.
    pub fn host(&self) -> Option<&str> {
        self.location.host_str()
    }

    /// Returns the explicit or scheme-default port.
    pub fn port(&self) -> Option<u16> {
        self.location.port_or_known_default()
    }

    /// Writes the location as a UTF string.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_utf(self.location.as_str())
    }

    /// Reads and reparses a location.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let raw = input.read_utf()?;
        Url::parse(&raw)
            .map(Self::new)
            .map_err(|e| EjbError::Protocol(format!("invalid server location '{}': {}", raw, e)))
    }
}

impl FromStr for ServerMetaData {
    type Err = EjbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.location.as_str())
    }
}

impl From<Url> for ServerMetaData {
    fn from(location: Url) -> Self {
        Self::new(location)
    }
}

/// A versioned list of server locations forming one cluster.
///
/// Clones share the mutable parts (last successful location and the
/// round-robin cursor), so every holder of a cluster view observes the same
/// hint and advances the same cursor.
#[derive(Debug, Clone)]
pub struct ClusterMetaData {
    locations: Vec<Url>,
    version: i64,
    connection_strategy: Option<String>,
    last_location: Arc<RwLock<Option<Url>>>,
    cursor: Arc<AtomicUsize>,
}

impl ClusterMetaData {
    /// Creates cluster metadata with the given version and locations.
    pub fn new(version: i64, locations: Vec<Url>) -> Self {
        Self {
            locations,
            version,
            connection_strategy: None,
            last_location: Arc::new(RwLock::new(None)),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates an unversioned cluster of a single server.
    pub fn single(server: &ServerMetaData) -> Self {
        Self::new(0, vec![server.location().clone()])
    }

    /// Sets the named connection strategy.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.connection_strategy = Some(strategy.into());
        self
    }

    /// Returns the member locations in server order.
    pub fn locations(&self) -> &[Url] {
        &self.locations
    }

    /// Returns the version.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the named connection strategy, if the server chose one.
    pub fn connection_strategy(&self) -> Option<&str> {
        self.connection_strategy.as_deref()
    }

    /// Returns the last location a connection succeeded against.
    pub fn last_location(&self) -> Option<Url> {
        self.last_location
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Records the last location a connection succeeded against.
    pub fn set_last_location(&self, location: Url) {
        match self.last_location.write() {
            Ok(mut guard) => *guard = Some(location),
            Err(poisoned) => *poisoned.into_inner() = Some(location),
        }
    }

    /// Returns the shared round-robin cursor.
    pub fn cursor(&self) -> &AtomicUsize {
        &self.cursor
    }

    /// Returns true if `other` is strictly newer than this view.
    pub fn is_older_than(&self, other: &ClusterMetaData) -> bool {
        other.version > self.version
    }

    /// Replaces membership with `incoming` if it is newer.
    ///
    /// The last-location hint and cursor are kept. Returns true if the view
    /// changed.
    pub fn merge(&mut self, incoming: &ClusterMetaData) -> bool {
        if !self.is_older_than(incoming) {
            return false;
        }
        self.locations = incoming.locations.clone();
        self.version = incoming.version;
        self.connection_strategy = incoming.connection_strategy.clone();
        true
    }

    /// Writes version, strategy name and locations.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_long(self.version)?;
        out.write_nullable_utf(self.connection_strategy.as_deref())?;
        out.write_int(self.locations.len() as i32)?;
        for location in &self.locations {
            out.write_utf(location.as_str())?;
        }
        Ok(())
    }

    /// Reads version, strategy name and locations.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let version = input.read_long()?;
        let strategy = input.read_nullable_utf()?;
        let count = input.read_length(2)?;
        let mut locations = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = input.read_utf()?;
            let url = Url::parse(&raw).map_err(|e| {
                EjbError::Protocol(format!("invalid cluster location '{}': {}", raw, e))
            })?;
            locations.push(url);
        }
        let mut cluster = Self::new(version, locations);
        cluster.connection_strategy = strategy;
        Ok(cluster)
    }
}

impl PartialEq for ClusterMetaData {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.locations == other.locations
            && self.connection_strategy == other.connection_strategy
    }
}

/// The identity token a server assigned at authentication time.
///
/// Opaque to the client; sent back on every request so the server can
/// recognize the caller without re-authenticating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientMetaData {
    identity: Value,
}

impl ClientMetaData {
    /// Wraps an identity token.
    pub fn new(identity: Value) -> Self {
        Self { identity }
    }

    /// Returns the identity token.
    pub fn identity(&self) -> &Value {
        &self.identity
    }

    /// Consumes the metadata, returning the token.
    pub fn into_identity(self) -> Value {
        self.identity
    }

    /// Writes the token.
    pub fn encode<W: DataOutput>(&self, codec: &ObjectCodec, out: &mut W) -> Result<()> {
        codec.write_value(out, &self.identity)
    }

    /// Reads a token.
    pub fn decode<R: DataInput>(codec: &ObjectCodec, input: &mut R) -> Result<Self> {
        codec.read_value(input).map(Self::new)
    }
}

/// Kind of remote component, selecting the invocation policy on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Conversational session component; the primary key is the session id.
    Stateful,
    /// Pooled session component without identity.
    Stateless,
    /// One shared instance per deployment.
    Singleton,
    /// Entity with bean-managed persistence.
    BmpEntity,
    /// Entity with container-managed persistence.
    CmpEntity,
}

impl ComponentType {
    /// Returns the wire type code.
    pub fn code(&self) -> u8 {
        match self {
            ComponentType::Stateful => 6,
            ComponentType::Stateless => 7,
            ComponentType::BmpEntity => 8,
            ComponentType::CmpEntity => 9,
            ComponentType::Singleton => 10,
        }
    }

    /// Parses a wire type code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            6 => Ok(ComponentType::Stateful),
            7 => Ok(ComponentType::Stateless),
            8 => Ok(ComponentType::BmpEntity),
            9 => Ok(ComponentType::CmpEntity),
            10 => Ok(ComponentType::Singleton),
            other => Err(EjbError::Protocol(format!("unknown component type code: {}", other))),
        }
    }

    /// Returns true for entity components.
    pub fn is_entity(&self) -> bool {
        matches!(self, ComponentType::BmpEntity | ComponentType::CmpEntity)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::Stateful => "stateful",
            ComponentType::Stateless => "stateless",
            ComponentType::Singleton => "singleton",
            ComponentType::BmpEntity => "bmp-entity",
            ComponentType::CmpEntity => "cmp-entity",
        };
        f.write_str(name)
    }
}

/// Identifies a remote method without any shared interface definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Class declaring the method.
    pub declaring_class: String,
    /// Method name.
    pub name: String,
    /// Parameter type names, in order.
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    /// Creates a signature.
    pub fn new<I, S>(declaring_class: impl Into<String>, name: impl Into<String>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declaring_class: declaring_class.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Writes declaring class, name and parameter types.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_utf(&self.declaring_class)?;
        out.write_utf(&self.name)?;
        out.write_int(self.parameter_types.len() as i32)?;
        for t in &self.parameter_types {
            out.write_utf(t)?;
        }
        Ok(())
    }

    /// Reads declaring class, name and parameter types.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let declaring_class = input.read_utf()?;
        let name = input.read_utf()?;
        let count = input.read_length(2)?;
        let mut parameter_types = Vec::with_capacity(count);
        for _ in 0..count {
            parameter_types.push(input.read_utf()?);
        }
        Ok(Self {
            declaring_class,
            name,
            parameter_types,
        })
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.declaring_class,
            self.name,
            self.parameter_types.join(", ")
        )
    }
}

/// Static description of a deployed remote component.
#[derive(Debug, Clone, PartialEq)]
pub struct EjbMetaData {
    /// Component kind.
    pub component_type: ComponentType,
    /// Deployment id, the primary name of the deployment on the server.
    pub deployment_id: String,
    /// Numeric deployment code; positive once the server has assigned one.
    pub deployment_code: i16,
    /// Home interface class, for legacy-style components.
    pub home_interface: Option<String>,
    /// Remote component interface class, for legacy-style components.
    pub remote_interface: Option<String>,
    /// Remote business interface classes.
    pub business_interfaces: Vec<String>,
    /// Primary key class, for entities.
    pub primary_key_class: Option<String>,
    /// Business methods the server executes asynchronously.
    pub asynchronous_methods: Vec<MethodSignature>,
}

impl EjbMetaData {
    /// Creates a descriptor with the given type and deployment id.
    pub fn new(component_type: ComponentType, deployment_id: impl Into<String>) -> Self {
        Self {
            component_type,
            deployment_id: deployment_id.into(),
            deployment_code: 0,
            home_interface: None,
            remote_interface: None,
            business_interfaces: Vec::new(),
            primary_key_class: None,
            asynchronous_methods: Vec::new(),
        }
    }

    /// Sets the home and remote interfaces.
    pub fn with_interfaces(mut self, home: impl Into<String>, remote: impl Into<String>) -> Self {
        self.home_interface = Some(home.into());
        self.remote_interface = Some(remote.into());
        self
    }

    /// Adds a business interface.
    pub fn with_business_interface(mut self, interface: impl Into<String>) -> Self {
        self.business_interfaces.push(interface.into());
        self
    }

    /// Sets the primary key class.
    pub fn with_primary_key_class(mut self, class: impl Into<String>) -> Self {
        self.primary_key_class = Some(class.into());
        self
    }

    /// Sets the deployment code.
    pub fn with_deployment_code(mut self, code: i16) -> Self {
        self.deployment_code = code;
        self
    }

    /// Marks a business method as asynchronous.
    pub fn with_asynchronous_method(mut self, method: MethodSignature) -> Self {
        self.asynchronous_methods.push(method);
        self
    }

    /// Returns true if the method is executed asynchronously.
    pub fn is_asynchronous(&self, method: &MethodSignature) -> bool {
        self.asynchronous_methods.iter().any(|m| m == method)
    }

    /// Writes the descriptor.
    pub fn encode<W: DataOutput>(&self, out: &mut W) -> Result<()> {
        out.write_u8(self.component_type.code())?;
        out.write_utf(&self.deployment_id)?;
        out.write_short(self.deployment_code)?;
        out.write_nullable_utf(self.home_interface.as_deref())?;
        out.write_nullable_utf(self.remote_interface.as_deref())?;
        out.write_int(self.business_interfaces.len() as i32)?;
        for interface in &self.business_interfaces {
            out.write_utf(interface)?;
        }
        out.write_nullable_utf(self.primary_key_class.as_deref())?;
        out.write_int(self.asynchronous_methods.len() as i32)?;
        for method in &self.asynchronous_methods {
            method.encode(out)?;
        }
        Ok(())
    }

    /// Reads a descriptor.
    pub fn decode<R: DataInput>(input: &mut R) -> Result<Self> {
        let component_type = ComponentType::from_code(input.read_u8()?)?;
        let deployment_id = input.read_utf()?;
        let deployment_code = input.read_short()?;
        let home_interface = input.read_nullable_utf()?;
        let remote_interface = input.read_nullable_utf()?;
        let count = input.read_length(2)?;
        let mut business_interfaces = Vec::with_capacity(count);
        for _ in 0..count {
            business_interfaces.push(input.read_utf()?);
        }
        let primary_key_class = input.read_nullable_utf()?;
        let count = input.read_length(8)?;
        let mut asynchronous_methods = Vec::with_capacity(count);
        for _ in 0..count {
            asynchronous_methods.push(MethodSignature::decode(input)?);
        }
        Ok(Self {
            component_type,
            deployment_id,
            deployment_code,
            home_interface,
            remote_interface,
            business_interfaces,
            primary_key_class,
            asynchronous_methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{BufferInput, BufferOutput};

    #[test]
    fn test_server_metadata_parse() {
        let server = ServerMetaData::parse("ejbd://10.0.0.1:4201").unwrap();
        assert_eq!(server.scheme(), "ejbd");
        assert_eq!(server.host(), Some("10.0.0.1"));
        assert_eq!(server.port(), Some(4201));
        assert_eq!(server.to_string(), "ejbd://10.0.0.1:4201");
    }

    #[test]
    fn test_server_metadata_parse_invalid() {
        let err = ServerMetaData::parse("not a uri").unwrap_err();
        assert!(matches!(err, EjbError::Configuration(_)));
    }

    #[test]
    fn test_server_metadata_wire_reparse() {
        let server: ServerMetaData = "http://host:8080/ejb".parse().unwrap();
        let mut out = BufferOutput::new();
        server.encode(&mut out).unwrap();
        let bytes = out.into_bytes();
        let decoded = ServerMetaData::decode(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, server);
    }

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|s| Url::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_cluster_merge_only_if_newer() {
        let mut cached = ClusterMetaData::new(3, urls(&["ejbd://a:1"]));
        let stale = ClusterMetaData::new(2, urls(&["ejbd://b:1"]));
        let same = ClusterMetaData::new(3, urls(&["ejbd://c:1"]));
        let newer = ClusterMetaData::new(4, urls(&["ejbd://d:1", "ejbd://e:1"])).with_strategy("random");

        assert!(!cached.merge(&stale));
        assert!(!cached.merge(&same));
        assert_eq!(cached.locations(), urls(&["ejbd://a:1"]).as_slice());

        assert!(cached.merge(&newer));
        assert_eq!(cached.version(), 4);
        assert_eq!(cached.locations().len(), 2);
        assert_eq!(cached.connection_strategy(), Some("random"));
    }

    #[test]
    fn test_cluster_merge_keeps_last_location() {
        let mut cached = ClusterMetaData::new(1, urls(&["ejbd://a:1"]));
        cached.set_last_location(Url::parse("ejbd://a:1").unwrap());
        cached.merge(&ClusterMetaData::new(2, urls(&["ejbd://a:1", "ejbd://b:1"])));
        assert_eq!(cached.last_location(), Some(Url::parse("ejbd://a:1").unwrap()));
    }

    #[test]
    fn test_cluster_clones_share_hint() {
        let cluster = ClusterMetaData::new(1, urls(&["ejbd://a:1", "ejbd://b:1"]));
        let clone = cluster.clone();
        clone.set_last_location(Url::parse("ejbd://b:1").unwrap());
        assert_eq!(cluster.last_location(), Some(Url::parse("ejbd://b:1").unwrap()));
    }

    #[test]
    fn test_cluster_round_trip() {
        let cluster = ClusterMetaData::new(7, urls(&["ejbd://a:1", "http://b:2/ejb"])).with_strategy("sticky");
        let mut out = BufferOutput::new();
        cluster.encode(&mut out).unwrap();
        let bytes = out.into_bytes();
        let decoded = ClusterMetaData::decode(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, cluster);
    }

    #[test]
    fn test_component_type_codes() {
        for t in [
            ComponentType::Stateful,
            ComponentType::Stateless,
            ComponentType::Singleton,
            ComponentType::BmpEntity,
            ComponentType::CmpEntity,
        ] {
            assert_eq!(ComponentType::from_code(t.code()).unwrap(), t);
        }
        assert!(ComponentType::from_code(0).is_err());
        assert!(ComponentType::CmpEntity.is_entity());
        assert!(!ComponentType::Stateful.is_entity());
    }

    #[test]
    fn test_ejb_metadata_round_trip() {
        let async_method = MethodSignature::new("com.acme.Reports", "render", ["int"]);
        let meta = EjbMetaData::new(ComponentType::CmpEntity, "AccountBean")
            .with_interfaces("com.acme.AccountHome", "com.acme.Account")
            .with_business_interface("com.acme.Reports")
            .with_primary_key_class("java.lang.Long")
            .with_deployment_code(12)
            .with_asynchronous_method(async_method.clone());
        let mut out = BufferOutput::new();
        meta.encode(&mut out).unwrap();
        let bytes = out.into_bytes();
        let decoded = EjbMetaData::decode(&mut BufferInput::new(&bytes)).unwrap();
        assert_eq!(decoded, meta);
        assert!(decoded.is_asynchronous(&async_method));
    }

    #[test]
    fn test_method_signature_display() {
        let sig = MethodSignature::new("com.acme.Account", "deposit", ["long", "java.lang.String"]);
        assert_eq!(sig.to_string(), "com.acme.Account.deposit(long, java.lang.String)");
    }
}
