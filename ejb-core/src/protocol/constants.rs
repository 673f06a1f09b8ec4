//! Protocol constants for the remote EJB envelope format.

/// Magic bytes opening every envelope.
pub const PROTOCOL_MAGIC: [u8; 4] = *b"EJBP";

/// Major protocol version; peers must agree on it.
pub const PROTOCOL_MAJOR: u8 = 4;

/// Minor protocol version; informational.
pub const PROTOCOL_MINOR: u8 = 7;

/// Size of the frame length field in bytes.
pub const SIZE_OF_FRAME_LENGTH_FIELD: usize = 4;

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

// Request kinds.

/// Remote invocation request.
pub const REQUEST_EJB: u8 = 0;
/// Naming request.
pub const REQUEST_JNDI: u8 = 1;
/// Authentication request.
pub const REQUEST_AUTH: u8 = 2;
/// Cluster metadata request.
pub const REQUEST_CLUSTER: u8 = 3;
/// Logout request.
pub const REQUEST_LOGOUT: u8 = 4;
/// Stop request; carries no payload.
pub const REQUEST_STOP: u8 = 5;

// Remote invocation sub-kinds.

/// Fetch the bean descriptor through the home.
pub const HOME_GET_EJB_META_DATA: u8 = 1;
/// Fetch a home handle.
pub const HOME_GET_HOME_HANDLE: u8 = 2;
/// Remove through a handle.
pub const HOME_REMOVE_BY_HANDLE: u8 = 3;
/// Remove through a primary key.
pub const HOME_REMOVE_BY_PKEY: u8 = 4;
/// Finder method.
pub const HOME_FIND: u8 = 9;
/// Create method.
pub const HOME_CREATE: u8 = 10;
/// Other home method.
pub const HOME_METHOD: u8 = 11;
/// Fetch the home of an object.
pub const OBJECT_GET_EJB_HOME: u8 = 14;
/// Fetch an object handle.
pub const OBJECT_GET_HANDLE: u8 = 15;
/// Fetch the primary key of an object.
pub const OBJECT_GET_PRIMARY_KEY: u8 = 16;
/// Identity comparison of two objects.
pub const OBJECT_IS_IDENTICAL: u8 = 17;
/// Remove an object.
pub const OBJECT_REMOVE: u8 = 18;
/// Business method invocation.
pub const OBJECT_BUSINESS_METHOD: u8 = 23;
/// Cancel an asynchronous invocation by request id.
pub const FUTURE_CANCEL: u8 = 24;

// Naming sub-kinds.

/// Lookup of a single name.
pub const JNDI_LOOKUP: u8 = 27;
/// List names and classes in a context.
pub const JNDI_LIST: u8 = 28;
/// List names, classes and bound objects in a context.
pub const JNDI_LIST_BINDINGS: u8 = 29;

// Response codes.

/// Authentication granted.
pub const AUTH_GRANTED: u8 = 1;
/// Authentication granted against another server.
pub const AUTH_REDIRECT: u8 = 2;
/// Authentication denied.
pub const AUTH_DENIED: u8 = 3;
/// Invocation returned a value.
pub const EJB_OK: u8 = 4;
/// Create returned a primary key.
pub const EJB_OK_CREATE: u8 = 5;
/// Single finder returned a primary key.
pub const EJB_OK_FOUND: u8 = 6;
/// Bulk finder returned a collection of primary keys.
pub const EJB_OK_FOUND_COLLECTION: u8 = 7;
/// Single finder found nothing.
pub const EJB_OK_NOT_FOUND: u8 = 8;
/// Application exception.
pub const EJB_APP_EXCEPTION: u8 = 9;
/// System exception.
pub const EJB_SYS_EXCEPTION: u8 = 10;
/// Fatal server error.
pub const EJB_ERROR: u8 = 11;
/// Naming lookup returned a plain value.
pub const JNDI_OK: u8 = 12;
/// Naming lookup returned a home descriptor.
pub const JNDI_EJBHOME: u8 = 13;
/// Naming lookup resolved to a sub-context.
pub const JNDI_CONTEXT: u8 = 14;
/// Naming list returned an enumeration.
pub const JNDI_ENUMERATION: u8 = 15;
/// Name not bound.
pub const JNDI_NOT_FOUND: u8 = 16;
/// Remote naming exception.
pub const JNDI_NAMING_EXCEPTION: u8 = 17;
/// Remote runtime exception.
pub const JNDI_RUNTIME_EXCEPTION: u8 = 18;
/// Remote naming error.
pub const JNDI_ERROR: u8 = 19;
/// Bulk finder returned an enumeration of primary keys.
pub const EJB_OK_FOUND_ENUMERATION: u8 = 20;
/// Naming lookup returned a business-interface descriptor.
pub const JNDI_BUSINESS_OBJECT: u8 = 21;
/// Logout succeeded.
pub const LOGOUT_SUCCESS: u8 = 22;
/// Logout failed.
pub const LOGOUT_FAILED: u8 = 23;

// Cluster response codes.

/// The client's cluster view is current.
pub const CLUSTER_CURRENT: u8 = 0;
/// A newer cluster view follows.
pub const CLUSTER_UPDATE: u8 = 1;
/// The server failed to produce a cluster view.
pub const CLUSTER_FAILURE: u8 = 2;
