//! Core wire types and codecs for remote EJB invocation.

#![warn(missing_docs)]

pub mod error;
pub mod metadata;
pub mod protocol;
pub mod serialization;

pub use error::{EjbError, Result};
pub use metadata::{
    ClientMetaData, ClusterMetaData, ComponentType, EjbMetaData, MethodSignature, ServerMetaData,
};
pub use serialization::{
    BufferInput, BufferOutput, ClassFilter, ClassRegistry, DataInput, DataOutput, ObjectCodec,
    RemoteObject, RemoteThrowable, Value,
};
