//! Binary serialization for the envelope wire format.
//!
//! Primitives are big-endian. Arbitrary object graphs travel as tagged
//! [`Value`] trees and are checked against a [`ClassFilter`] on the way in.

mod data_input;
mod data_output;
mod filter;
mod object;
mod value;

pub use data_input::{BufferInput, DataInput};
pub use data_output::{BufferOutput, DataOutput};
pub use filter::ClassFilter;
pub use object::{ClassRegistry, ObjectCodec, ResolveHook, DEFAULT_MAX_DEPTH};
pub use value::{RemoteObject, RemoteThrowable, Value};
