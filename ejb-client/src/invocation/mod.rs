//! Home and object proxies and the engine that dispatches their calls.
//!
//! Every proxy owns an [`InvocationHandler`]. Component-specific behavior
//! (finders, identity grouping, remove semantics) comes from a [`BeanPolicy`]
//! chosen from the descriptor's component type.

mod future;
mod handle;
mod handler;
mod home;
mod interface;
mod object;
mod operation;
mod policy;
mod pool;
mod registry;

pub use future::AsyncResult;
pub use handle::{Handle, HomeHandle};
pub use handler::{InvocationHandler, ProxyKind};
pub use home::{EjbHome, FindResult};
pub use interface::{InterfaceDescriptor, InterfaceRegistry, InterfaceStyle, MethodDescriptor};
pub use object::EjbObject;
pub use operation::{Call, Operation, Reply};
pub use policy::{BeanPolicy, IdentityKey};
pub use pool::{AsyncPool, Job};
pub use registry::{HandleRegistry, HandlerState};
