//! Naming-context client.
//!
//! A context is *unauthenticated* until [`InitialContext::connect`] succeeds.
//! An authentication response may redirect the context to another server, in
//! which case every later request of that context goes there.

mod context;

pub use context::{Binding, InitialContext};
pub use ejb_core::protocol::NameClassPair;
