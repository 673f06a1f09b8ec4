//! Identity propagation and login credentials.

mod credentials;
mod identity;

pub use credentials::Credentials;
pub use identity::{
    is_known_resolver, resolver_for_name, scoped_identity, with_identity, DefaultIdentityResolver,
    GlobalLogin, IdentityResolver, ScopedIdentityResolver, SecurityContext, StaticIdentityResolver,
};
