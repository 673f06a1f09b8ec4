//! Remote EJB envelope protocol.
//!
//! Requests and responses are tagged unions whose discriminant byte alone
//! fixes the fields that follow; there is no self-describing schema.

mod codec;
pub mod constants;
mod envelope;
mod request;
mod response;

pub use codec::FrameCodec;
pub use constants::*;
pub use envelope::{ProtocolHeader, RequestEnvelope, ResponseEnvelope};
pub use request::{
    Argument, AuthenticationRequest, ClusterRequest, EjbRequest, JndiMethod, JndiRequest,
    LogoutRequest, Request, RequestMethod, RequestType,
};
pub use response::{
    AuthenticationResponse, ClusterResponse, EjbResponse, JndiResponse, LogoutResponse,
    NameClassPair, Response,
};
