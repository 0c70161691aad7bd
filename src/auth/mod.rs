//! Session/token authentication.
//!
//! A signed, expiring token held by the client and a server-side session
//! record jointly establish identity: the codec proves the token, the store
//! proves the session, and both must agree.

pub mod authenticator;
pub mod cookie;
pub mod handlers;
pub mod issuer;
pub mod service;
pub mod token;

pub use authenticator::{AuthenticatedUser, SessionAuthenticator};
pub use issuer::{ClientMetadata, IssuedSession, SessionIssuer};
pub use service::AuthService;
pub use token::{TokenClaims, TokenCodec};
