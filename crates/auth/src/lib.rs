//! `payd-auth`: identity and session boundary.
//!
//! This crate is decoupled from HTTP, storage and the identity
//! provider: it owns the typed shapes exchanged with them and the signed
//! session token, nothing that performs IO.

pub mod authorize;
pub mod claims;
pub mod cookie;
pub mod identity;
pub mod roles;
pub mod token;
pub mod traits;

pub use authorize::{AuthzError, authorize_role};
pub use claims::{SessionClaims, SessionIdentity, validate_expiry};
pub use cookie::{SESSION_COOKIE, SessionCookie};
pub use identity::{Identity, IdentityState};
pub use roles::{PrivilegeRole, Role};
pub use token::{SessionTokenCodec, TokenError};
pub use traits::{Traits, TraitsError};
