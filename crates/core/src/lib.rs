//! `payd-core`: shared primitives for the workforce identity service.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{ErrorKind, InvalidId};
pub use id::{EmployeeId, IdentityId, RoleId};
