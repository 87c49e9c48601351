//! Route-level role guards.
//!
//! Each protected router declares the privilege roles it accepts; the session
//! middleware checks the signed `role` claim against that set.

use payd_auth::{AuthzError, authorize_role};

use crate::context::SessionContext;

pub const ADMIN_ONLY: &[&str] = &["admin"];
pub const ANY_MEMBER: &[&str] = &["admin", "employee"];

pub fn authorize_session(session: &SessionContext, allowed: &[&str]) -> Result<(), AuthzError> {
    authorize_role(session.identity(), allowed)
}
