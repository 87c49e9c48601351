use serde::{Deserialize, Serialize};
use thiserror::Error;

use payd_auth::{Role, SessionIdentity};
use payd_core::{IdentityId, RoleId};
use payd_infra::RegisterRequest;

const MIN_PASSWORD_LEN: usize = 6;

/// A request body that parsed but failed field validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{0} must be a valid email address")]
    InvalidEmail(&'static str),

    #[error("{0} must be a valid UUID")]
    InvalidUuid(&'static str),

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.username.is_empty() {
            return Err(RequestError::Required("username"));
        }
        if !is_email(&self.username) {
            return Err(RequestError::InvalidEmail("username"));
        }
        if self.password.is_empty() {
            return Err(RequestError::Required("password"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateAccountRequest {
    pub id: String,
    pub name: String,
    pub password: String,
}

impl ActivateAccountRequest {
    pub fn validate(&self) -> Result<IdentityId, RequestError> {
        if self.id.is_empty() {
            return Err(RequestError::Required("id"));
        }
        let id = self
            .id
            .parse::<IdentityId>()
            .map_err(|_| RequestError::InvalidUuid("id"))?;
        if self.name.trim().is_empty() {
            return Err(RequestError::Required("name"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RequestError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(id)
    }
}

/// `primaryRole` must be absent for admins and present otherwise; the
/// orchestrator enforces that against the role catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub primary_role: Option<i32>,
    #[serde(default)]
    pub role_admin: bool,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<RegisterRequest, RequestError> {
        if self.email.is_empty() {
            return Err(RequestError::Required("email"));
        }
        if !is_email(&self.email) {
            return Err(RequestError::InvalidEmail("email"));
        }
        Ok(RegisterRequest {
            email: self.email,
            primary_role: self.primary_role.map(RoleId::new),
            is_admin: self.role_admin,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub message: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: i32,
    pub role_name: String,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id.get(),
            role_name: role.name,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub employee_id: i32,
    pub employee_name: String,
    pub role: String,
    pub primary_role: i32,
    pub expires_at: i64,
}

impl From<&SessionIdentity> for MeResponse {
    fn from(session: &SessionIdentity) -> Self {
        Self {
            id: session.id.to_string(),
            email: session.email.clone(),
            employee_id: session.employee_id.get(),
            employee_name: session.employee_name.clone(),
            role: session.role.clone(),
            primary_role: session.primary_role.get(),
            expires_at: session.expires_at.timestamp(),
        }
    }
}

// Loose shape check: one `@`, non-empty local part, dotted domain.
fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}
