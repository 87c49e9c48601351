//! Typed schema of the trait payload stored on provider identities.
//!
//! Wire shape:
//!
//! ```json
//! { "email": "a@b.com", "role": "admin", "primary_role": 0, "employee_id": "12" }
//! ```
//!
//! `employee_id` is only present after activation. Parsing is explicit and
//! reports the first offending field instead of trusting the remote shape.

use serde_json::{Map, Value};
use thiserror::Error;

use payd_core::{EmployeeId, RoleId};

use crate::PrivilegeRole;

pub const EMAIL: &str = "email";
pub const ROLE: &str = "role";
pub const PRIMARY_ROLE: &str = "primary_role";
pub const EMPLOYEE_ID: &str = "employee_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traits {
    pub email: String,
    pub role: PrivilegeRole,
    pub primary_role: RoleId,
    pub employee_id: Option<EmployeeId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraitsError {
    #[error("traits payload is not a JSON object")]
    NotAnObject,

    #[error("trait `{0}` is missing")]
    Missing(&'static str),

    #[error("trait `{field}` has the wrong type (expected {expected})")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("trait `{field}` has an invalid value: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Traits {
    /// Traits for a freshly registered (not yet activated) identity.
    pub fn registration(email: impl Into<String>, role: PrivilegeRole, primary_role: RoleId) -> Self {
        Self {
            email: email.into(),
            role,
            primary_role,
            employee_id: None,
        }
    }

    pub fn with_employee(mut self, employee_id: EmployeeId) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    /// Parse a provider payload into typed traits.
    pub fn parse(value: &Value) -> Result<Self, TraitsError> {
        let map = value.as_object().ok_or(TraitsError::NotAnObject)?;

        let email = string_field(map, EMAIL)?.to_string();

        let role_raw = string_field(map, ROLE)?;
        let role = PrivilegeRole::parse(role_raw).ok_or_else(|| TraitsError::InvalidValue {
            field: ROLE,
            value: role_raw.to_string(),
        })?;

        let primary_role = RoleId::new(integer_field(map, PRIMARY_ROLE)?);

        let employee_id = match map.get(EMPLOYEE_ID) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.parse::<EmployeeId>().map_err(|_| {
                TraitsError::InvalidValue {
                    field: EMPLOYEE_ID,
                    value: s.clone(),
                }
            })?),
            Some(_) => {
                return Err(TraitsError::InvalidType {
                    field: EMPLOYEE_ID,
                    expected: "string",
                });
            }
        };

        Ok(Self {
            email,
            role,
            primary_role,
            employee_id,
        })
    }

    /// Employee id, required once the identity is active.
    pub fn require_employee_id(&self) -> Result<EmployeeId, TraitsError> {
        match self.employee_id {
            Some(id) if id.get() != 0 => Ok(id),
            Some(id) => Err(TraitsError::InvalidValue {
                field: EMPLOYEE_ID,
                value: id.to_string(),
            }),
            None => Err(TraitsError::Missing(EMPLOYEE_ID)),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(EMAIL.to_string(), Value::String(self.email.clone()));
        map.insert(ROLE.to_string(), Value::String(self.role.as_str().to_string()));
        map.insert(PRIMARY_ROLE.to_string(), Value::from(self.primary_role.get()));
        if let Some(id) = self.employee_id {
            map.insert(EMPLOYEE_ID.to_string(), Value::String(id.to_string()));
        }
        Value::Object(map)
    }
}

fn string_field<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, TraitsError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(TraitsError::Missing(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(TraitsError::InvalidType {
            field,
            expected: "string",
        }),
    }
}

// JSON numbers may arrive as floats (`1.0`); only integral values are accepted.
fn integer_field(map: &Map<String, Value>, field: &'static str) -> Result<i32, TraitsError> {
    let value = match map.get(field) {
        None | Some(Value::Null) => return Err(TraitsError::Missing(field)),
        Some(v) => v,
    };
    let number = value.as_number().ok_or(TraitsError::InvalidType {
        field,
        expected: "integer",
    })?;
    let as_i64 = number
        .as_i64()
        .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| TraitsError::InvalidValue {
            field,
            value: number.to_string(),
        })?;
    i32::try_from(as_i64).map_err(|_| TraitsError::InvalidValue {
        field,
        value: as_i64.to_string(),
    })
}
