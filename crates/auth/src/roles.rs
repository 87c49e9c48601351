use serde::{Deserialize, Serialize};

use payd_core::RoleId;

/// Privilege tier of an identity: what the account may do.
///
/// Serialized as the lowercase strings stored in the provider traits and
/// carried in session tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeRole {
    Admin,
    Employee,
}

impl PrivilegeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeRole::Admin => "admin",
            PrivilegeRole::Employee => "employee",
        }
    }

    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            PrivilegeRole::Admin
        } else {
            PrivilegeRole::Employee
        }
    }

    /// Exact, case-sensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(PrivilegeRole::Admin),
            "employee" => Some(PrivilegeRole::Employee),
            _ => None,
        }
    }
}

impl core::fmt::Display for PrivilegeRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Responsibility-tier role catalog entry (what job someone does).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_parse_is_case_sensitive() {
        assert_eq!(PrivilegeRole::parse("admin"), Some(PrivilegeRole::Admin));
        assert_eq!(PrivilegeRole::parse("Admin"), None);
        assert_eq!(PrivilegeRole::parse("employee "), None);
    }

    #[test]
    fn privilege_serializes_lowercase() {
        let json = serde_json::to_value(PrivilegeRole::Employee).unwrap();
        assert_eq!(json, serde_json::json!("employee"));
    }
}
