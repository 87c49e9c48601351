use serde::{Deserialize, Serialize};

use payd_core::{EmployeeId, IdentityId, RoleId};

use crate::{PrivilegeRole, Traits};

/// Lifecycle state of an identity in the provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityState {
    Inactive,
    Active,
}

impl IdentityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityState::Inactive => "inactive",
            IdentityState::Active => "active",
        }
    }
}

impl core::fmt::Display for IdentityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identity as seen by this service.
///
/// Provider-owned fields (email, privilege role, primary role, state) are
/// always present. Employee fields are filled once the identity has been
/// activated and joined with its local employee row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub role: PrivilegeRole,
    pub primary_role: RoleId,
    pub state: IdentityState,
    pub employee_id: Option<EmployeeId>,
    pub employee_name: Option<String>,
}

impl Identity {
    /// Build an identity from its id, state and parsed provider traits.
    pub fn from_traits(id: IdentityId, state: IdentityState, traits: Traits) -> Self {
        Self {
            id,
            email: traits.email,
            role: traits.role,
            primary_role: traits.primary_role,
            state,
            employee_id: traits.employee_id,
            employee_name: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == IdentityState::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == PrivilegeRole::Admin
    }

    /// Trait payload as persisted in the provider.
    pub fn traits(&self) -> Traits {
        Traits {
            email: self.email.clone(),
            role: self.role,
            primary_role: self.primary_role,
            employee_id: self.employee_id,
        }
    }
}
