//! Role reference data used for assignment and workload aggregation

use crate::instance::UserId;
use crate::stage::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A role in the organization (read-only reference data)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role_id: RoleId,
    pub name: String,
    pub department: String,
    /// Permission names granted to holders of this role
    pub permissions: Vec<String>,
}

impl RoleInfo {
    pub fn new(
        role_id: impl Into<String>,
        name: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            role_id: RoleId::new(role_id),
            name: name.into(),
            department: department.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }
}

/// A user in the role directory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    /// Inactive users are never assigned work
    pub active: bool,
    /// When this user last received an assignment (round-robin tiebreak)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            display_name: display_name.into(),
            roles: Vec::new(),
            active: true,
            last_assigned_at: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(RoleId::new(role));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn holds_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }
}
