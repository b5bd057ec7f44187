use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const PERMISSION_VIEW_ALL_REQUESTS: &str = "requests:view_all";
pub const PERMISSION_WORKFLOW_OVERRIDE: &str = "workflow:override";
pub const PERMISSION_VIEW_REPORTS: &str = "reports:view";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requestor,
    DepartmentFocal,
    LineManager,
    Hod,
    TicketingAdmin,
    ClaimsAdmin,
    VisaAdmin,
    TransportAdmin,
    AccommodationAdmin,
    SystemAdmin,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Self::Requestor,
        Self::DepartmentFocal,
        Self::LineManager,
        Self::Hod,
        Self::TicketingAdmin,
        Self::ClaimsAdmin,
        Self::VisaAdmin,
        Self::TransportAdmin,
        Self::AccommodationAdmin,
        Self::SystemAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requestor => "requestor",
            Self::DepartmentFocal => "department_focal",
            Self::LineManager => "line_manager",
            Self::Hod => "hod",
            Self::TicketingAdmin => "ticketing_admin",
            Self::ClaimsAdmin => "claims_admin",
            Self::VisaAdmin => "visa_admin",
            Self::TransportAdmin => "transport_admin",
            Self::AccommodationAdmin => "accommodation_admin",
            Self::SystemAdmin => "system_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let key = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|role| role.as_str() == key)
    }

    /// Display label used in workflow views.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Requestor => "Requestor",
            Self::DepartmentFocal => "Department Focal",
            Self::LineManager => "Line Manager",
            Self::Hod => "HOD",
            Self::TicketingAdmin => "Ticketing Admin",
            Self::ClaimsAdmin => "Claims Admin",
            Self::VisaAdmin => "Visa Admin",
            Self::TransportAdmin => "Transport Admin",
            Self::AccommodationAdmin => "Accommodation Admin",
            Self::SystemAdmin => "System Admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
}

impl User {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn can_view_all_requests(&self) -> bool {
        self.has_permission(PERMISSION_VIEW_ALL_REQUESTS)
    }

    pub fn can_override_workflow(&self) -> bool {
        self.has_permission(PERMISSION_WORKFLOW_OVERRIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_parse_normalizes_separators_and_case() {
        assert_eq!(Role::parse("Department Focal"), Some(Role::DepartmentFocal));
        assert_eq!(Role::parse("line-manager"), Some(Role::LineManager));
        assert_eq!(Role::parse("HOD"), Some(Role::Hod));
        assert_eq!(Role::parse("finance"), None);
    }
}
