//! Roles, capabilities and the authenticated principal.
//!
//! The role is resolved once, when the session is turned into a [`Principal`].
//! Handlers ask for a [`Capability`] and never compare role names themselves.

use crate::constants::CITIZEN_ROLE_NAME;
use crate::error::{PortalError, PortalResult};
use crate::orm::users::StaffRole;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    ManageVillages,
    ManageAccounts,
    ManageCitizens,
    ProcessLetters,
    ManageArchives,
    ManageWebsite,
    ViewReports,
    ViewActivityLog,
    SubmitLetters,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Role {
    #[serde(rename = "super_admin")]
    SuperAdmin,
    #[serde(rename = "admin_desa")]
    VillageAdmin,
    #[serde(rename = "perangkat_desa")]
    VillageStaff,
    #[serde(rename = "masyarakat")]
    Citizen,
}

const SUPER_ADMIN_CAPS: &[Capability] = &[
    Capability::ViewDashboard,
    Capability::ManageVillages,
    Capability::ManageAccounts,
    Capability::ViewActivityLog,
];

const VILLAGE_ADMIN_CAPS: &[Capability] = &[
    Capability::ViewDashboard,
    Capability::ManageAccounts,
    Capability::ManageCitizens,
    Capability::ProcessLetters,
    Capability::ManageArchives,
    Capability::ManageWebsite,
    Capability::ViewReports,
    Capability::ViewActivityLog,
];

const VILLAGE_STAFF_CAPS: &[Capability] = &[
    Capability::ViewDashboard,
    Capability::ManageCitizens,
    Capability::ProcessLetters,
    Capability::ManageArchives,
    Capability::ViewReports,
];

const CITIZEN_CAPS: &[Capability] = &[Capability::ViewDashboard, Capability::SubmitLetters];

impl Role {
    pub fn from_staff(role: StaffRole) -> Self {
        match role {
            StaffRole::SuperAdmin => Role::SuperAdmin,
            StaffRole::AdminDesa => Role::VillageAdmin,
            StaffRole::PerangkatDesa => Role::VillageStaff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::VillageAdmin => "admin_desa",
            Role::VillageStaff => "perangkat_desa",
            Role::Citizen => CITIZEN_ROLE_NAME,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN_CAPS,
            Role::VillageAdmin => VILLAGE_ADMIN_CAPS,
            Role::VillageStaff => VILLAGE_STAFF_CAPS,
            Role::Citizen => CITIZEN_CAPS,
        }
    }

    pub fn can(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }

    /// Where the client is sent after logging in.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "/super-admin/dashboard",
            Role::VillageAdmin => "/admin/dashboard",
            Role::VillageStaff => "/perangkat/dashboard",
            Role::Citizen => "/masyarakat/dashboard",
        }
    }
}

/// Caller identity plus the village every query must be filtered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VillageScope {
    /// Staff user id acting on the village.
    pub actor_id: i32,
    pub village_id: i32,
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Staff {
        user_id: i32,
        username: String,
        full_name: String,
        role: Role,
        village_id: Option<i32>,
    },
    Citizen {
        citizen_id: i32,
        nik: String,
        nama: String,
        village_id: i32,
    },
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Staff { role, .. } => *role,
            Principal::Citizen { .. } => Role::Citizen,
        }
    }

    pub fn village_id(&self) -> Option<i32> {
        match self {
            Principal::Staff { village_id, .. } => *village_id,
            Principal::Citizen { village_id, .. } => Some(*village_id),
        }
    }

    /// Staff user id, None for citizens.
    pub fn user_id(&self) -> Option<i32> {
        match self {
            Principal::Staff { user_id, .. } => Some(*user_id),
            Principal::Citizen { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Principal::Staff { full_name, .. } => full_name,
            Principal::Citizen { nama, .. } => nama,
        }
    }

    pub fn can(&self, cap: Capability) -> bool {
        self.role().can(cap)
    }

    pub fn require(&self, cap: Capability) -> PortalResult<&Self> {
        if self.can(cap) {
            Ok(self)
        } else {
            Err(PortalError::Forbidden)
        }
    }

    /// Resolves the village a staff member acts on for `cap`.
    pub fn village_scope(&self, cap: Capability) -> PortalResult<VillageScope> {
        self.require(cap)?;
        match self {
            Principal::Staff {
                user_id,
                village_id: Some(village_id),
                ..
            } => Ok(VillageScope {
                actor_id: *user_id,
                village_id: *village_id,
            }),
            _ => Err(PortalError::Forbidden),
        }
    }

    /// The citizen id for citizen-only operations.
    pub fn citizen_id(&self) -> PortalResult<i32> {
        match self {
            Principal::Citizen { citizen_id, .. } => Ok(*citizen_id),
            Principal::Staff { .. } => Err(PortalError::Forbidden),
        }
    }
}
