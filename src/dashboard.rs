//! Per-role dashboard payloads.

use crate::constants::DASHBOARD_RECENT_REQUESTS;
use crate::error::{PortalError, PortalResult};
use crate::letter::{self, LetterRequestView};
use crate::orm::letter_requests::{self, LetterStatus};
use crate::orm::users::StaffRole;
use crate::orm::villages::VillageStatus;
use crate::orm::{citizens, users, villages};
use crate::report::{self, VillageSummary};
use crate::role::{Capability, Principal, Role};
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, DatabaseConnection, PaginatorTrait};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SuperAdminDashboard {
    pub villages: u64,
    pub active_villages: u64,
    pub staff_accounts: u64,
    pub citizens: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VillageDashboard {
    pub village: villages::Model,
    pub summary: VillageSummary,
    pub pending_requests: Vec<LetterRequestView>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CitizenDashboard {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub requests: Vec<letter_requests::Model>,
}

impl CitizenDashboard {
    fn from_requests(requests: Vec<letter_requests::Model>) -> Self {
        let count = |status: LetterStatus| requests.iter().filter(|r| r.status == status).count();
        Self {
            total: requests.len(),
            pending: count(LetterStatus::Pending),
            approved: count(LetterStatus::Approved),
            rejected: count(LetterStatus::Rejected),
            requests,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "role", content = "data", rename_all = "snake_case")]
pub enum Dashboard {
    SuperAdmin(SuperAdminDashboard),
    Village(VillageDashboard),
    Citizen(CitizenDashboard),
}

pub async fn super_admin_dashboard(db: &DatabaseConnection) -> PortalResult<SuperAdminDashboard> {
    let (villages, active_villages, staff_accounts, citizens) = futures::try_join!(
        villages::Entity::find().count(db),
        villages::Entity::find()
            .filter(villages::Column::Status.eq(VillageStatus::Active))
            .count(db),
        users::Entity::find()
            .filter(users::Column::Role.ne(StaffRole::SuperAdmin))
            .count(db),
        citizens::Entity::find().count(db),
    )?;

    Ok(SuperAdminDashboard {
        villages: villages as u64,
        active_villages: active_villages as u64,
        staff_accounts: staff_accounts as u64,
        citizens: citizens as u64,
    })
}

pub async fn village_dashboard(
    db: &DatabaseConnection,
    village_id: i32,
    now: NaiveDateTime,
) -> PortalResult<VillageDashboard> {
    let (village, summary, pending_requests) = futures::try_join!(
        crate::village::get_village(db, village_id),
        report::village_summary(db, village_id, now),
        async {
            letter::pending_requests(db, village_id, DASHBOARD_RECENT_REQUESTS)
                .await
                .map_err(PortalError::from)
        },
    )?;

    Ok(VillageDashboard {
        village,
        summary,
        pending_requests,
    })
}

pub async fn citizen_dashboard(
    db: &DatabaseConnection,
    citizen_id: i32,
) -> PortalResult<CitizenDashboard> {
    let requests = letter::citizen_requests(db, citizen_id).await?;
    Ok(CitizenDashboard::from_requests(requests))
}

/// The dashboard matching the principal's role.
pub async fn dashboard_for(
    db: &DatabaseConnection,
    principal: &Principal,
    now: NaiveDateTime,
) -> PortalResult<Dashboard> {
    principal.require(Capability::ViewDashboard)?;
    match principal.role() {
        Role::SuperAdmin => Ok(Dashboard::SuperAdmin(super_admin_dashboard(db).await?)),
        Role::VillageAdmin | Role::VillageStaff => {
            let scope = principal.village_scope(Capability::ViewDashboard)?;
            Ok(Dashboard::Village(
                village_dashboard(db, scope.village_id, now).await?,
            ))
        }
        Role::Citizen => Ok(Dashboard::Citizen(
            citizen_dashboard(db, principal.citizen_id()?).await?,
        )),
    }
}
