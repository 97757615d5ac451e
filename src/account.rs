//! Staff account management.
//!
//! Super admins manage every account. Village admins manage the
//! `perangkat_desa` accounts of their own village only.

use crate::activity::{self, Actor};
use crate::error::{PortalError, PortalResult};
use crate::orm::users::{self, AccountStatus, StaffRole};
use crate::role::{Capability, Principal, Role};
use crate::session::{hash_password, verify_password};
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    PaginatorTrait, Set, TransactionTrait,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewAccountForm {
    #[validate(length(min = 3, max = 64, message = "must be 3 to 64 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 1000, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub full_name: String,
    pub role: StaffRole,
    pub village_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpdateAccountForm {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub full_name: String,
    pub role: StaffRole,
    pub village_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PasswordForm {
    #[validate(length(min = 8, max = 1000, message = "must be at least 8 characters"))]
    pub new_password: String,
}

/// Who is managing accounts, resolved from the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountManager {
    SuperAdmin { actor_id: i32 },
    VillageAdmin { actor_id: i32, village_id: i32 },
}

impl AccountManager {
    pub fn from_principal(principal: &Principal) -> PortalResult<Self> {
        principal.require(Capability::ManageAccounts)?;
        match (principal.role(), principal.user_id(), principal.village_id()) {
            (Role::SuperAdmin, Some(actor_id), _) => Ok(Self::SuperAdmin { actor_id }),
            (Role::VillageAdmin, Some(actor_id), Some(village_id)) => Ok(Self::VillageAdmin {
                actor_id,
                village_id,
            }),
            _ => Err(PortalError::Forbidden),
        }
    }

    pub fn actor_id(&self) -> i32 {
        match self {
            Self::SuperAdmin { actor_id } | Self::VillageAdmin { actor_id, .. } => *actor_id,
        }
    }

    fn village_id(&self) -> Option<i32> {
        match self {
            Self::SuperAdmin { .. } => None,
            Self::VillageAdmin { village_id, .. } => Some(*village_id),
        }
    }

    /// Role and village an account may be given by this manager.
    fn assignment(
        &self,
        role: StaffRole,
        village_id: Option<i32>,
    ) -> PortalResult<(StaffRole, Option<i32>)> {
        match self {
            Self::SuperAdmin { .. } => Ok((role, village_id)),
            Self::VillageAdmin { village_id: own, .. } => {
                if role != StaffRole::PerangkatDesa {
                    return Err(PortalError::Forbidden);
                }
                Ok((role, Some(*own)))
            }
        }
    }

    fn may_manage(&self, account: &users::Model) -> bool {
        match self {
            Self::SuperAdmin { .. } => true,
            Self::VillageAdmin { village_id, .. } => {
                account.role == StaffRole::PerangkatDesa && account.village_id == Some(*village_id)
            }
        }
    }
}

/// A write refused by one of the unique indexes on `users`, which back up
/// the username and [`check_assignment`] reads when two writes race.
fn unique_conflict(err: DbErr, username: &str) -> PortalError {
    if !crate::db::is_unique_violation(&err) {
        return err.into();
    }
    if err.to_string().contains("username") {
        PortalError::conflict(format!("Username {} is already taken", username))
    } else {
        PortalError::conflict("Village already has an admin")
    }
}

async fn check_assignment<C: ConnectionTrait>(
    db: &C,
    role: StaffRole,
    village_id: Option<i32>,
    account_id: Option<i32>,
) -> PortalResult<()> {
    match (role.requires_village(), village_id) {
        (true, None) => {
            return Err(PortalError::validation(
                "village_id: required for village accounts",
            ))
        }
        (false, Some(_)) => {
            return Err(PortalError::validation(
                "village_id: super admin accounts have no village",
            ))
        }
        _ => {}
    }

    if let Some(village_id) = village_id {
        crate::village::get_village(db, village_id).await?;

        if role == StaffRole::AdminDesa {
            if let Some(existing) = crate::village::village_admin(db, village_id).await? {
                if Some(existing.id) != account_id {
                    return Err(PortalError::conflict(format!(
                        "Village already has an admin ({})",
                        existing.username
                    )));
                }
            }
        }
    }

    Ok(())
}

async fn find_managed(
    db: &DatabaseTransaction,
    manager: &AccountManager,
    id: i32,
) -> PortalResult<users::Model> {
    let account = users::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Account"))?;
    if !manager.may_manage(&account) {
        // Accounts outside the manager's reach look absent.
        return Err(PortalError::NotFound("Account"));
    }
    Ok(account)
}

pub async fn create_account(
    db: &DatabaseConnection,
    manager: &AccountManager,
    form: NewAccountForm,
    now: NaiveDateTime,
) -> PortalResult<users::Model> {
    form.validate()?;
    let (role, village_id) = manager.assignment(form.role, form.village_id)?;
    let username = form.username.trim().to_string();
    let password_hash = hash_password(&form.password)?;

    let txn = db.begin().await?;
    check_assignment(&txn, role, village_id, None).await?;

    let taken = users::Entity::find()
        .filter(users::Column::Username.eq(username.as_str()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(PortalError::conflict(format!(
            "Username {} is already taken",
            username
        )));
    }

    let account = users::ActiveModel {
        username: Set(username.clone()),
        email: Set(form.email.trim().to_lowercase()),
        password: Set(password_hash),
        full_name: Set(form.full_name.trim().to_string()),
        role: Set(role),
        status: Set(AccountStatus::Aktif),
        village_id: Set(village_id),
        failed_login_attempts: Set(0),
        locked_until: Set(None),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| unique_conflict(e, &username))?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(manager.actor_id(), account.village_id),
        "Tambah akun",
        Some(format!("{} ({:?})", account.username, account.role)),
        now,
    )
    .await;

    log::info!(
        "Account created: {} (user_id: {})",
        account.username,
        account.id
    );
    Ok(account)
}

/// Creates the first super admin when none exists yet.
///
/// Returns None when a super admin is already present.
pub async fn bootstrap_super_admin(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
    now: NaiveDateTime,
) -> PortalResult<Option<users::Model>> {
    let existing = users::Entity::find()
        .filter(users::Column::Role.eq(StaffRole::SuperAdmin))
        .count(db)
        .await?;
    if existing > 0 {
        return Ok(None);
    }

    let form = NewAccountForm {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        full_name: "Super Admin".to_string(),
        role: StaffRole::SuperAdmin,
        village_id: None,
    };
    form.validate()?;

    let account = users::ActiveModel {
        username: Set(form.username.trim().to_string()),
        email: Set(form.email.trim().to_lowercase()),
        password: Set(hash_password(&form.password)?),
        full_name: Set(form.full_name),
        role: Set(StaffRole::SuperAdmin),
        status: Set(AccountStatus::Aktif),
        village_id: Set(None),
        failed_login_attempts: Set(0),
        locked_until: Set(None),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    activity::record(
        db,
        Actor::anonymous(None),
        "Bootstrap super admin",
        Some(account.username.clone()),
        now,
    )
    .await;

    log::info!("Bootstrapped super admin {}", account.username);
    Ok(Some(account))
}

pub async fn update_account(
    db: &DatabaseConnection,
    manager: &AccountManager,
    id: i32,
    form: UpdateAccountForm,
    now: NaiveDateTime,
) -> PortalResult<users::Model> {
    form.validate()?;
    let (role, village_id) = manager.assignment(form.role, form.village_id)?;

    let txn = db.begin().await?;
    let account = find_managed(&txn, manager, id).await?;
    check_assignment(&txn, role, village_id, Some(account.id)).await?;

    let username = account.username.clone();
    let mut active: users::ActiveModel = account.into();
    active.email = Set(form.email.trim().to_lowercase());
    active.full_name = Set(form.full_name.trim().to_string());
    active.role = Set(role);
    active.village_id = Set(village_id);
    active.updated_at = Set(now);
    let account = active
        .update(&txn)
        .await
        .map_err(|e| unique_conflict(e, &username))?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(manager.actor_id(), account.village_id),
        "Ubah akun",
        Some(account.username.clone()),
        now,
    )
    .await;

    Ok(account)
}

pub async fn set_account_status(
    db: &DatabaseConnection,
    manager: &AccountManager,
    id: i32,
    status: AccountStatus,
    now: NaiveDateTime,
) -> PortalResult<users::Model> {
    if id == manager.actor_id() {
        return Err(PortalError::validation("You cannot change your own status"));
    }

    let txn = db.begin().await?;
    let account = find_managed(&txn, manager, id).await?;
    let mut active: users::ActiveModel = account.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    let account = active.update(&txn).await?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(manager.actor_id(), account.village_id),
        "Ubah status akun",
        Some(format!("{} -> {:?}", account.username, status)),
        now,
    )
    .await;

    Ok(account)
}

/// Sets a new password chosen by the manager and clears any lockout.
pub async fn reset_password(
    db: &DatabaseConnection,
    manager: &AccountManager,
    id: i32,
    form: PasswordForm,
    now: NaiveDateTime,
) -> PortalResult<()> {
    form.validate()?;
    let password_hash = hash_password(&form.new_password)?;

    let txn = db.begin().await?;
    let account = find_managed(&txn, manager, id).await?;
    let username = account.username.clone();
    let village_id = account.village_id;
    let mut active: users::ActiveModel = account.into();
    active.password = Set(password_hash);
    active.failed_login_attempts = Set(0);
    active.locked_until = Set(None);
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(manager.actor_id(), village_id),
        "Reset password",
        Some(username),
        now,
    )
    .await;

    Ok(())
}

/// Password change by the account owner.
pub async fn change_own_password(
    db: &DatabaseConnection,
    user_id: i32,
    current_password: &str,
    form: PasswordForm,
    now: NaiveDateTime,
) -> PortalResult<()> {
    form.validate()?;
    let account = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Account"))?;

    if !verify_password(current_password, &account.password) {
        return Err(PortalError::InvalidCredentials);
    }

    let village_id = account.village_id;
    let mut active: users::ActiveModel = account.into();
    active.password = Set(hash_password(&form.new_password)?);
    active.updated_at = Set(now);
    active.update(db).await?;

    activity::record(
        db,
        Actor::staff(user_id, village_id),
        "Ganti password",
        None,
        now,
    )
    .await;

    Ok(())
}

pub async fn delete_account(
    db: &DatabaseConnection,
    manager: &AccountManager,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    if id == manager.actor_id() {
        return Err(PortalError::validation("You cannot delete your own account"));
    }

    let txn = db.begin().await?;
    let account = find_managed(&txn, manager, id).await?;
    users::Entity::delete_by_id(account.id).exec(&txn).await?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(manager.actor_id(), account.village_id),
        "Hapus akun",
        Some(account.username),
        now,
    )
    .await;

    Ok(())
}

pub async fn get_account(
    db: &DatabaseConnection,
    manager: &AccountManager,
    id: i32,
) -> PortalResult<users::Model> {
    let txn = db.begin().await?;
    let account = find_managed(&txn, manager, id).await?;
    txn.commit().await?;
    Ok(account)
}

pub async fn list_accounts(
    db: &DatabaseConnection,
    manager: &AccountManager,
) -> PortalResult<Vec<users::Model>> {
    let mut query = users::Entity::find().order_by_asc(users::Column::Username);
    if let Some(village_id) = manager.village_id() {
        query = query
            .filter(users::Column::VillageId.eq(village_id))
            .filter(users::Column::Role.eq(StaffRole::PerangkatDesa));
    }
    Ok(query.all(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_refusals_become_conflicts() {
        let taken = unique_conflict(
            DbErr::Exec("UNIQUE constraint failed: users.username".to_string()),
            "admin_skm",
        );
        assert_eq!(taken.to_string(), "Username admin_skm is already taken");

        let seat = unique_conflict(
            DbErr::Exec("UNIQUE constraint failed: users.village_id".to_string()),
            "admin_kedua",
        );
        assert!(matches!(seat, PortalError::Conflict(ref m) if m == "Village already has an admin"));

        let other = unique_conflict(DbErr::Exec("disk I/O error".to_string()), "x");
        assert!(matches!(other, PortalError::Backend(_)));
    }
}
