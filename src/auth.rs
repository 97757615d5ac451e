//! Credential checks for staff accounts and citizens.

use crate::activity::{self, Actor};
use crate::error::{PortalError, PortalResult};
use crate::orm::{citizens, users};
use crate::role::{Principal, Role};
use crate::session::{
    citizen_principal, constant_time_eq, dummy_verify, staff_principal, verify_password,
};
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, DatabaseConnection, Set};
use serde::Serialize;

/// Failed-attempt lockout applied to staff logins.
#[derive(Clone, Copy, Debug)]
pub struct LockoutPolicy {
    pub max_failed_logins: i32,
    pub lockout: chrono::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout: chrono::Duration::minutes(15),
        }
    }
}

impl LockoutPolicy {
    pub fn from_config() -> Self {
        let security = crate::app_config::security();
        Self {
            max_failed_logins: security.max_failed_logins as i32,
            lockout: chrono::Duration::minutes(security.lockout_duration_minutes as i64),
        }
    }
}

/// Session payload handed to the presentation layer after login.
#[derive(Clone, Debug, Serialize)]
pub struct LoginSession {
    pub role: Role,
    pub redirect: &'static str,
    pub name: String,
    pub village_id: Option<i32>,
}

impl LoginSession {
    pub fn of(principal: &Principal) -> Self {
        let role = principal.role();
        Self {
            role,
            redirect: role.dashboard_path(),
            name: principal.display_name().to_string(),
            village_id: principal.village_id(),
        }
    }
}

/// Username and password login for staff.
///
/// Unknown user, wrong password and inactive account are indistinguishable to
/// the caller.
pub async fn staff_login(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    policy: &LockoutPolicy,
    now: NaiveDateTime,
) -> PortalResult<Principal> {
    let username = username.trim();

    let user = match users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?
    {
        Some(user) => user,
        None => {
            dummy_verify(password);
            log::debug!("login failure: unknown user {}", username);
            return Err(PortalError::InvalidCredentials);
        }
    };

    let mut failed_attempts = user.failed_login_attempts;
    if let Some(locked_until) = user.locked_until {
        if locked_until > now {
            // Answered like any other failure; the lock is not revealed.
            dummy_verify(password);
            log::warn!("Login attempt on locked account: {}", username);
            return Err(PortalError::InvalidCredentials);
        }
        // Lock has expired, start counting again
        failed_attempts = 0;
    }

    if !verify_password(password, &user.password) {
        let new_attempts = failed_attempts + 1;
        let mut active_user: users::ActiveModel = user.clone().into();
        active_user.failed_login_attempts = Set(new_attempts);
        active_user.locked_until = Set(None);

        if new_attempts >= policy.max_failed_logins {
            active_user.locked_until = Set(Some(now + policy.lockout));
            log::warn!(
                "Account locked due to {} failed login attempts: user_id={}",
                new_attempts,
                user.id
            );
        }

        active_user.update(db).await?;
        log::debug!("login failure: bad password for {}", username);
        return Err(PortalError::InvalidCredentials);
    }

    let principal = match staff_principal(&user) {
        Some(principal) => principal,
        None => {
            log::debug!(
                "login failure: account {} is inactive or has no village",
                username
            );
            return Err(PortalError::InvalidCredentials);
        }
    };

    let mut active_user: users::ActiveModel = user.clone().into();
    active_user.failed_login_attempts = Set(0);
    active_user.locked_until = Set(None);
    active_user.last_login_at = Set(Some(now));
    active_user.update(db).await?;

    activity::record(
        db,
        Actor::staff(user.id, user.village_id),
        "Login",
        Some(format!("{} ({})", user.username, principal.role().as_str())),
        now,
    )
    .await;

    log::info!("Staff login: {} as {}", user.username, principal.role().as_str());
    Ok(principal)
}

/// NIK plus birth date login for citizens.
///
/// The birth date must equal the stored `YYYY-MM-DD` string exactly.
pub async fn citizen_login(
    db: &DatabaseConnection,
    nik: &str,
    birth_date: &str,
    now: NaiveDateTime,
) -> PortalResult<Principal> {
    let nik = nik.trim();

    let citizen = match citizens::Entity::find()
        .filter(citizens::Column::Nik.eq(nik))
        .one(db)
        .await?
    {
        Some(citizen) => citizen,
        None => {
            log::debug!("citizen login failure: unknown NIK");
            return Err(PortalError::InvalidCredentials);
        }
    };

    if !constant_time_eq(birth_date, &citizen.tanggal_lahir) {
        log::debug!("citizen login failure: birth date mismatch");
        return Err(PortalError::InvalidCredentials);
    }

    activity::record(
        db,
        Actor::anonymous(Some(citizen.village_id)),
        "Login masyarakat",
        Some(citizen.nik.clone()),
        now,
    )
    .await;

    Ok(citizen_principal(&citizen))
}
