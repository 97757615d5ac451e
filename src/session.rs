//! Session identity and credential helpers.
//!
//! The cookie only carries a [`SessionIdentity`]. The principal behind it is
//! re-loaded and re-validated from the database on every request by
//! [`load_principal`], so a deactivated account loses access immediately.

use crate::error::{PortalError, PortalResult};
use crate::orm::{citizens, users};
use crate::role::{Principal, Role};
use actix_session::Session;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

/// Hash of a random password nobody knows, checked when there is no real one.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    let secret = SaltString::generate(&mut OsRng);
    hash_password(secret.as_str()).ok()
});

const IDENTITY_KEY: &str = "identity";

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Hashes a staff password into a PHC string.
pub fn hash_password(password: &str) -> PortalResult<String> {
    get_argon2()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            PortalError::Validation("Password could not be processed".to_string())
        })
}

/// Checks a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Spends one argon2 verification without an account behind it. Always false.
pub fn dummy_verify(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}

/// Exact string equality that does not short-circuit on the first difference.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Staff,
    Citizen,
}

/// What the session cookie remembers about the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub kind: IdentityKind,
    pub id: i32,
}

impl SessionIdentity {
    pub fn of(principal: &Principal) -> Self {
        match principal {
            Principal::Staff { user_id, .. } => Self {
                kind: IdentityKind::Staff,
                id: *user_id,
            },
            Principal::Citizen { citizen_id, .. } => Self {
                kind: IdentityKind::Citizen,
                id: *citizen_id,
            },
        }
    }
}

/// Starts a fresh session for `principal`.
pub fn store_identity(session: &Session, principal: &Principal) -> Result<(), actix_web::Error> {
    session.renew();
    session
        .insert(IDENTITY_KEY, SessionIdentity::of(principal))
        .map_err(|_| actix_web::error::ErrorInternalServerError("middleware error"))
}

pub fn read_identity(session: &Session) -> Option<SessionIdentity> {
    match session.get::<SessionIdentity>(IDENTITY_KEY) {
        Ok(identity) => identity,
        Err(e) => {
            log::warn!("Discarding unreadable session identity: {}", e);
            session.remove(IDENTITY_KEY);
            None
        }
    }
}

/// Drops the identity but keeps the rest of the session, such as the CSRF token.
pub fn forget_identity(session: &Session) {
    session.remove(IDENTITY_KEY);
}

pub fn clear(session: &Session) {
    session.purge();
}

/// Turns an active staff account into a principal.
pub fn staff_principal(user: &users::Model) -> Option<Principal> {
    if user.status != users::AccountStatus::Aktif {
        return None;
    }
    if user.role.requires_village() && user.village_id.is_none() {
        return None;
    }

    Some(Principal::Staff {
        user_id: user.id,
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        role: Role::from_staff(user.role),
        village_id: user.village_id,
    })
}

pub fn citizen_principal(citizen: &citizens::Model) -> Principal {
    Principal::Citizen {
        citizen_id: citizen.id,
        nik: citizen.nik.clone(),
        nama: citizen.nama.clone(),
        village_id: citizen.village_id,
    }
}

/// Re-validates a stored identity. None means the session no longer grants access.
pub async fn load_principal<C: ConnectionTrait>(
    db: &C,
    identity: SessionIdentity,
) -> PortalResult<Option<Principal>> {
    match identity.kind {
        IdentityKind::Staff => Ok(users::Entity::find_by_id(identity.id)
            .one(db)
            .await?
            .and_then(|user| staff_principal(&user))),
        IdentityKind::Citizen => Ok(citizens::Entity::find_by_id(identity.id)
            .one(db)
            .await?
            .map(|citizen| citizen_principal(&citizen))),
    }
}
