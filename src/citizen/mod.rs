//! Citizen registry (data penduduk), always scoped to one village.

pub mod import;

use crate::activity::{self, Actor};
use crate::constants::NIK_LENGTH;
use crate::error::{PortalError, PortalResult};
use crate::orm::{citizens, letter_requests};
use crate::role::VillageScope;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use validator::{Validate, ValidationError};

pub use import::{CitizenRecord, CitizenSink, ImportError, ImportOutcome, ImportSettings};

static BIRTH_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// True for exactly sixteen ASCII digits.
pub fn is_sixteen_digits(value: &str) -> bool {
    value.len() == NIK_LENGTH && value.bytes().all(|b| b.is_ascii_digit())
}

/// True for a strict `YYYY-MM-DD` string naming a real calendar date.
pub fn is_valid_birth_date(value: &str) -> bool {
    BIRTH_DATE_REGEX.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn validate_sixteen_digits(value: &str) -> Result<(), ValidationError> {
    if is_sixteen_digits(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("sixteen_digits");
        err.message = Some("must be exactly 16 digits".into());
        Err(err)
    }
}

fn validate_birth_date(value: &str) -> Result<(), ValidationError> {
    if is_valid_birth_date(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("birth_date");
        err.message = Some("must be a valid date in YYYY-MM-DD format".into());
        Err(err)
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CitizenForm {
    #[validate(custom = "validate_sixteen_digits")]
    pub nik: String,
    #[validate(custom = "validate_sixteen_digits")]
    pub no_kk: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub nama: String,
    #[validate(custom = "validate_birth_date")]
    pub tanggal_lahir: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub alamat: String,
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub no_telepon: Option<String>,
}

impl CitizenForm {
    /// Trims every field and turns a blank phone number into None.
    pub fn normalized(self) -> Self {
        Self {
            nik: self.nik.trim().to_string(),
            no_kk: self.no_kk.trim().to_string(),
            nama: self.nama.trim().to_string(),
            tanggal_lahir: self.tanggal_lahir.trim().to_string(),
            alamat: self.alamat.trim().to_string(),
            no_telepon: self
                .no_telepon
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

/// Case-insensitive substring match of `term` against any of `fields`.
/// A blank term matches everything.
pub fn matches_search(term: &str, fields: &[&str]) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&term))
}

async fn ensure_nik_free<C: ConnectionTrait>(
    db: &C,
    nik: &str,
    except: Option<i32>,
) -> PortalResult<()> {
    let mut query = citizens::Entity::find().filter(citizens::Column::Nik.eq(nik));
    if let Some(id) = except {
        query = query.filter(citizens::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(PortalError::conflict(format!("NIK {} sudah terdaftar", nik)));
    }
    Ok(())
}

pub async fn create_citizen(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: CitizenForm,
    now: NaiveDateTime,
) -> PortalResult<citizens::Model> {
    let form = form.normalized();
    form.validate()?;
    ensure_nik_free(db, &form.nik, None).await?;

    let citizen = citizens::ActiveModel {
        village_id: Set(scope.village_id),
        nik: Set(form.nik),
        no_kk: Set(form.no_kk),
        nama: Set(form.nama),
        tanggal_lahir: Set(form.tanggal_lahir),
        alamat: Set(form.alamat),
        no_telepon: Set(form.no_telepon),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        "Tambah penduduk",
        Some(format!("{} ({})", citizen.nama, citizen.nik)),
        now,
    )
    .await;

    Ok(citizen)
}

/// Citizen of the scope's village. Citizens of other villages look absent.
pub async fn get_citizen<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    id: i32,
) -> PortalResult<citizens::Model> {
    citizens::Entity::find_by_id(id)
        .filter(citizens::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Citizen"))
}

pub async fn update_citizen(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: CitizenForm,
    now: NaiveDateTime,
) -> PortalResult<citizens::Model> {
    let form = form.normalized();
    form.validate()?;
    let citizen = get_citizen(db, scope.village_id, id).await?;
    ensure_nik_free(db, &form.nik, Some(id)).await?;

    let mut active: citizens::ActiveModel = citizen.into();
    active.nik = Set(form.nik);
    active.no_kk = Set(form.no_kk);
    active.nama = Set(form.nama);
    active.tanggal_lahir = Set(form.tanggal_lahir);
    active.alamat = Set(form.alamat);
    active.no_telepon = Set(form.no_telepon);
    active.updated_at = Set(now);
    let citizen = active.update(db).await?;

    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        "Ubah penduduk",
        Some(format!("{} ({})", citizen.nama, citizen.nik)),
        now,
    )
    .await;

    Ok(citizen)
}

/// Removes a citizen. Their letter requests go with them.
pub async fn delete_citizen(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let citizen = get_citizen(db, scope.village_id, id).await?;

    // Letter requests go with the citizen.
    let txn = db.begin().await?;
    letter_requests::Entity::delete_many()
        .filter(letter_requests::Column::CitizenId.eq(citizen.id))
        .exec(&txn)
        .await?;
    citizens::Entity::delete_by_id(citizen.id).exec(&txn).await?;
    txn.commit().await?;

    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        "Hapus penduduk",
        Some(format!("{} ({})", citizen.nama, citizen.nik)),
        now,
    )
    .await;

    Ok(())
}

/// Citizens of a village ordered by name, optionally narrowed by a search
/// over NIK, No KK and name.
pub async fn list_citizens<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    search: Option<&str>,
) -> PortalResult<Vec<citizens::Model>> {
    let citizens = citizens::Entity::find()
        .filter(citizens::Column::VillageId.eq(village_id))
        .order_by_asc(citizens::Column::Nama)
        .order_by_asc(citizens::Column::Id)
        .all(db)
        .await?;

    Ok(match search {
        Some(term) => citizens
            .into_iter()
            .filter(|c| matches_search(term, &[&c.nik, &c.no_kk, &c.nama]))
            .collect(),
        None => citizens,
    })
}

/// Imports a CSV file into the scope's village and logs the outcome.
pub async fn import_csv(
    db: &DatabaseConnection,
    scope: &VillageScope,
    text: &str,
    settings: &ImportSettings,
    now: NaiveDateTime,
) -> PortalResult<ImportOutcome> {
    let result = import::import_citizens(db, scope.village_id, text, settings, now).await;

    let imported = match &result {
        Ok(outcome) => outcome.imported,
        Err(ImportError::BatchFailed { imported, .. }) => *imported,
        Err(_) => 0,
    };
    if imported > 0 {
        activity::record(
            db,
            Actor::staff(scope.actor_id, Some(scope.village_id)),
            "Import penduduk",
            Some(format!("{} data penduduk diimpor", imported)),
            now,
        )
        .await;
    }

    Ok(result?)
}
