//! Document archive: village regulations (Peraturan Desa) and village
//! decisions (Keputusan Kepala Desa).

use crate::activity::{self, Actor};
use crate::error::{PortalError, PortalResult};
use crate::orm::{village_decisions, village_regulations};
use crate::role::VillageScope;
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, Set};
use serde::Deserialize;
use validator::Validate;

/// Status given to records created without one.
pub const DEFAULT_STATUS: &str = "berlaku";

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn status_or_default(status: Option<String>) -> String {
    clean(status).unwrap_or_else(|| DEFAULT_STATUS.to_string())
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegulationForm {
    #[validate(length(min = 1, max = 100, message = "must not be empty"))]
    pub number: String,
    pub issued_on: NaiveDate,
    #[validate(length(max = 100))]
    pub agreement_number: Option<String>,
    pub agreement_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub subject: String,
    #[validate(length(max = 32))]
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DecisionForm {
    #[validate(length(min = 1, max = 100, message = "must not be empty"))]
    pub number: String,
    pub issued_on: NaiveDate,
    #[validate(length(max = 100))]
    pub report_number: Option<String>,
    pub report_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub subject: String,
    #[validate(length(max = 32))]
    pub status: Option<String>,
    pub notes: Option<String>,
}

async fn log_change<C: ConnectionTrait>(
    db: &C,
    scope: &VillageScope,
    action: &str,
    number: &str,
    now: NaiveDateTime,
) {
    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        action,
        Some(number.to_string()),
        now,
    )
    .await;
}

pub async fn list_regulations<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Vec<village_regulations::Model>> {
    Ok(village_regulations::Entity::find()
        .filter(village_regulations::Column::VillageId.eq(village_id))
        .order_by_desc(village_regulations::Column::IssuedOn)
        .order_by_desc(village_regulations::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_regulation<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    id: i32,
) -> PortalResult<village_regulations::Model> {
    village_regulations::Entity::find_by_id(id)
        .filter(village_regulations::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Regulation"))
}

pub async fn create_regulation(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: RegulationForm,
    now: NaiveDateTime,
) -> PortalResult<village_regulations::Model> {
    form.validate()?;
    let regulation = village_regulations::ActiveModel {
        village_id: Set(scope.village_id),
        number: Set(form.number.trim().to_string()),
        issued_on: Set(form.issued_on),
        agreement_number: Set(clean(form.agreement_number)),
        agreement_date: Set(form.agreement_date),
        subject: Set(form.subject.trim().to_string()),
        status: Set(status_or_default(form.status)),
        notes: Set(clean(form.notes)),
        created_by: Set(Some(scope.actor_id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log_change(db, scope, "Tambah peraturan desa", &regulation.number, now).await;
    Ok(regulation)
}

pub async fn update_regulation(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: RegulationForm,
    now: NaiveDateTime,
) -> PortalResult<village_regulations::Model> {
    form.validate()?;
    let mut active: village_regulations::ActiveModel =
        get_regulation(db, scope.village_id, id).await?.into();
    active.number = Set(form.number.trim().to_string());
    active.issued_on = Set(form.issued_on);
    active.agreement_number = Set(clean(form.agreement_number));
    active.agreement_date = Set(form.agreement_date);
    active.subject = Set(form.subject.trim().to_string());
    active.status = Set(status_or_default(form.status));
    active.notes = Set(clean(form.notes));
    active.updated_at = Set(now);
    let regulation = active.update(db).await?;

    log_change(db, scope, "Ubah peraturan desa", &regulation.number, now).await;
    Ok(regulation)
}

pub async fn delete_regulation(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let regulation = get_regulation(db, scope.village_id, id).await?;
    village_regulations::Entity::delete_by_id(regulation.id)
        .exec(db)
        .await?;

    log_change(db, scope, "Hapus peraturan desa", &regulation.number, now).await;
    Ok(())
}

pub async fn list_decisions<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Vec<village_decisions::Model>> {
    Ok(village_decisions::Entity::find()
        .filter(village_decisions::Column::VillageId.eq(village_id))
        .order_by_desc(village_decisions::Column::IssuedOn)
        .order_by_desc(village_decisions::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_decision<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    id: i32,
) -> PortalResult<village_decisions::Model> {
    village_decisions::Entity::find_by_id(id)
        .filter(village_decisions::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Decision"))
}

pub async fn create_decision(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: DecisionForm,
    now: NaiveDateTime,
) -> PortalResult<village_decisions::Model> {
    form.validate()?;
    let decision = village_decisions::ActiveModel {
        village_id: Set(scope.village_id),
        number: Set(form.number.trim().to_string()),
        issued_on: Set(form.issued_on),
        report_number: Set(clean(form.report_number)),
        report_date: Set(form.report_date),
        subject: Set(form.subject.trim().to_string()),
        status: Set(status_or_default(form.status)),
        notes: Set(clean(form.notes)),
        created_by: Set(Some(scope.actor_id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log_change(db, scope, "Tambah keputusan desa", &decision.number, now).await;
    Ok(decision)
}

pub async fn update_decision(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: DecisionForm,
    now: NaiveDateTime,
) -> PortalResult<village_decisions::Model> {
    form.validate()?;
    let mut active: village_decisions::ActiveModel =
        get_decision(db, scope.village_id, id).await?.into();
    active.number = Set(form.number.trim().to_string());
    active.issued_on = Set(form.issued_on);
    active.report_number = Set(clean(form.report_number));
    active.report_date = Set(form.report_date);
    active.subject = Set(form.subject.trim().to_string());
    active.status = Set(status_or_default(form.status));
    active.notes = Set(clean(form.notes));
    active.updated_at = Set(now);
    let decision = active.update(db).await?;

    log_change(db, scope, "Ubah keputusan desa", &decision.number, now).await;
    Ok(decision)
}

pub async fn delete_decision(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let decision = get_decision(db, scope.village_id, id).await?;
    village_decisions::Entity::delete_by_id(decision.id)
        .exec(db)
        .await?;

    log_change(db, scope, "Hapus keputusan desa", &decision.number, now).await;
    Ok(())
}
