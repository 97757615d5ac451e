//! Villages: the tenant boundary for almost every record.
//!
//! Staff belong to a village through `users.village_id`, which is the only
//! relationship used to resolve the village a caller acts on.

use crate::activity::{self, Actor};
use crate::error::{PortalError, PortalResult};
use crate::orm::villages::VillageStatus;
use crate::orm::{
    citizens, letter_requests, letter_sequences, news, services, users, village_decisions,
    village_regulations, villages, website_contents, website_settings,
};
use crate::website::cache;
use chrono::NaiveDateTime;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, PaginatorTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct VillageForm {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "must be 1 to 32 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub kecamatan: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub kabupaten: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub provinsi: String,
    pub status: Option<VillageStatus>,
}

/// Village row plus its assigned admin, for the super admin overview.
#[derive(Clone, Debug, Serialize)]
pub struct VillageOverview {
    #[serde(flatten)]
    pub village: villages::Model,
    pub admin_username: Option<String>,
    pub citizen_count: u64,
}

async fn ensure_code_free(
    db: &DatabaseConnection,
    code: &str,
    except: Option<i32>,
) -> PortalResult<()> {
    let mut query = villages::Entity::find().filter(villages::Column::Code.eq(code));
    if let Some(id) = except {
        query = query.filter(villages::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(PortalError::conflict(format!(
            "Village code {} is already in use",
            code
        )));
    }
    Ok(())
}

pub async fn create_village(
    db: &DatabaseConnection,
    form: VillageForm,
    actor_id: i32,
    now: NaiveDateTime,
) -> PortalResult<villages::Model> {
    form.validate()?;
    let code = form.code.trim().to_string();
    ensure_code_free(db, &code, None).await?;

    let village = villages::ActiveModel {
        name: Set(form.name.trim().to_string()),
        code: Set(code),
        kecamatan: Set(form.kecamatan.trim().to_string()),
        kabupaten: Set(form.kabupaten.trim().to_string()),
        provinsi: Set(form.provinsi.trim().to_string()),
        status: Set(form.status.unwrap_or(VillageStatus::Active)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    activity::record(
        db,
        Actor::staff(actor_id, Some(village.id)),
        "Tambah desa",
        Some(village.name.clone()),
        now,
    )
    .await;

    Ok(village)
}

pub async fn get_village<C: ConnectionTrait>(db: &C, id: i32) -> PortalResult<villages::Model> {
    villages::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Village"))
}

pub async fn update_village(
    db: &DatabaseConnection,
    id: i32,
    form: VillageForm,
    actor_id: i32,
    now: NaiveDateTime,
) -> PortalResult<villages::Model> {
    form.validate()?;
    let village = get_village(db, id).await?;
    let code = form.code.trim().to_string();
    ensure_code_free(db, &code, Some(id)).await?;

    let status = form.status.unwrap_or(village.status);
    let mut active: villages::ActiveModel = village.into();
    active.name = Set(form.name.trim().to_string());
    active.code = Set(code);
    active.kecamatan = Set(form.kecamatan.trim().to_string());
    active.kabupaten = Set(form.kabupaten.trim().to_string());
    active.provinsi = Set(form.provinsi.trim().to_string());
    active.status = Set(status);
    active.updated_at = Set(now);
    let village = active.update(db).await?;
    cache::invalidate(village.id);

    activity::record(
        db,
        Actor::staff(actor_id, Some(village.id)),
        "Ubah desa",
        Some(village.name.clone()),
        now,
    )
    .await;

    Ok(village)
}

pub async fn set_village_status(
    db: &DatabaseConnection,
    id: i32,
    status: VillageStatus,
    actor_id: i32,
    now: NaiveDateTime,
) -> PortalResult<villages::Model> {
    let village = get_village(db, id).await?;
    let mut active: villages::ActiveModel = village.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    let village = active.update(db).await?;
    cache::invalidate(village.id);

    activity::record(
        db,
        Actor::staff(actor_id, Some(village.id)),
        "Ubah status desa",
        Some(format!("{} -> {:?}", village.name, status)),
        now,
    )
    .await;

    Ok(village)
}

/// Deletes a village that has no staff, citizens, letters or archived
/// documents left.
///
/// Its website pages, news, services, settings and letter counters go with
/// it. Activity log entries keep the old village id.
pub async fn delete_village(
    db: &DatabaseConnection,
    id: i32,
    actor_id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let village = get_village(db, id).await?;

    let (staff, residents, letters, regulations, decisions) = futures::try_join!(
        users::Entity::find()
            .filter(users::Column::VillageId.eq(id))
            .count(db),
        citizens::Entity::find()
            .filter(citizens::Column::VillageId.eq(id))
            .count(db),
        letter_requests::Entity::find()
            .filter(letter_requests::Column::VillageId.eq(id))
            .count(db),
        village_regulations::Entity::find()
            .filter(village_regulations::Column::VillageId.eq(id))
            .count(db),
        village_decisions::Entity::find()
            .filter(village_decisions::Column::VillageId.eq(id))
            .count(db),
    )?;

    if staff + residents + letters + regulations + decisions > 0 {
        return Err(PortalError::conflict(format!(
            "Village still has {} staff accounts, {} citizens, {} letter requests \
             and {} archived documents",
            staff,
            residents,
            letters,
            regulations + decisions
        )));
    }

    let txn = db.begin().await?;
    website_contents::Entity::delete_many()
        .filter(website_contents::Column::VillageId.eq(id))
        .exec(&txn)
        .await?;
    news::Entity::delete_many()
        .filter(news::Column::VillageId.eq(id))
        .exec(&txn)
        .await?;
    services::Entity::delete_many()
        .filter(services::Column::VillageId.eq(id))
        .exec(&txn)
        .await?;
    website_settings::Entity::delete_many()
        .filter(website_settings::Column::VillageId.eq(id))
        .exec(&txn)
        .await?;
    letter_sequences::Entity::delete_many()
        .filter(letter_sequences::Column::VillageId.eq(id))
        .exec(&txn)
        .await?;
    villages::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;
    cache::invalidate(id);

    activity::record(
        db,
        Actor::staff(actor_id, None),
        "Hapus desa",
        Some(village.name),
        now,
    )
    .await;

    Ok(())
}

pub async fn list_villages(db: &DatabaseConnection) -> PortalResult<Vec<VillageOverview>> {
    let villages = villages::Entity::find()
        .order_by_asc(villages::Column::Name)
        .all(db)
        .await?;

    let mut overview = Vec::with_capacity(villages.len());
    for village in villages {
        let (admin, citizen_count) = futures::try_join!(
            village_admin(db, village.id),
            citizens::Entity::find()
                .filter(citizens::Column::VillageId.eq(village.id))
                .count(db),
        )?;
        overview.push(VillageOverview {
            village,
            admin_username: admin.map(|a| a.username),
            citizen_count: citizen_count as u64,
        });
    }

    Ok(overview)
}

/// Villages shown on the public directory.
pub async fn active_villages(db: &DatabaseConnection) -> PortalResult<Vec<villages::Model>> {
    Ok(villages::Entity::find()
        .filter(villages::Column::Status.eq(VillageStatus::Active))
        .order_by_asc(villages::Column::Name)
        .all(db)
        .await?)
}

/// The village a staff account is assigned to.
pub async fn resolve_village_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> PortalResult<villages::Model> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("User"))?;
    let village_id = user.village_id.ok_or(PortalError::NotFound("Village"))?;
    get_village(db, village_id).await
}

/// The admin account of a village, if one is assigned.
pub async fn village_admin<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> Result<Option<users::Model>, sea_orm::DbErr> {
    users::Entity::find()
        .filter(users::Column::VillageId.eq(village_id))
        .filter(users::Column::Role.eq(users::StaffRole::AdminDesa))
        .one(db)
        .await
}
