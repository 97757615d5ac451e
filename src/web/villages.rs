//! Village registry, super admin only.

use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::orm::villages::VillageStatus;
use crate::role::Capability;
use crate::village::{self, VillageForm};
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_villages)
        .service(create_village)
        .service(view_village)
        .service(update_village)
        .service(update_village_status)
        .service(delete_village);
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: VillageStatus,
}

/// Staff user id of a caller allowed to manage villages.
fn village_manager(client: &ClientCtx) -> Result<i32, PortalError> {
    client
        .require(Capability::ManageVillages)?
        .user_id()
        .ok_or(PortalError::Forbidden)
}

#[get("/api/villages")]
async fn list_villages(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    village_manager(&client)?;
    Ok(HttpResponse::Ok().json(village::list_villages(&db).await?))
}

#[post("/api/villages")]
async fn create_village(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<VillageForm>,
) -> Result<HttpResponse, PortalError> {
    let actor_id = village_manager(&client)?;
    let village = village::create_village(&db, form.into_inner(), actor_id, super::now()).await?;
    Ok(HttpResponse::Created().json(village))
}

#[get("/api/villages/{id}")]
async fn view_village(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    village_manager(&client)?;
    Ok(HttpResponse::Ok().json(village::get_village(db.get_ref(), path.into_inner()).await?))
}

#[put("/api/villages/{id}")]
async fn update_village(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<VillageForm>,
) -> Result<HttpResponse, PortalError> {
    let actor_id = village_manager(&client)?;
    let village = village::update_village(
        &db,
        path.into_inner(),
        form.into_inner(),
        actor_id,
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(village))
}

#[put("/api/villages/{id}/status")]
async fn update_village_status(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<StatusForm>,
) -> Result<HttpResponse, PortalError> {
    let actor_id = village_manager(&client)?;
    let village =
        village::set_village_status(&db, path.into_inner(), form.status, actor_id, super::now())
            .await?;
    Ok(HttpResponse::Ok().json(village))
}

#[delete("/api/villages/{id}")]
async fn delete_village(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let actor_id = village_manager(&client)?;
    village::delete_village(&db, path.into_inner(), actor_id, super::now()).await?;
    Ok(super::ack("Village deleted"))
}
