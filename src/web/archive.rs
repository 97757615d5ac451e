//! Village regulation and decision archives.

use crate::archive::{self, DecisionForm, RegulationForm};
use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::role::Capability;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_regulations)
        .service(create_regulation)
        .service(view_regulation)
        .service(update_regulation)
        .service(delete_regulation)
        .service(list_decisions)
        .service(create_decision)
        .service(view_decision)
        .service(update_decision)
        .service(delete_decision);
}

#[get("/api/regulations")]
async fn list_regulations(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    Ok(HttpResponse::Ok().json(archive::list_regulations(db.get_ref(), scope.village_id).await?))
}

#[post("/api/regulations")]
async fn create_regulation(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<RegulationForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::create_regulation(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(row))
}

#[get("/api/regulations/{id}")]
async fn view_regulation(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::get_regulation(db.get_ref(), scope.village_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[put("/api/regulations/{id}")]
async fn update_regulation(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<RegulationForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::update_regulation(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/api/regulations/{id}")]
async fn delete_regulation(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    archive::delete_regulation(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("Regulation deleted"))
}

#[get("/api/decisions")]
async fn list_decisions(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    Ok(HttpResponse::Ok().json(archive::list_decisions(db.get_ref(), scope.village_id).await?))
}

#[post("/api/decisions")]
async fn create_decision(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<DecisionForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::create_decision(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(row))
}

#[get("/api/decisions/{id}")]
async fn view_decision(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::get_decision(db.get_ref(), scope.village_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[put("/api/decisions/{id}")]
async fn update_decision(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<DecisionForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    let row = archive::update_decision(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/api/decisions/{id}")]
async fn delete_decision(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageArchives)?;
    archive::delete_decision(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("Decision deleted"))
}
