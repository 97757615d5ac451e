//! Village website editing for the village admin.

use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::role::Capability;
use crate::website::{self, ContentForm, NewsForm, ServiceForm, SettingsForm};
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_contents)
        .service(create_content)
        .service(update_content)
        .service(delete_content)
        .service(list_news)
        .service(create_news)
        .service(update_news)
        .service(delete_news)
        .service(list_services)
        .service(create_service)
        .service(update_service)
        .service(delete_service)
        .service(view_settings)
        .service(update_settings);
}

#[get("/api/website/contents")]
async fn list_contents(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    Ok(HttpResponse::Ok().json(website::list_contents(db.get_ref(), scope.village_id).await?))
}

#[post("/api/website/contents")]
async fn create_content(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ContentForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let content = website::create_content(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(content))
}

#[put("/api/website/contents/{id}")]
async fn update_content(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<ContentForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let content = website::update_content(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(content))
}

#[delete("/api/website/contents/{id}")]
async fn delete_content(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    website::delete_content(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("Content deleted"))
}

#[get("/api/website/news")]
async fn list_news(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    Ok(HttpResponse::Ok().json(website::list_news(db.get_ref(), scope.village_id).await?))
}

#[post("/api/website/news")]
async fn create_news(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<NewsForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let news = website::create_news(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(news))
}

#[put("/api/website/news/{id}")]
async fn update_news(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<NewsForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let news = website::update_news(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(news))
}

#[delete("/api/website/news/{id}")]
async fn delete_news(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    website::delete_news(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("News deleted"))
}

#[get("/api/website/services")]
async fn list_services(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    Ok(HttpResponse::Ok().json(website::list_services(db.get_ref(), scope.village_id).await?))
}

#[post("/api/website/services")]
async fn create_service(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let service = website::create_service(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(service))
}

#[put("/api/website/services/{id}")]
async fn update_service(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<ServiceForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let service = website::update_service(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(service))
}

#[delete("/api/website/services/{id}")]
async fn delete_service(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    website::delete_service(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("Service deleted"))
}

#[get("/api/website/settings")]
async fn view_settings(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    Ok(HttpResponse::Ok().json(website::get_settings(db.get_ref(), scope.village_id).await?))
}

#[put("/api/website/settings")]
async fn update_settings(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<SettingsForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageWebsite)?;
    let settings = website::upsert_settings(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Ok().json(settings))
}
