use crate::dashboard::dashboard_for;
use crate::error::PortalError;
use crate::middleware::ClientCtx;
use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard);
}

#[get("/api/dashboard")]
async fn view_dashboard(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let principal = client.require_login()?;
    let dashboard = dashboard_for(&db, principal, super::now()).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}
