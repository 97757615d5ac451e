//! Citizen self-service.

use crate::citizen;
use crate::error::PortalError;
use crate::letter::{self, LetterRequestForm};
use crate::middleware::{ClientCtx, CsrfGuard};
use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_me)
        .service(list_my_letters)
        .service(create_my_letter);
}

#[get("/api/me")]
async fn view_me(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let citizen_id = client.citizen_id()?;
    let village_id = client
        .principal()
        .and_then(|p| p.village_id())
        .ok_or(PortalError::Forbidden)?;
    let citizen = citizen::get_citizen(db.get_ref(), village_id, citizen_id).await?;
    Ok(HttpResponse::Ok().json(citizen))
}

#[get("/api/me/letters")]
async fn list_my_letters(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let citizen_id = client.citizen_id()?;
    let requests = letter::citizen_requests(db.get_ref(), citizen_id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[post("/api/me/letters")]
async fn create_my_letter(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<LetterRequestForm>,
) -> Result<HttpResponse, PortalError> {
    let citizen_id = client.citizen_id()?;
    let request = letter::create_request(&db, citizen_id, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(request))
}
