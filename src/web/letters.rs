use crate::constants::LETTER_TYPES;
use crate::error::PortalError;
use crate::letter::{self, LetterFilter, PrintableLetter};
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::role::Capability;
use actix_web::{get, post, web, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_letter_types)
        .service(list_letters)
        .service(view_letter)
        .service(approve_letter)
        .service(reject_letter)
        .service(print_letter);
}

#[derive(Deserialize)]
pub struct RejectForm {
    reason: String,
}

#[derive(Template)]
#[template(path = "letter.html")]
pub struct LetterTemplate {
    pub letter_type: String,
    pub letter_number: String,
    pub village_name: String,
    pub village_region: String,
    pub citizen_name: String,
    pub citizen_nik: String,
    pub citizen_birth_date: String,
    pub citizen_address: String,
    pub purpose: String,
    pub issued_on: String,
    pub approver_name: String,
}

impl From<PrintableLetter> for LetterTemplate {
    fn from(letter: PrintableLetter) -> Self {
        let village = letter.village;
        Self {
            letter_type: letter.request.letter_type,
            letter_number: letter.request.letter_number.unwrap_or_default(),
            village_region: format!(
                "Kecamatan {}, Kabupaten {}, Provinsi {}",
                village.kecamatan, village.kabupaten, village.provinsi
            ),
            village_name: village.name,
            citizen_name: letter.citizen.nama,
            citizen_nik: letter.citizen.nik,
            citizen_birth_date: letter.citizen.tanggal_lahir,
            citizen_address: letter.citizen.alamat,
            purpose: letter.request.purpose,
            issued_on: letter
                .request
                .approved_at
                .map(|at| at.format("%d-%m-%Y").to_string())
                .unwrap_or_default(),
            approver_name: letter
                .approver_name
                .unwrap_or_else(|| "Kepala Desa".to_string()),
        }
    }
}

/// Suggested letter types for the request form.
#[get("/api/letter-types")]
async fn view_letter_types() -> HttpResponse {
    HttpResponse::Ok().json(LETTER_TYPES)
}

#[get("/api/letters")]
async fn list_letters(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    filter: web::Query<LetterFilter>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ProcessLetters)?;
    let letters = letter::list_requests(db.get_ref(), scope.village_id, &filter).await?;
    Ok(HttpResponse::Ok().json(letters))
}

#[get("/api/letters/{id}")]
async fn view_letter(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ProcessLetters)?;
    let letter = letter::get_request(db.get_ref(), scope.village_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(letter))
}

#[post("/api/letters/{id}/approve")]
async fn approve_letter(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ProcessLetters)?;
    let request = letter::approve_request(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(HttpResponse::Ok().json(request))
}

#[post("/api/letters/{id}/reject")]
async fn reject_letter(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<RejectForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ProcessLetters)?;
    let request =
        letter::reject_request(&db, &scope, path.into_inner(), &form.reason, super::now())
            .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Printable HTML of an approved letter.
#[get("/letters/{id}/print")]
async fn print_letter(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, PortalError> {
    let principal = client.require_login()?;
    let letter = letter::printable_letter(&db, principal, path.into_inner()).await?;
    Ok(LetterTemplate::from(letter).to_response())
}
