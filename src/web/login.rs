use crate::auth::{self, LockoutPolicy, LoginSession};
use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::role::Principal;
use crate::session;
use actix_session::Session;
use actix_web::{get, post, web, Error, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login)
        .service(post_citizen_login)
        .service(view_session)
        .service(post_logout);
}

#[derive(Deserialize)]
pub struct StaffLoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct CitizenLoginForm {
    nik: String,
    tanggal_lahir: String,
}

#[derive(Serialize)]
struct SessionResponse<'a> {
    logged_in: bool,
    csrf_token: &'a str,
    principal: Option<&'a Principal>,
    login: Option<LoginSession>,
}

fn begin_session(session: &Session, principal: &Principal) -> Result<HttpResponse, Error> {
    session::store_identity(session, principal)?;
    // The session was renewed; hand the client a token for its next writes.
    let csrf_token = crate::middleware::csrf::get_or_create_csrf_token(session)?;
    Ok(HttpResponse::Ok().json(SessionResponse {
        logged_in: true,
        csrf_token: &csrf_token,
        principal: Some(principal),
        login: Some(LoginSession::of(principal)),
    }))
}

/// Staff login. Exempt from CSRF, a fresh visitor has no token yet.
#[post("/api/login")]
async fn post_login(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
    form: web::Json<StaffLoginForm>,
) -> Result<HttpResponse, Error> {
    let principal = auth::staff_login(
        &db,
        &form.username,
        &form.password,
        &LockoutPolicy::from_config(),
        super::now(),
    )
    .await?;

    begin_session(&cookies, &principal)
}

#[post("/api/citizen/login")]
async fn post_citizen_login(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
    form: web::Json<CitizenLoginForm>,
) -> Result<HttpResponse, Error> {
    let principal =
        auth::citizen_login(&db, &form.nik, &form.tanggal_lahir, super::now()).await?;

    begin_session(&cookies, &principal)
}

#[get("/api/session")]
async fn view_session(client: ClientCtx) -> HttpResponse {
    let principal = client.principal();
    HttpResponse::Ok().json(SessionResponse {
        logged_in: principal.is_some(),
        csrf_token: client.get_csrf_token(),
        principal,
        login: principal.map(LoginSession::of),
    })
}

#[post("/api/logout")]
async fn post_logout(
    _csrf: CsrfGuard,
    client: ClientCtx,
    cookies: Session,
) -> Result<HttpResponse, PortalError> {
    if let Some(principal) = client.principal() {
        log::info!("Logout: {}", principal.display_name());
    }
    session::clear(&cookies);
    Ok(super::ack("Logged out"))
}
