use crate::account::{self, AccountManager, NewAccountForm, PasswordForm, UpdateAccountForm};
use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::orm::users::AccountStatus;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(change_own_password)
        .service(list_accounts)
        .service(create_account)
        .service(view_account)
        .service(update_account)
        .service(update_account_status)
        .service(reset_account_password)
        .service(delete_account);
}

#[derive(Deserialize)]
pub struct StatusForm {
    status: AccountStatus,
}

#[derive(Deserialize)]
pub struct OwnPasswordForm {
    current_password: String,
    new_password: String,
}

fn manager(client: &ClientCtx) -> Result<AccountManager, PortalError> {
    AccountManager::from_principal(client.require_login()?)
}

#[get("/api/accounts")]
async fn list_accounts(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    Ok(HttpResponse::Ok().json(account::list_accounts(&db, &manager).await?))
}

#[post("/api/accounts")]
async fn create_account(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<NewAccountForm>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    let account = account::create_account(&db, &manager, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(account))
}

#[get("/api/accounts/{id}")]
async fn view_account(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    Ok(HttpResponse::Ok().json(account::get_account(&db, &manager, path.into_inner()).await?))
}

#[put("/api/accounts/{id}")]
async fn update_account(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<UpdateAccountForm>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    let account = account::update_account(
        &db,
        &manager,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(account))
}

#[put("/api/accounts/{id}/status")]
async fn update_account_status(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<StatusForm>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    let account = account::set_account_status(
        &db,
        &manager,
        path.into_inner(),
        form.status,
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(account))
}

#[post("/api/accounts/{id}/reset-password")]
async fn reset_account_password(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<PasswordForm>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    account::reset_password(
        &db,
        &manager,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(super::ack("Password reset"))
}

#[delete("/api/accounts/{id}")]
async fn delete_account(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let manager = manager(&client)?;
    account::delete_account(&db, &manager, path.into_inner(), super::now()).await?;
    Ok(super::ack("Account deleted"))
}

/// Any staff member may change their own password.
#[post("/api/account/password")]
async fn change_own_password(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<OwnPasswordForm>,
) -> Result<HttpResponse, PortalError> {
    let user_id = client
        .require_login()?
        .user_id()
        .ok_or(PortalError::Forbidden)?;
    let form = form.into_inner();

    account::change_own_password(
        &db,
        user_id,
        &form.current_password,
        PasswordForm {
            new_password: form.new_password,
        },
        super::now(),
    )
    .await?;
    Ok(super::ack("Password changed"))
}
