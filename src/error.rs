//! Domain error shared by every portal operation.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use sea_orm::DbErr;
use serde::Serialize;

pub type PortalResult<T> = Result<T, PortalError>;

#[derive(Debug, Display)]
pub enum PortalError {
    /// Lookup returned nothing. Holds the kind of record.
    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),
    /// Shape, format or length check failed.
    #[display(fmt = "{}", _0)]
    Validation(String),
    /// A lifecycle transition that is not allowed from the current state.
    #[display(fmt = "{}", _0)]
    InvalidTransition(String),
    /// Uniqueness clash or lost race.
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Invalid credentials")]
    InvalidCredentials,
    #[display(fmt = "Login required")]
    Unauthorized,
    #[display(fmt = "Insufficient permissions")]
    Forbidden,
    /// CSV import rejected or interrupted; the message is user facing.
    #[display(fmt = "{}", _0)]
    Import(String),
    #[display(fmt = "Database error")]
    Backend(DbErr),
}

impl std::error::Error for PortalError {}

impl From<DbErr> for PortalError {
    fn from(e: DbErr) -> Self {
        PortalError::Backend(e)
    }
}

impl PortalError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        PortalError::Validation(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        PortalError::Conflict(msg.into())
    }
}

impl From<validator::ValidationErrors> for PortalError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "invalid value".to_string());
                format!("{}: {}", field, detail)
            })
            .collect();
        fields.sort();
        PortalError::Validation(fields.join("; "))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Validation(_) | PortalError::Import(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PortalError::InvalidTransition(_) | PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::InvalidCredentials | PortalError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            PortalError::Forbidden => StatusCode::FORBIDDEN,
            PortalError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let PortalError::Backend(e) = self {
            log::error!("database error: {}", e);
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            message: self.to_string(),
        })
    }
}
