use crate::citizen::{self, CitizenForm, ImportSettings};
use crate::error::PortalError;
use crate::middleware::{ClientCtx, CsrfGuard};
use crate::role::Capability;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use futures::{Stream, StreamExt, TryStreamExt};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(import_citizens)
        .service(list_citizens)
        .service(create_citizen)
        .service(view_citizen)
        .service(update_citizen)
        .service(delete_citizen);
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[get("/api/citizens")]
async fn list_citizens(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    let citizens =
        citizen::list_citizens(db.get_ref(), scope.village_id, query.q.as_deref()).await?;
    Ok(HttpResponse::Ok().json(citizens))
}

#[post("/api/citizens")]
async fn create_citizen(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<CitizenForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    let citizen = citizen::create_citizen(&db, &scope, form.into_inner(), super::now()).await?;
    Ok(HttpResponse::Created().json(citizen))
}

#[get("/api/citizens/{id}")]
async fn view_citizen(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    let citizen = citizen::get_citizen(db.get_ref(), scope.village_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(citizen))
}

#[put("/api/citizens/{id}")]
async fn update_citizen(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<CitizenForm>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    let citizen = citizen::update_citizen(
        &db,
        &scope,
        path.into_inner(),
        form.into_inner(),
        super::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(citizen))
}

#[delete("/api/citizens/{id}")]
async fn delete_citizen(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    citizen::delete_citizen(&db, &scope, path.into_inner(), super::now()).await?;
    Ok(super::ack("Citizen deleted"))
}

/// Collects a byte stream, refusing anything over `limit` bytes.
async fn read_limited<S, B, E>(mut stream: S, limit: usize) -> Result<Vec<u8>, PortalError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| {
            log::error!("import_citizens: upload read error: {}", e);
            PortalError::Import("File could not be read".to_string())
        })?;
        if buf.len() + bytes.as_ref().len() > limit {
            return Err(PortalError::Import(format!(
                "File is larger than {} KB",
                limit / 1024
            )));
        }
        buf.extend_from_slice(bytes.as_ref());
    }
    Ok(buf)
}

/// Pulls the `file` part out of a multipart upload.
async fn read_multipart_file(mut fields: Multipart, limit: usize) -> Result<Vec<u8>, PortalError> {
    while let Some(field) = fields.try_next().await.map_err(|e| {
        log::error!("import_citizens: multipart error: {}", e);
        PortalError::Import("File could not be read".to_string())
    })? {
        let is_file = field.content_disposition().get_name() == Some("file");
        let bytes = read_limited(field, limit).await?;
        if is_file {
            return Ok(bytes);
        }
    }
    Err(PortalError::Import("No file was uploaded".to_string()))
}

/// Accepts either a multipart form with a `file` field or a raw `text/csv` body.
#[post("/api/citizens/import")]
async fn import_citizens(
    _csrf: CsrfGuard,
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ManageCitizens)?;
    let limit = crate::app_config::import().max_upload_kb * 1024;

    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let bytes = if is_multipart {
        read_multipart_file(Multipart::new(req.headers(), payload), limit).await?
    } else {
        read_limited(payload, limit).await?
    };

    let text = String::from_utf8(bytes)
        .map_err(|_| PortalError::Import("File must be UTF-8 text".to_string()))?;

    let outcome = citizen::import_csv(
        &db,
        &scope,
        &text,
        &ImportSettings::from_config(),
        super::now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(outcome))
}
