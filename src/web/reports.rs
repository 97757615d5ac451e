//! Village reports and CSV exports

use crate::error::PortalError;
use crate::middleware::ClientCtx;
use crate::report::{self, export_filename, Dataset};
use crate::role::Capability;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Summary first so it is not captured as a dataset name.
    conf.service(view_summary)
        .service(view_dataset)
        .service(export_dataset);
}

fn dataset(name: &str) -> Result<Dataset, PortalError> {
    Dataset::parse(name).ok_or(PortalError::NotFound("Report"))
}

#[get("/api/reports/summary")]
async fn view_summary(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ViewReports)?;
    let summary = report::village_summary(db.get_ref(), scope.village_id, super::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/api/reports/{dataset}")]
async fn view_dataset(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ViewReports)?;
    let dataset = dataset(&path)?;
    let table = report::dataset_table(db.get_ref(), scope.village_id, dataset).await?;
    Ok(HttpResponse::Ok().json(table))
}

#[get("/api/reports/{dataset}/csv")]
async fn export_dataset(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, PortalError> {
    let scope = client.village_scope(Capability::ViewReports)?;
    let dataset = dataset(&path)?;

    let (village, table) = futures::try_join!(
        crate::village::get_village(db.get_ref(), scope.village_id),
        report::dataset_table(db.get_ref(), scope.village_id, dataset),
    )?;

    let filename = export_filename(
        dataset.purpose(),
        &village.name,
        super::now().date(),
        "csv",
    );
    log::debug!("Exporting {} rows as {}", table.len(), filename);

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(table.to_csv()))
}
