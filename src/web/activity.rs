use crate::activity;
use crate::error::PortalError;
use crate::middleware::ClientCtx;
use crate::role::{Capability, Role};
use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_activity);
}

/// Latest activity. The super admin sees every village, a village admin only their own.
#[get("/api/activity")]
async fn view_activity(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    let principal = client.require(Capability::ViewActivityLog)?;
    let village_id = match principal.role() {
        Role::SuperAdmin => None,
        _ => Some(
            principal
                .village_scope(Capability::ViewActivityLog)?
                .village_id,
        ),
    };

    let entries = activity::recent(db.get_ref(), village_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}
