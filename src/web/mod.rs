pub mod account;
pub mod activity;
pub mod archive;
pub mod citizens;
pub mod dashboard;
pub mod letters;
pub mod login;
pub mod me;
pub mod public;
pub mod reports;
pub mod villages;
pub mod website;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    public::configure(conf);
    login::configure(conf);
    dashboard::configure(conf);
    me::configure(conf);
    villages::configure(conf);
    account::configure(conf);
    citizens::configure(conf);
    letters::configure(conf);
    archive::configure(conf);
    reports::configure(conf);
    website::configure(conf);
    activity::configure(conf);
}

/// Current time as stored in the database.
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Plain acknowledgement for writes without a payload.
#[derive(Serialize)]
pub(crate) struct Ack {
    pub success: bool,
    pub message: String,
}

pub(crate) fn ack<S: Into<String>>(message: S) -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(Ack {
        success: true,
        message: message.into(),
    })
}
