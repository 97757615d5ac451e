//! Public, unauthenticated views of active villages.

use crate::error::PortalError;
use crate::orm::website_settings;
use crate::village;
use crate::website::{self, PublicSite};
use actix_web::{get, web, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_public_villages)
        .service(view_public_village)
        .service(view_village_home);
}

pub struct SectionItem {
    pub title: String,
    pub body: String,
}

pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub published_on: String,
}

pub struct ServiceItem {
    pub name: String,
    pub description: String,
    pub requirements: String,
}

#[derive(Template)]
#[template(path = "village_home.html")]
pub struct VillageHomeTemplate {
    pub title: String,
    pub tagline: String,
    pub region: String,
    pub about: String,
    pub vision: String,
    pub mission: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub sections: Vec<SectionItem>,
    pub news: Vec<NewsItem>,
    pub services: Vec<ServiceItem>,
}

/// A settings field, empty when the village has no settings yet.
fn setting(site: &PublicSite, pick: impl Fn(&website_settings::Model) -> Option<String>) -> String {
    site.settings.as_ref().and_then(pick).unwrap_or_default()
}

impl From<&PublicSite> for VillageHomeTemplate {
    fn from(site: &PublicSite) -> Self {
        Self {
            title: site.title(),
            tagline: setting(site, |s| s.tagline.clone()),
            region: format!(
                "Kecamatan {}, Kabupaten {}, Provinsi {}",
                site.village.kecamatan, site.village.kabupaten, site.village.provinsi
            ),
            about: setting(site, |s| s.about.clone()),
            vision: setting(site, |s| s.vision.clone()),
            mission: setting(site, |s| s.mission.clone()),
            address: setting(site, |s| s.address.clone()),
            phone: setting(site, |s| s.phone.clone()),
            email: setting(site, |s| s.email.clone()),
            sections: site
                .contents
                .iter()
                .map(|c| SectionItem {
                    title: c.title.clone(),
                    body: c.body.clone(),
                })
                .collect(),
            news: site
                .news
                .iter()
                .map(|n| NewsItem {
                    title: n.title.clone(),
                    summary: n.summary.clone().unwrap_or_default(),
                    published_on: n
                        .published_at
                        .map(|at| at.format("%d-%m-%Y").to_string())
                        .unwrap_or_default(),
                })
                .collect(),
            services: site
                .services
                .iter()
                .map(|s| ServiceItem {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    requirements: s.requirements.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[get("/api/public/villages")]
async fn list_public_villages(
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, PortalError> {
    Ok(HttpResponse::Ok().json(village::active_villages(&db).await?))
}

#[get("/api/public/villages/{id}")]
async fn view_public_village(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, PortalError> {
    let site = website::public_site(&db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(site.as_ref()))
}

#[get("/desa/{id}")]
async fn view_village_home(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, PortalError> {
    let site = website::public_site(&db, path.into_inner()).await?;
    Ok(VillageHomeTemplate::from(site.as_ref()).to_response())
}
