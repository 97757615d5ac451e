//! Village website content: page sections, news, services and settings.
//!
//! Staff edit the content of their own village. The public side reads a
//! cached [`PublicSite`] that every write below invalidates.

pub mod cache;

use crate::activity::{self, Actor};
use crate::error::{PortalError, PortalResult};
use crate::orm::villages::VillageStatus;
use crate::orm::{news, services, villages, website_contents, website_settings};
use crate::role::VillageScope;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn after_write(
    db: &DatabaseConnection,
    scope: &VillageScope,
    action: &str,
    details: String,
    now: NaiveDateTime,
) {
    cache::invalidate(scope.village_id);
    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        action,
        Some(details),
        now,
    )
    .await;
}

// Page sections

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ContentForm {
    #[validate(length(min = 1, max = 64, message = "must not be empty"))]
    pub section: String,
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: String,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

pub async fn list_contents<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Vec<website_contents::Model>> {
    Ok(website_contents::Entity::find()
        .filter(website_contents::Column::VillageId.eq(village_id))
        .order_by_asc(website_contents::Column::SortOrder)
        .order_by_asc(website_contents::Column::Id)
        .all(db)
        .await?)
}

async fn get_content(
    db: &DatabaseConnection,
    village_id: i32,
    id: i32,
) -> PortalResult<website_contents::Model> {
    website_contents::Entity::find_by_id(id)
        .filter(website_contents::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Content"))
}

pub async fn create_content(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: ContentForm,
    now: NaiveDateTime,
) -> PortalResult<website_contents::Model> {
    form.validate()?;
    let content = website_contents::ActiveModel {
        village_id: Set(scope.village_id),
        section: Set(form.section.trim().to_lowercase()),
        title: Set(form.title.trim().to_string()),
        body: Set(form.body),
        sort_order: Set(form.sort_order.unwrap_or(0)),
        is_published: Set(form.is_published.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    after_write(db, scope, "Tambah konten website", content.title.clone(), now).await;
    Ok(content)
}

pub async fn update_content(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: ContentForm,
    now: NaiveDateTime,
) -> PortalResult<website_contents::Model> {
    form.validate()?;
    let existing = get_content(db, scope.village_id, id).await?;
    let is_published = form.is_published.unwrap_or(existing.is_published);
    let sort_order = form.sort_order.unwrap_or(existing.sort_order);

    let mut active: website_contents::ActiveModel = existing.into();
    active.section = Set(form.section.trim().to_lowercase());
    active.title = Set(form.title.trim().to_string());
    active.body = Set(form.body);
    active.sort_order = Set(sort_order);
    active.is_published = Set(is_published);
    active.updated_at = Set(now);
    let content = active.update(db).await?;

    after_write(db, scope, "Ubah konten website", content.title.clone(), now).await;
    Ok(content)
}

pub async fn delete_content(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let content = get_content(db, scope.village_id, id).await?;
    website_contents::Entity::delete_by_id(content.id)
        .exec(db)
        .await?;
    after_write(db, scope, "Hapus konten website", content.title, now).await;
    Ok(())
}

// News

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewsForm {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub title: String,
    #[validate(length(max = 500))]
    pub summary: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub body: String,
    #[serde(default)]
    pub is_published: bool,
}

/// `published_at` after a publish toggle: set on first publish, kept while
/// published, cleared when withdrawn.
fn published_at(
    was: Option<NaiveDateTime>,
    is_published: bool,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    match (is_published, was) {
        (true, Some(at)) => Some(at),
        (true, None) => Some(now),
        (false, _) => None,
    }
}

pub async fn list_news<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Vec<news::Model>> {
    Ok(news::Entity::find()
        .filter(news::Column::VillageId.eq(village_id))
        .order_by_desc(news::Column::CreatedAt)
        .order_by_desc(news::Column::Id)
        .all(db)
        .await?)
}

async fn get_news(db: &DatabaseConnection, village_id: i32, id: i32) -> PortalResult<news::Model> {
    news::Entity::find_by_id(id)
        .filter(news::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("News"))
}

pub async fn create_news(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: NewsForm,
    now: NaiveDateTime,
) -> PortalResult<news::Model> {
    form.validate()?;
    let item = news::ActiveModel {
        village_id: Set(scope.village_id),
        title: Set(form.title.trim().to_string()),
        summary: Set(clean(form.summary)),
        body: Set(form.body),
        author_id: Set(Some(scope.actor_id)),
        is_published: Set(form.is_published),
        published_at: Set(published_at(None, form.is_published, now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    after_write(db, scope, "Tambah berita", item.title.clone(), now).await;
    Ok(item)
}

pub async fn update_news(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: NewsForm,
    now: NaiveDateTime,
) -> PortalResult<news::Model> {
    form.validate()?;
    let existing = get_news(db, scope.village_id, id).await?;
    let when = published_at(existing.published_at, form.is_published, now);

    let mut active: news::ActiveModel = existing.into();
    active.title = Set(form.title.trim().to_string());
    active.summary = Set(clean(form.summary));
    active.body = Set(form.body);
    active.is_published = Set(form.is_published);
    active.published_at = Set(when);
    active.updated_at = Set(now);
    let item = active.update(db).await?;

    after_write(db, scope, "Ubah berita", item.title.clone(), now).await;
    Ok(item)
}

pub async fn delete_news(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let item = get_news(db, scope.village_id, id).await?;
    news::Entity::delete_by_id(item.id).exec(db).await?;
    after_write(db, scope, "Hapus berita", item.title, now).await;
    Ok(())
}

// Services

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ServiceForm {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub description: String,
    pub requirements: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn list_services<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Vec<services::Model>> {
    Ok(services::Entity::find()
        .filter(services::Column::VillageId.eq(village_id))
        .order_by_asc(services::Column::Name)
        .all(db)
        .await?)
}

async fn get_service(
    db: &DatabaseConnection,
    village_id: i32,
    id: i32,
) -> PortalResult<services::Model> {
    services::Entity::find_by_id(id)
        .filter(services::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Service"))
}

pub async fn create_service(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: ServiceForm,
    now: NaiveDateTime,
) -> PortalResult<services::Model> {
    form.validate()?;
    let service = services::ActiveModel {
        village_id: Set(scope.village_id),
        name: Set(form.name.trim().to_string()),
        description: Set(form.description),
        requirements: Set(clean(form.requirements)),
        is_active: Set(form.is_active.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    after_write(db, scope, "Tambah layanan", service.name.clone(), now).await;
    Ok(service)
}

pub async fn update_service(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    form: ServiceForm,
    now: NaiveDateTime,
) -> PortalResult<services::Model> {
    form.validate()?;
    let existing = get_service(db, scope.village_id, id).await?;
    let is_active = form.is_active.unwrap_or(existing.is_active);

    let mut active: services::ActiveModel = existing.into();
    active.name = Set(form.name.trim().to_string());
    active.description = Set(form.description);
    active.requirements = Set(clean(form.requirements));
    active.is_active = Set(is_active);
    active.updated_at = Set(now);
    let service = active.update(db).await?;

    after_write(db, scope, "Ubah layanan", service.name.clone(), now).await;
    Ok(service)
}

pub async fn delete_service(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<()> {
    let service = get_service(db, scope.village_id, id).await?;
    services::Entity::delete_by_id(service.id).exec(db).await?;
    after_write(db, scope, "Hapus layanan", service.name, now).await;
    Ok(())
}

// Settings

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct SettingsForm {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub site_title: String,
    pub tagline: Option<String>,
    pub about: Option<String>,
    pub vision: Option<String>,
    pub mission: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub logo_url: Option<String>,
}

impl SettingsForm {
    fn normalized(self) -> Self {
        Self {
            site_title: self.site_title.trim().to_string(),
            tagline: clean(self.tagline),
            about: clean(self.about),
            vision: clean(self.vision),
            mission: clean(self.mission),
            address: clean(self.address),
            phone: clean(self.phone),
            email: clean(self.email),
            logo_url: clean(self.logo_url),
        }
    }
}

pub async fn get_settings<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
) -> PortalResult<Option<website_settings::Model>> {
    Ok(website_settings::Entity::find_by_id(village_id)
        .one(db)
        .await?)
}

/// Creates or replaces the settings row of the scope's village.
pub async fn upsert_settings(
    db: &DatabaseConnection,
    scope: &VillageScope,
    form: SettingsForm,
    now: NaiveDateTime,
) -> PortalResult<website_settings::Model> {
    let form = form.normalized();
    form.validate()?;

    let existing = get_settings(db, scope.village_id).await?;
    let is_new = existing.is_none();
    let mut active: website_settings::ActiveModel = match existing {
        Some(row) => row.into(),
        None => website_settings::ActiveModel {
            village_id: Set(scope.village_id),
            ..Default::default()
        },
    };
    active.site_title = Set(form.site_title);
    active.tagline = Set(form.tagline);
    active.about = Set(form.about);
    active.vision = Set(form.vision);
    active.mission = Set(form.mission);
    active.address = Set(form.address);
    active.phone = Set(form.phone);
    active.email = Set(form.email);
    active.logo_url = Set(form.logo_url);
    active.updated_at = Set(now);

    let settings = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };

    after_write(
        db,
        scope,
        "Ubah pengaturan website",
        settings.site_title.clone(),
        now,
    )
    .await;
    Ok(settings)
}

// Public read side

/// Everything the public home page of a village shows.
#[derive(Clone, Debug, Serialize)]
pub struct PublicSite {
    pub village: villages::Model,
    pub settings: Option<website_settings::Model>,
    pub contents: Vec<website_contents::Model>,
    pub news: Vec<news::Model>,
    pub services: Vec<services::Model>,
}

impl PublicSite {
    /// Site title, falling back to the village name.
    pub fn title(&self) -> String {
        self.settings
            .as_ref()
            .map(|s| s.site_title.clone())
            .unwrap_or_else(|| format!("Desa {}", self.village.name))
    }
}

async fn load_public_site(db: &DatabaseConnection, village_id: i32) -> PortalResult<PublicSite> {
    let village = villages::Entity::find_by_id(village_id)
        .filter(villages::Column::Status.eq(VillageStatus::Active))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Village"))?;

    let news_limit = crate::app_config::website().news_on_home;
    let (settings, contents, news, services) = futures::try_join!(
        website_settings::Entity::find_by_id(village_id).one(db),
        website_contents::Entity::find()
            .filter(website_contents::Column::VillageId.eq(village_id))
            .filter(website_contents::Column::IsPublished.eq(true))
            .order_by_asc(website_contents::Column::SortOrder)
            .order_by_asc(website_contents::Column::Id)
            .all(db),
        news::Entity::find()
            .filter(news::Column::VillageId.eq(village_id))
            .filter(news::Column::IsPublished.eq(true))
            .order_by_desc(news::Column::PublishedAt)
            .order_by_desc(news::Column::Id)
            .limit(news_limit)
            .all(db),
        services::Entity::find()
            .filter(services::Column::VillageId.eq(village_id))
            .filter(services::Column::IsActive.eq(true))
            .order_by_asc(services::Column::Name)
            .all(db),
    )?;

    Ok(PublicSite {
        village,
        settings,
        contents,
        news,
        services,
    })
}

/// Public website of an active village, served from cache when fresh.
pub async fn public_site(db: &DatabaseConnection, village_id: i32) -> PortalResult<Arc<PublicSite>> {
    if let Some(site) = cache::get(village_id) {
        return Ok(site);
    }

    let site = Arc::new(load_public_site(db, village_id).await?);
    cache::insert(village_id, site.clone());
    Ok(site)
}
