/// Integration tests for village website content, services and settings
mod common;
use serial_test::serial;

use common::*;
use portal_desa::error::PortalError;
use portal_desa::website::{self, ContentForm, NewsForm, ServiceForm, SettingsForm};

fn section(section: &str, title: &str, sort_order: i32, is_published: Option<bool>) -> ContentForm {
    ContentForm {
        section: section.to_string(),
        title: title.to_string(),
        body: format!("Isi {}", title),
        sort_order: Some(sort_order),
        is_published,
    }
}

fn service(name: &str, is_active: Option<bool>) -> ServiceForm {
    ServiceForm {
        name: name.to_string(),
        description: format!("Layanan {}", name),
        requirements: Some("  ".to_string()),
        is_active,
    }
}

fn settings(site_title: &str, email: Option<&str>) -> SettingsForm {
    SettingsForm {
        site_title: site_title.to_string(),
        tagline: Some("Gotong royong".to_string()),
        about: None,
        vision: None,
        mission: None,
        address: Some("Jl. Raya Desa 1".to_string()),
        phone: None,
        email: email.map(str::to_string),
        logo_url: None,
    }
}

#[actix_rt::test]
#[serial]
async fn test_page_sections_follow_publish_flag_and_order() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "PGS", "32010101019000").await.unwrap();
    let other = create_populated_village(&db, "PGX", "32020202029000").await.unwrap();
    let scope = scope_of(&v.admin);

    let profile = website::create_content(&db, &scope, section(" Profil ", "Sejarah desa", 2, None), at(2024, 6, 1))
        .await
        .expect("create section");
    assert_eq!(profile.section, "profil");
    assert!(profile.is_published);

    let draft = website::create_content(&db, &scope, section("profil", "Peta desa", 1, Some(false)), at(2024, 6, 1))
        .await
        .expect("create draft");

    let site = website::public_site(&db, v.village.id).await.unwrap();
    let titles: Vec<&str> = site.contents.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Sejarah desa"]);

    // Publishing keeps the sort order when none is given.
    let mut form = section("profil", "Peta wilayah", 0, Some(true));
    form.sort_order = None;
    let published = website::update_content(&db, &scope, draft.id, form, at(2024, 6, 2))
        .await
        .expect("publish draft");
    assert_eq!(published.sort_order, 1);

    let site = website::public_site(&db, v.village.id).await.unwrap();
    let titles: Vec<&str> = site.contents.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Peta wilayah", "Sejarah desa"]);

    assert!(matches!(
        website::update_content(&db, &scope_of(&other.admin), draft.id, section("x", "Diambil", 0, None), at(2024, 6, 3)).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        website::delete_content(&db, &scope_of(&other.admin), draft.id, at(2024, 6, 3)).await,
        Err(PortalError::NotFound(_))
    ));

    website::delete_content(&db, &scope, profile.id, at(2024, 6, 3))
        .await
        .expect("delete section");
    assert_eq!(website::list_contents(&db, v.village.id).await.unwrap().len(), 1);
    let site = website::public_site(&db, v.village.id).await.unwrap();
    assert_eq!(site.contents.len(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_inactive_services_are_hidden_from_the_public() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "LYN", "32010101019000").await.unwrap();
    let other = create_populated_village(&db, "LYX", "32020202029000").await.unwrap();
    let scope = scope_of(&v.admin);

    let ktp = website::create_service(&db, &scope, service("Pembuatan KTP", None), at(2024, 6, 1))
        .await
        .expect("create service");
    assert!(ktp.is_active);
    assert_eq!(ktp.requirements, None);
    website::create_service(&db, &scope, service("Akta Kelahiran", None), at(2024, 6, 1))
        .await
        .expect("create service");

    let site = website::public_site(&db, v.village.id).await.unwrap();
    let names: Vec<&str> = site.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Akta Kelahiran", "Pembuatan KTP"]);

    website::update_service(&db, &scope, ktp.id, service("Pembuatan KTP", Some(false)), at(2024, 6, 2))
        .await
        .expect("deactivate service");
    let site = website::public_site(&db, v.village.id).await.unwrap();
    let names: Vec<&str> = site.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Akta Kelahiran"]);
    // Staff still see it.
    assert_eq!(website::list_services(&db, v.village.id).await.unwrap().len(), 2);

    assert!(matches!(
        website::delete_service(&db, &scope_of(&other.admin), ktp.id, at(2024, 6, 3)).await,
        Err(PortalError::NotFound(_))
    ));
    website::delete_service(&db, &scope, ktp.id, at(2024, 6, 3))
        .await
        .expect("delete service");
    assert_eq!(website::list_services(&db, v.village.id).await.unwrap().len(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_settings_are_created_once_then_replaced() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "SET", "32010101019000").await.unwrap();
    let scope = scope_of(&v.admin);

    assert!(website::get_settings(&db, v.village.id).await.unwrap().is_none());

    let res = website::upsert_settings(&db, &scope, settings("Desa Set", Some("bukan-email")), at(2024, 6, 1)).await;
    assert!(matches!(res, Err(PortalError::Validation(_))));

    let first = website::upsert_settings(&db, &scope, settings("Website Desa Set", Some(" ")), at(2024, 6, 1))
        .await
        .expect("create settings");
    assert_eq!(first.village_id, v.village.id);
    assert_eq!(first.email, None);
    let site = website::public_site(&db, v.village.id).await.unwrap();
    assert_eq!(site.title(), "Website Desa Set");

    let second = website::upsert_settings(&db, &scope, settings("Portal Desa Set", Some("info@set.desa.id")), at(2024, 6, 2))
        .await
        .expect("replace settings");
    assert_eq!(second.email.as_deref(), Some("info@set.desa.id"));
    assert_eq!(second.updated_at, at(2024, 6, 2));
    let site = website::public_site(&db, v.village.id).await.unwrap();
    assert_eq!(site.title(), "Portal Desa Set");
}

#[actix_rt::test]
#[serial]
async fn test_withdrawn_news_leaves_the_public_site() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "BRT", "32010101019000").await.unwrap();
    let scope = scope_of(&v.admin);

    let news_form = |is_published: bool| NewsForm {
        title: "Penyaluran BLT".to_string(),
        summary: Some(" ".to_string()),
        body: "Di kantor desa.".to_string(),
        is_published,
    };

    let item = website::create_news(&db, &scope, news_form(true), at(2024, 6, 1))
        .await
        .unwrap();
    assert_eq!(item.published_at, Some(at(2024, 6, 1)));
    assert_eq!(item.summary, None);
    assert_eq!(website::public_site(&db, v.village.id).await.unwrap().news.len(), 1);

    let withdrawn = website::update_news(&db, &scope, item.id, news_form(false), at(2024, 6, 2))
        .await
        .unwrap();
    assert_eq!(withdrawn.published_at, None);
    assert!(website::public_site(&db, v.village.id).await.unwrap().news.is_empty());

    let again = website::update_news(&db, &scope, item.id, news_form(true), at(2024, 6, 3))
        .await
        .unwrap();
    assert_eq!(again.published_at, Some(at(2024, 6, 3)));

    website::delete_news(&db, &scope, item.id, at(2024, 6, 4)).await.unwrap();
    assert!(website::list_news(&db, v.village.id).await.unwrap().is_empty());
    assert!(website::public_site(&db, v.village.id).await.unwrap().news.is_empty());
}
