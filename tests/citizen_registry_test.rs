/// Integration tests for the citizen registry and its village scoping
mod common;
use serial_test::serial;

use common::*;
use portal_desa::citizen::{self, CitizenForm};
use portal_desa::error::PortalError;
use portal_desa::orm::letter_requests::{self, LetterStatus};
use sea_orm::{entity::*, query::*};

fn form(nik: &str, nama: &str) -> CitizenForm {
    CitizenForm {
        nik: nik.to_string(),
        no_kk: "3201010101900099".to_string(),
        nama: nama.to_string(),
        tanggal_lahir: "1985-07-30".to_string(),
        alamat: "Jl. Kenanga 5".to_string(),
        no_telepon: Some("081234567890".to_string()),
    }
}

#[actix_rt::test]
#[serial]
async fn test_create_citizen_enforces_sixteen_digits() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "CMP", "32010101019000")
        .await
        .expect("Failed to create village");
    let scope = scope_of(&v.admin);

    let short = citizen::create_citizen(&db, &scope, form("320101010190001", "Asep"), at(2024, 6, 1)).await;
    assert!(matches!(short, Err(PortalError::Validation(_))));

    let mut bad_kk = form("3201010101900055", "Asep");
    bad_kk.no_kk = "32010101019000AB".to_string();
    let res = citizen::create_citizen(&db, &scope, bad_kk, at(2024, 6, 1)).await;
    assert!(matches!(res, Err(PortalError::Validation(_))));

    let mut bad_date = form("3201010101900055", "Asep");
    bad_date.tanggal_lahir = "1985-02-30".to_string();
    let res = citizen::create_citizen(&db, &scope, bad_date, at(2024, 6, 1)).await;
    assert!(matches!(res, Err(PortalError::Validation(_))));

    let created = citizen::create_citizen(&db, &scope, form("3201010101900055", " Asep "), at(2024, 6, 1))
        .await
        .expect("valid citizen is accepted");
    assert_eq!(created.nama, "Asep");
    assert_eq!(created.village_id, v.village.id);
    assert_eq!(created.nik.len(), 16);
    assert_eq!(created.no_kk.len(), 16);
}

#[actix_rt::test]
#[serial]
async fn test_duplicate_nik_is_a_conflict_across_villages() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let a = create_populated_village(&db, "AAA", "32010101019000")
        .await
        .expect("Failed to create village A");
    let b = create_populated_village(&db, "BBB", "32020202029000")
        .await
        .expect("Failed to create village B");

    // NIK of a citizen registered in village A.
    let taken = a.citizens[0].nik.clone();
    let res = citizen::create_citizen(&db, &scope_of(&b.admin), form(&taken, "Dadang"), at(2024, 6, 1)).await;
    match res {
        Err(PortalError::Conflict(msg)) => assert!(msg.contains(&taken)),
        other => panic!("expected conflict, got {:?}", other),
    }

    // Updating a citizen onto another's NIK is refused too.
    let res = citizen::update_citizen(
        &db,
        &scope_of(&a.admin),
        a.citizens[1].id,
        form(&taken, "Budi Santoso"),
        at(2024, 6, 2),
    )
    .await;
    assert!(matches!(res, Err(PortalError::Conflict(_))));
}

#[actix_rt::test]
#[serial]
async fn test_listing_never_crosses_villages() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let villages = vec![
        create_populated_village(&db, "SCA", "32010101019000").await.unwrap(),
        create_populated_village(&db, "SCB", "32020202029000").await.unwrap(),
        create_populated_village(&db, "SCC", "32030303039000").await.unwrap(),
    ];

    for v in villages.iter() {
        for staff in [&v.admin, &v.staff] {
            let scope = scope_of(staff);
            let listed = citizen::list_citizens(&db, scope.village_id, None)
                .await
                .expect("list citizens");
            assert_eq!(listed.len(), 2);
            assert!(listed.iter().all(|c| c.village_id == v.village.id));
        }
    }

    // A citizen of another village is invisible through every scoped operation.
    let a = &villages[0];
    let foreign = &villages[1].citizens[0];
    let scope = scope_of(&a.admin);
    assert!(matches!(
        citizen::get_citizen(&db, scope.village_id, foreign.id).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        citizen::update_citizen(&db, &scope, foreign.id, form(&foreign.nik, "X"), at(2024, 6, 1)).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        citizen::delete_citizen(&db, &scope, foreign.id, at(2024, 6, 1)).await,
        Err(PortalError::NotFound(_))
    ));
}

#[actix_rt::test]
#[serial]
async fn test_search_is_case_insensitive() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "SRC", "32010101019000").await.unwrap();

    let found = citizen::list_citizens(&db, v.village.id, Some("SITI")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].nama, "Siti Aminah");

    let by_nik = citizen::list_citizens(&db, v.village.id, Some("3201010101900002"))
        .await
        .unwrap();
    assert_eq!(by_nik.len(), 1);
    assert_eq!(by_nik[0].nama, "Budi Santoso");

    let blank = citizen::list_citizens(&db, v.village.id, Some("  ")).await.unwrap();
    assert_eq!(blank.len(), 2);
}

#[actix_rt::test]
#[serial]
async fn test_delete_citizen_removes_letter_requests() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "DEL", "32010101019000").await.unwrap();
    let target = &v.citizens[0];
    create_test_request(&db, target, "Surat Keterangan Domisili", LetterStatus::Pending, None)
        .await
        .unwrap();
    create_test_request(&db, &v.citizens[1], "Surat Keterangan Usaha", LetterStatus::Pending, None)
        .await
        .unwrap();

    citizen::delete_citizen(&db, &scope_of(&v.staff), target.id, at(2024, 6, 3))
        .await
        .expect("delete citizen");

    let remaining = letter_requests::Entity::find()
        .filter(letter_requests::Column::VillageId.eq(v.village.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].citizen_id, v.citizens[1].id);
}
