/// Integration tests for village regulations and decisions
mod common;
use serial_test::serial;

use chrono::NaiveDate;
use common::*;
use portal_desa::archive::{self, DecisionForm, RegulationForm, DEFAULT_STATUS};
use portal_desa::error::PortalError;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn regulation(number: &str, subject: &str) -> RegulationForm {
    RegulationForm {
        number: number.to_string(),
        issued_on: date(2024, 3, 1),
        agreement_number: Some("  ".to_string()),
        agreement_date: None,
        subject: subject.to_string(),
        status: None,
        notes: None,
    }
}

fn decision(number: &str, issued_on: NaiveDate) -> DecisionForm {
    DecisionForm {
        number: number.to_string(),
        issued_on,
        report_number: Some("12/BPD/2024".to_string()),
        report_date: Some(issued_on),
        subject: "Pengangkatan perangkat desa".to_string(),
        status: None,
        notes: None,
    }
}

#[actix_rt::test]
#[serial]
async fn test_regulations_stay_in_their_village() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let a = create_populated_village(&db, "ARA", "32010101019000").await.unwrap();
    let b = create_populated_village(&db, "ARB", "32020202029000").await.unwrap();
    let scope_a = scope_of(&a.staff);
    let scope_b = scope_of(&b.admin);

    let created = archive::create_regulation(&db, &scope_a, regulation(" 01/2024 ", "APBDes 2024"), at(2024, 3, 2))
        .await
        .expect("create regulation");
    assert_eq!(created.village_id, a.village.id);
    assert_eq!(created.number, "01/2024");
    assert_eq!(created.status, DEFAULT_STATUS);
    assert_eq!(created.agreement_number, None);
    assert_eq!(created.created_by, Some(a.staff.id));

    assert_eq!(archive::list_regulations(&db, a.village.id).await.unwrap().len(), 1);
    assert!(archive::list_regulations(&db, b.village.id).await.unwrap().is_empty());

    // Another village sees nothing and changes nothing.
    assert!(matches!(
        archive::get_regulation(&db, b.village.id, created.id).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        archive::update_regulation(&db, &scope_b, created.id, regulation("99/2024", "Diubah"), at(2024, 3, 3)).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        archive::delete_regulation(&db, &scope_b, created.id, at(2024, 3, 3)).await,
        Err(PortalError::NotFound(_))
    ));

    let mut form = regulation("01/2024", "APBDes 2024 Perubahan");
    form.status = Some("dicabut".to_string());
    let updated = archive::update_regulation(&db, &scope_a, created.id, form, at(2024, 4, 1))
        .await
        .expect("update regulation");
    assert_eq!(updated.subject, "APBDes 2024 Perubahan");
    assert_eq!(updated.status, "dicabut");
    assert_eq!(updated.updated_at, at(2024, 4, 1));

    archive::delete_regulation(&db, &scope_a, created.id, at(2024, 4, 2))
        .await
        .expect("delete regulation");
    assert!(archive::list_regulations(&db, a.village.id).await.unwrap().is_empty());
}

#[actix_rt::test]
#[serial]
async fn test_regulation_needs_number_and_subject() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "ARV", "32010101019000").await.unwrap();
    let scope = scope_of(&v.admin);

    let res = archive::create_regulation(&db, &scope, regulation("", "APBDes"), at(2024, 3, 1)).await;
    assert!(matches!(res, Err(PortalError::Validation(_))));
    let res = archive::create_regulation(&db, &scope, regulation("01/2024", ""), at(2024, 3, 1)).await;
    assert!(matches!(res, Err(PortalError::Validation(_))));
    assert!(archive::list_regulations(&db, v.village.id).await.unwrap().is_empty());
}

#[actix_rt::test]
#[serial]
async fn test_decisions_are_listed_newest_first_per_village() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let a = create_populated_village(&db, "KPA", "32010101019000").await.unwrap();
    let b = create_populated_village(&db, "KPB", "32020202029000").await.unwrap();
    let scope_a = scope_of(&a.admin);
    let scope_b = scope_of(&b.admin);

    for (number, issued) in [("01/KPTS/2024", date(2024, 1, 5)), ("02/KPTS/2024", date(2024, 5, 20))] {
        archive::create_decision(&db, &scope_a, decision(number, issued), at(2024, 6, 1))
            .await
            .expect("create decision");
    }
    let foreign = archive::create_decision(&db, &scope_b, decision("01/KPTS/2024", date(2024, 2, 1)), at(2024, 6, 1))
        .await
        .expect("same number in another village");

    let listed = archive::list_decisions(&db, a.village.id).await.unwrap();
    let numbers: Vec<&str> = listed.iter().map(|d| d.number.as_str()).collect();
    assert_eq!(numbers, vec!["02/KPTS/2024", "01/KPTS/2024"]);
    assert_eq!(listed[0].report_number.as_deref(), Some("12/BPD/2024"));

    assert!(matches!(
        archive::get_decision(&db, a.village.id, foreign.id).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        archive::delete_decision(&db, &scope_a, foreign.id, at(2024, 6, 2)).await,
        Err(PortalError::NotFound(_))
    ));

    let mut form = decision("01/KPTS/2024", date(2024, 2, 1));
    form.notes = Some(" Diperbarui ".to_string());
    let updated = archive::update_decision(&db, &scope_b, foreign.id, form, at(2024, 6, 3))
        .await
        .expect("update decision");
    assert_eq!(updated.notes.as_deref(), Some("Diperbarui"));

    archive::delete_decision(&db, &scope_b, foreign.id, at(2024, 6, 4))
        .await
        .expect("delete decision");
    assert!(archive::list_decisions(&db, b.village.id).await.unwrap().is_empty());
    assert_eq!(archive::list_decisions(&db, a.village.id).await.unwrap().len(), 2);
}
