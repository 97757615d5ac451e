/// Integration tests for role dashboards and the activity log
mod common;
use serial_test::serial;

use chrono::Duration;
use common::*;
use portal_desa::activity::{self, Actor};
use portal_desa::archive::{self, RegulationForm};
use portal_desa::constants::ACTIVITY_LOG_LIMIT;
use portal_desa::dashboard::{self, Dashboard};
use portal_desa::error::PortalError;
use portal_desa::orm::letter_requests::LetterStatus;
use portal_desa::orm::users::StaffRole;
use portal_desa::orm::villages::VillageStatus;
use portal_desa::role::{Principal, Role};
use portal_desa::session::{citizen_principal, staff_principal};
use portal_desa::village;

#[actix_rt::test]
#[serial]
async fn test_dashboard_matches_the_role() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let root = create_test_staff(&db, "root", "password123", StaffRole::SuperAdmin, None)
        .await
        .unwrap();
    let a = create_populated_village(&db, "DSA", "32010101019000").await.unwrap();
    let b = create_populated_village(&db, "DSB", "32020202029000").await.unwrap();
    village::set_village_status(&db, b.village.id, VillageStatus::Inactive, root.id, at(2024, 6, 1))
        .await
        .unwrap();

    let siti = &a.citizens[0];
    let budi = &a.citizens[1];
    create_test_request(&db, siti, "Surat Keterangan Domisili", LetterStatus::Pending, None)
        .await
        .unwrap();
    create_test_request(&db, siti, "Surat Keterangan Usaha", LetterStatus::Approved, Some(at(2024, 6, 5)))
        .await
        .unwrap();
    create_test_request(&db, siti, "Surat Pengantar SKCK", LetterStatus::Rejected, None)
        .await
        .unwrap();
    create_test_request(&db, budi, "Surat Keterangan Tidak Mampu", LetterStatus::Pending, None)
        .await
        .unwrap();
    archive::create_regulation(
        &db,
        &scope_of(&a.admin),
        RegulationForm {
            number: "01/2024".to_string(),
            issued_on: at(2024, 2, 1).date(),
            agreement_number: None,
            agreement_date: None,
            subject: "APBDes 2024".to_string(),
            status: None,
            notes: None,
        },
        at(2024, 6, 1),
    )
    .await
    .unwrap();
    let now = at(2024, 6, 20);

    let root_principal = staff_principal(&root).expect("active super admin");
    match dashboard::dashboard_for(&db, &root_principal, now).await.unwrap() {
        Dashboard::SuperAdmin(d) => {
            assert_eq!(d.villages, 2);
            assert_eq!(d.active_villages, 1);
            assert_eq!(d.staff_accounts, 4);
            assert_eq!(d.citizens, 4);
        }
        other => panic!("expected super admin dashboard, got {:?}", other),
    }

    let staff_principal_a = staff_principal(&a.staff).expect("active staff");
    match dashboard::dashboard_for(&db, &staff_principal_a, now).await.unwrap() {
        Dashboard::Village(d) => {
            assert_eq!(d.village.id, a.village.id);
            assert_eq!(d.summary.citizens, 2);
            assert_eq!(d.summary.letters_total, 4);
            assert_eq!(d.summary.letters_pending, 2);
            assert_eq!(d.summary.approved_this_month, 1);
            assert_eq!(d.summary.regulations, 1);
            assert_eq!(d.pending_requests.len(), 2);
            assert!(d
                .pending_requests
                .iter()
                .all(|r| r.request.village_id == a.village.id));
        }
        other => panic!("expected village dashboard, got {:?}", other),
    }

    // The other village's admin sees none of it.
    let admin_principal_b = staff_principal(&b.admin).expect("active admin");
    match dashboard::dashboard_for(&db, &admin_principal_b, now).await.unwrap() {
        Dashboard::Village(d) => {
            assert_eq!(d.village.id, b.village.id);
            assert_eq!(d.summary.letters_total, 0);
            assert!(d.pending_requests.is_empty());
        }
        other => panic!("expected village dashboard, got {:?}", other),
    }

    match dashboard::dashboard_for(&db, &citizen_principal(siti), now).await.unwrap() {
        Dashboard::Citizen(d) => {
            assert_eq!(d.total, 3);
            assert_eq!((d.pending, d.approved, d.rejected), (1, 1, 1));
            assert!(d.requests.iter().all(|r| r.citizen_id == siti.id));
        }
        other => panic!("expected citizen dashboard, got {:?}", other),
    }
}

#[actix_rt::test]
#[serial]
async fn test_village_dashboard_needs_a_village() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let orphan = Principal::Staff {
        user_id: 1,
        username: "yatim".to_string(),
        full_name: "Tanpa Desa".to_string(),
        role: Role::VillageAdmin,
        village_id: None,
    };

    let res = dashboard::dashboard_for(&db, &orphan, at(2024, 6, 1)).await;
    assert!(matches!(res, Err(PortalError::Forbidden)));
}

#[actix_rt::test]
#[serial]
async fn test_recent_activity_is_scoped_and_newest_first() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let root = create_test_staff(&db, "root", "password123", StaffRole::SuperAdmin, None)
        .await
        .unwrap();
    let a = create_populated_village(&db, "AKA", "32010101019000").await.unwrap();
    let b = create_populated_village(&db, "AKB", "32020202029000").await.unwrap();

    activity::record(&db, Actor::staff(a.admin.id, Some(a.village.id)), "Tambah warga", None, at(2024, 6, 1)).await;
    activity::record(&db, Actor::anonymous(Some(b.village.id)), "Ajukan surat", None, at(2024, 6, 2)).await;
    activity::record(&db, Actor::staff(a.staff.id, Some(a.village.id)), "Setujui surat", None, at(2024, 6, 3)).await;
    activity::record(&db, Actor::staff(root.id, None), "Tambah desa", None, at(2024, 6, 4)).await;

    let everything = activity::recent(&db, None).await.unwrap();
    let actions: Vec<&str> = everything.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["Tambah desa", "Setujui surat", "Ajukan surat", "Tambah warga"]);

    let village_a = activity::recent(&db, Some(a.village.id)).await.unwrap();
    let actions: Vec<&str> = village_a.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["Setujui surat", "Tambah warga"]);

    let village_b = activity::recent(&db, Some(b.village.id)).await.unwrap();
    assert_eq!(village_b.len(), 1);
    assert_eq!(village_b[0].user_id, None);
}

#[actix_rt::test]
#[serial]
async fn test_recent_activity_is_capped() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "CAP", "32010101019000").await.unwrap();
    let start = at(2024, 6, 1);

    for i in 0..(ACTIVITY_LOG_LIMIT as i64 + 5) {
        activity::insert(
            &db,
            Actor::staff(v.admin.id, Some(v.village.id)),
            "Ubah warga",
            Some(format!("#{}", i)),
            start + Duration::minutes(i),
        )
        .await
        .unwrap();
    }

    let entries = activity::recent(&db, Some(v.village.id)).await.unwrap();
    assert_eq!(entries.len(), ACTIVITY_LOG_LIMIT as usize);
    let newest = format!("#{}", ACTIVITY_LOG_LIMIT as i64 + 4);
    assert_eq!(entries[0].details.as_deref(), Some(newest.as_str()));
}
