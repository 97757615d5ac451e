/// Integration tests for staff account management and village assignment
mod common;
use serial_test::serial;

use common::*;
use portal_desa::account::{self, AccountManager, NewAccountForm, PasswordForm};
use portal_desa::auth::{self, LockoutPolicy};
use portal_desa::error::PortalError;
use portal_desa::orm::users::StaffRole;
use portal_desa::village;

fn new_account(username: &str, role: StaffRole, village_id: Option<i32>) -> NewAccountForm {
    NewAccountForm {
        username: username.to_string(),
        email: format!("{}@desa.id", username),
        password: "rahasia123".to_string(),
        full_name: format!("Pengguna {}", username),
        role,
        village_id,
    }
}

#[actix_rt::test]
#[serial]
async fn test_one_admin_per_village() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let root = create_test_staff(&db, "root", "password123", StaffRole::SuperAdmin, None)
        .await
        .unwrap();
    let manager = AccountManager::SuperAdmin { actor_id: root.id };
    let v = create_populated_village(&db, "ADM", "32010101019000").await.unwrap();

    let res = account::create_account(
        &db,
        &manager,
        new_account("admin_kedua", StaffRole::AdminDesa, Some(v.village.id)),
        at(2024, 6, 1),
    )
    .await;
    assert!(matches!(res, Err(PortalError::Conflict(_))));

    // Village accounts need a village, the super admin must not have one.
    let res = account::create_account(
        &db,
        &manager,
        new_account("tanpa_desa", StaffRole::PerangkatDesa, None),
        at(2024, 6, 1),
    )
    .await;
    assert!(matches!(res, Err(PortalError::Validation(_))));

    let res = account::create_account(
        &db,
        &manager,
        new_account("root_dua", StaffRole::SuperAdmin, Some(v.village.id)),
        at(2024, 6, 1),
    )
    .await;
    assert!(matches!(res, Err(PortalError::Validation(_))));

    let other = create_test_village(&db, "Desa Lain", "LAIN").await.unwrap();
    let admin = account::create_account(
        &db,
        &manager,
        new_account("admin_lain", StaffRole::AdminDesa, Some(other.id)),
        at(2024, 6, 1),
    )
    .await
    .expect("second village gets its admin");
    assert_eq!(admin.village_id, Some(other.id));

    let resolved = village::resolve_village_for_user(&db, admin.id).await.unwrap();
    assert_eq!(resolved.id, other.id);
}

#[actix_rt::test]
#[serial]
async fn test_village_admin_manages_own_staff_only() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let a = create_populated_village(&db, "MGA", "32010101019000").await.unwrap();
    let b = create_populated_village(&db, "MGB", "32020202029000").await.unwrap();
    let manager = AccountManager::VillageAdmin {
        actor_id: a.admin.id,
        village_id: a.village.id,
    };

    // Role other than perangkat_desa is refused.
    let res = account::create_account(
        &db,
        &manager,
        new_account("admin_baru", StaffRole::AdminDesa, Some(a.village.id)),
        at(2024, 6, 1),
    )
    .await;
    assert!(matches!(res, Err(PortalError::Forbidden)));

    // The requested village is ignored, the account lands in the admin's own.
    let created = account::create_account(
        &db,
        &manager,
        new_account("staf_baru", StaffRole::PerangkatDesa, Some(b.village.id)),
        at(2024, 6, 1),
    )
    .await
    .expect("create staff");
    assert_eq!(created.village_id, Some(a.village.id));

    let listed = account::list_accounts(&db, &manager).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["staf_baru", "staf_mga"]);

    assert!(matches!(
        account::get_account(&db, &manager, b.staff.id).await,
        Err(PortalError::NotFound(_))
    ));
    assert!(matches!(
        account::delete_account(&db, &manager, a.admin.id, at(2024, 6, 1)).await,
        Err(PortalError::Validation(_))
    ));
}

#[actix_rt::test]
#[serial]
async fn test_password_reset_clears_lockout() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "RST", "32010101019000").await.unwrap();
    let policy = LockoutPolicy::default();
    let now = at(2024, 6, 1);

    for _ in 0..policy.max_failed_logins {
        let _ = auth::staff_login(&db, "staf_rst", "salah", &policy, now).await;
    }
    assert!(matches!(
        auth::staff_login(&db, "staf_rst", "password123", &policy, now).await,
        Err(PortalError::InvalidCredentials)
    ));

    let manager = AccountManager::VillageAdmin {
        actor_id: v.admin.id,
        village_id: v.village.id,
    };
    account::reset_password(
        &db,
        &manager,
        v.staff.id,
        PasswordForm {
            new_password: "passwordbaru".to_string(),
        },
        now,
    )
    .await
    .expect("reset password");

    auth::staff_login(&db, "staf_rst", "passwordbaru", &policy, now)
        .await
        .expect("login with new password");
}

#[actix_rt::test]
#[serial]
async fn test_change_own_password_checks_current() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "PWD", "32010101019000").await.unwrap();

    let res = account::change_own_password(
        &db,
        v.staff.id,
        "bukan-password",
        PasswordForm {
            new_password: "passwordbaru".to_string(),
        },
        at(2024, 6, 1),
    )
    .await;
    assert!(matches!(res, Err(PortalError::InvalidCredentials)));

    account::change_own_password(
        &db,
        v.staff.id,
        "password123",
        PasswordForm {
            new_password: "passwordbaru".to_string(),
        },
        at(2024, 6, 1),
    )
    .await
    .expect("change password");

    let policy = LockoutPolicy::default();
    assert!(auth::staff_login(&db, "staf_pwd", "password123", &policy, at(2024, 6, 2))
        .await
        .is_err());
    assert!(auth::staff_login(&db, "staf_pwd", "passwordbaru", &policy, at(2024, 6, 2))
        .await
        .is_ok());
}

#[actix_rt::test]
#[serial]
async fn test_bootstrap_creates_a_single_super_admin() {
    let db = setup_test_database().await.expect("Failed to set up database");

    let first = account::bootstrap_super_admin(&db, "superadmin", "admin@desa.id", "rahasia123", at(2024, 1, 1))
        .await
        .unwrap()
        .expect("first bootstrap creates the account");
    assert_eq!(first.role, StaffRole::SuperAdmin);
    assert_eq!(first.village_id, None);

    let second = account::bootstrap_super_admin(&db, "lain", "lain@desa.id", "rahasia123", at(2024, 1, 2))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[actix_rt::test]
#[serial]
async fn test_second_village_admin_is_refused_by_the_database() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "IDX", "32010101019000").await.unwrap();

    // Inserted directly, without the account checks in front.
    let dup = create_test_staff(&db, "admin_idx_dua", "password123", StaffRole::AdminDesa, Some(v.village.id)).await;
    let err = dup.expect_err("one admin per village");
    assert!(portal_desa::db::is_unique_violation(&err), "{}", err);

    // Village staff are not limited, and other villages keep their own seat.
    create_test_staff(&db, "staf_idx_dua", "password123", StaffRole::PerangkatDesa, Some(v.village.id))
        .await
        .expect("second staff member");
    let other = create_test_village(&db, "Desa Lain", "IDX2").await.unwrap();
    create_test_staff(&db, "admin_idx2", "password123", StaffRole::AdminDesa, Some(other.id))
        .await
        .expect("admin of another village");
}
