//! Test fixtures for creating test data
#![allow(dead_code)]
#![allow(clippy::needless_update)]

use chrono::{NaiveDate, NaiveDateTime};
use portal_desa::orm::letter_requests::LetterStatus;
use portal_desa::orm::users::{AccountStatus, StaffRole};
use portal_desa::orm::villages::VillageStatus;
use portal_desa::orm::{citizens, letter_requests, users, villages};
use portal_desa::role::VillageScope;
use portal_desa::session::hash_password;
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

pub fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// Create an active village with a unique code
pub async fn create_test_village(
    db: &DatabaseConnection,
    name: &str,
    code: &str,
) -> Result<villages::Model, DbErr> {
    villages::ActiveModel {
        name: Set(name.to_string()),
        code: Set(code.to_string()),
        kecamatan: Set("Cibeunying".to_string()),
        kabupaten: Set("Bandung".to_string()),
        provinsi: Set("Jawa Barat".to_string()),
        status: Set(VillageStatus::Active),
        created_at: Set(at(2024, 1, 1)),
        updated_at: Set(at(2024, 1, 1)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Create a staff account with known credentials
pub async fn create_test_staff(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    role: StaffRole,
    village_id: Option<i32>,
) -> Result<users::Model, DbErr> {
    let password_hash = hash_password(password)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;

    users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@test.com", username)),
        password: Set(password_hash),
        full_name: Set(format!("{} (test)", username)),
        role: Set(role),
        status: Set(AccountStatus::Aktif),
        village_id: Set(village_id),
        failed_login_attempts: Set(0),
        locked_until: Set(None),
        last_login_at: Set(None),
        created_at: Set(at(2024, 1, 1)),
        updated_at: Set(at(2024, 1, 1)),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn create_test_citizen(
    db: &DatabaseConnection,
    village_id: i32,
    nik: &str,
    nama: &str,
    tanggal_lahir: &str,
) -> Result<citizens::Model, DbErr> {
    citizens::ActiveModel {
        village_id: Set(village_id),
        nik: Set(nik.to_string()),
        no_kk: Set("3201010101009999".to_string()),
        nama: Set(nama.to_string()),
        tanggal_lahir: Set(tanggal_lahir.to_string()),
        alamat: Set("Jl. Mawar 2".to_string()),
        no_telepon: Set(None),
        created_at: Set(at(2024, 1, 1)),
        updated_at: Set(at(2024, 1, 1)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Insert a letter request in a given state, bypassing the workflow.
pub async fn create_test_request(
    db: &DatabaseConnection,
    citizen: &citizens::Model,
    letter_type: &str,
    status: LetterStatus,
    approved_at: Option<NaiveDateTime>,
) -> Result<letter_requests::Model, DbErr> {
    letter_requests::ActiveModel {
        citizen_id: Set(citizen.id),
        village_id: Set(citizen.village_id),
        letter_type: Set(letter_type.to_string()),
        purpose: Set("Keperluan administrasi".to_string()),
        status: Set(status),
        created_at: Set(at(2024, 6, 1)),
        approved_at: Set(approved_at),
        approved_by: Set(None),
        rejected_at: Set(None),
        rejected_by: Set(None),
        rejection_reason: Set(None),
        letter_number: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub fn scope_of(user: &users::Model) -> VillageScope {
    VillageScope {
        actor_id: user.id,
        village_id: user.village_id.expect("village staff"),
    }
}

/// A village with its admin, one staff member and two citizens.
pub struct TestVillage {
    pub village: villages::Model,
    pub admin: users::Model,
    pub staff: users::Model,
    pub citizens: Vec<citizens::Model>,
}

pub async fn create_populated_village(
    db: &DatabaseConnection,
    code: &str,
    nik_prefix: &str,
) -> Result<TestVillage, DbErr> {
    let village = create_test_village(db, &format!("Desa {}", code), code).await?;
    let admin = create_test_staff(
        db,
        &format!("admin_{}", code.to_lowercase()),
        "password123",
        StaffRole::AdminDesa,
        Some(village.id),
    )
    .await?;
    let staff = create_test_staff(
        db,
        &format!("staf_{}", code.to_lowercase()),
        "password123",
        StaffRole::PerangkatDesa,
        Some(village.id),
    )
    .await?;

    let mut citizens = Vec::new();
    for (i, nama) in ["Siti Aminah", "Budi Santoso"].iter().enumerate() {
        citizens.push(
            create_test_citizen(
                db,
                village.id,
                &format!("{}{:02}", nik_prefix, i + 1),
                nama,
                "1990-01-15",
            )
            .await?,
        );
    }

    Ok(TestVillage {
        village,
        admin,
        staff,
        citizens,
    })
}
