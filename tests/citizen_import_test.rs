/// Integration tests for the bulk citizen CSV import
mod common;
use serial_test::serial;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::*;
use portal_desa::citizen::import::{import_citizens, CitizenRecord, CitizenSink, ImportSettings};
use portal_desa::citizen::{self, ImportError};
use portal_desa::error::PortalError;
use portal_desa::orm::citizens;
use sea_orm::{entity::*, query::*, DbErr, PaginatorTrait};
use std::collections::HashSet;
use std::sync::Mutex;

const HEADER: &str = "nik,no_kk,nama,tanggal_lahir,alamat,no_telepon";

fn row(nik: &str, nama: &str) -> String {
    format!("{},3201010101009999,{},1990-01-15,Jl. Melati 1,0812", nik, nama)
}

fn csv(rows: &[String]) -> String {
    let mut text = HEADER.to_string();
    for r in rows {
        text.push('\n');
        text.push_str(r);
    }
    text
}

async fn count_citizens(db: &sea_orm::DatabaseConnection, village_id: i32) -> u64 {
    citizens::Entity::find()
        .filter(citizens::Column::VillageId.eq(village_id))
        .count(db)
        .await
        .unwrap() as u64
}

#[actix_rt::test]
#[serial]
async fn test_valid_file_is_imported() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let village = create_test_village(&db, "Desa Import", "IMP").await.unwrap();
    let admin = create_test_staff(
        &db,
        "admin_imp",
        "password123",
        portal_desa::orm::users::StaffRole::AdminDesa,
        Some(village.id),
    )
    .await
    .unwrap();

    // Quoted values, shuffled header order, upper case header names.
    let text = "NAMA,nik,No_KK,tanggal_lahir,alamat,no_telepon\n\
                \"Siti Aminah\",3201010101900001,3201010101009999,1990-01-15,\"Jl. Melati 1\",\n\
                \n\
                Budi,3201010101900002,3201010101009999,1988-12-01,Jl. Melati 2,0812\n";

    let outcome = citizen::import_csv(
        &db,
        &scope_of(&admin),
        text,
        &ImportSettings::default(),
        at(2024, 6, 1),
    )
    .await
    .expect("import succeeds");
    assert_eq!(outcome.imported, 2);
    assert_eq!(count_citizens(&db, village.id).await, 2);

    let siti = citizens::Entity::find()
        .filter(citizens::Column::Nik.eq("3201010101900001"))
        .one(&db)
        .await
        .unwrap()
        .expect("imported citizen");
    assert_eq!(siti.nama, "Siti Aminah");
    assert_eq!(siti.village_id, village.id);
    assert_eq!(siti.no_telepon, None);
}

#[actix_rt::test]
#[serial]
async fn test_one_bad_row_rejects_the_whole_file() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let village = create_test_village(&db, "Desa Import", "IMP").await.unwrap();
    let admin = create_test_staff(
        &db,
        "admin_imp",
        "password123",
        portal_desa::orm::users::StaffRole::AdminDesa,
        Some(village.id),
    )
    .await
    .unwrap();

    // Third of five data rows carries a 15 digit NIK.
    let text = csv(&[
        row("3201010101900001", "Satu"),
        row("3201010101900002", "Dua"),
        row("320101010190003", "Tiga"),
        row("3201010101900004", "Empat"),
        row("3201010101900005", "Lima"),
    ]);

    let res = citizen::import_csv(
        &db,
        &scope_of(&admin),
        &text,
        &ImportSettings::default(),
        at(2024, 6, 1),
    )
    .await;
    match res {
        Err(PortalError::Import(msg)) => {
            assert!(msg.contains("Baris 4"), "unexpected message: {}", msg);
            assert!(msg.contains("NIK harus 16 digit"), "unexpected message: {}", msg);
        }
        other => panic!("expected import failure, got {:?}", other),
    }
    assert_eq!(count_citizens(&db, village.id).await, 0);
}

#[actix_rt::test]
#[serial]
async fn test_registered_nik_is_a_row_error() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let v = create_populated_village(&db, "REG", "32010101019000").await.unwrap();

    let text = csv(&[
        row("3201010101900010", "Baru"),
        row(&v.citizens[0].nik, "Lama"),
    ]);
    let res = import_citizens(&db, v.village.id, &text, &ImportSettings::default(), at(2024, 6, 1)).await;
    match res {
        Err(ImportError::InvalidRows { summary, error_count }) => {
            assert_eq!(error_count, 1);
            assert_eq!(
                summary,
                format!("Baris 3: NIK {} sudah terdaftar", v.citizens[0].nik)
            );
        }
        other => panic!("expected invalid rows, got {:?}", other),
    }
    assert_eq!(count_citizens(&db, v.village.id).await, 2);
}

#[actix_rt::test]
#[serial]
async fn test_error_report_is_truncated() {
    let db = setup_test_database().await.expect("Failed to set up database");
    let village = create_test_village(&db, "Desa Import", "IMP").await.unwrap();

    let rows: Vec<String> = (1..=8).map(|i| row(&format!("12345{}", i), "Pendek")).collect();
    let res = import_citizens(&db, village.id, &csv(&rows), &ImportSettings::default(), at(2024, 6, 1)).await;
    match res {
        Err(ImportError::InvalidRows { summary, error_count }) => {
            assert_eq!(error_count, 8);
            assert_eq!(summary.lines().count(), 6);
            assert!(summary.starts_with("Baris 2:"));
            assert!(summary.ends_with("... dan 3 kesalahan lainnya"));
        }
        other => panic!("expected invalid rows, got {:?}", other),
    }
}

/// Sink that accepts a fixed number of batches, then fails.
struct FlakySink {
    batches_before_failure: usize,
    inserted: Mutex<Vec<String>>,
    calls: Mutex<usize>,
}

#[async_trait]
impl CitizenSink for FlakySink {
    async fn existing_niks(&self, _niks: &[String]) -> Result<HashSet<String>, DbErr> {
        Ok(HashSet::new())
    }

    async fn insert_batch(
        &self,
        _village_id: i32,
        batch: &[CitizenRecord],
        _now: NaiveDateTime,
    ) -> Result<(), DbErr> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls > self.batches_before_failure {
            return Err(DbErr::Exec("connection reset".to_string()));
        }
        self.inserted
            .lock()
            .unwrap()
            .extend(batch.iter().map(|r| r.nik.clone()));
        Ok(())
    }
}

#[actix_rt::test]
async fn test_failed_batch_keeps_committed_rows() {
    let sink = FlakySink {
        batches_before_failure: 2,
        inserted: Mutex::new(Vec::new()),
        calls: Mutex::new(0),
    };
    let rows: Vec<String> = (1..=7)
        .map(|i| row(&format!("32010101019000{:02}", i), "Warga"))
        .collect();
    let settings = ImportSettings {
        batch_size: 2,
        max_reported_errors: 5,
    };

    let res = import_citizens(&sink, 1, &csv(&rows), &settings, at(2024, 6, 1)).await;
    match res {
        Err(ImportError::BatchFailed { imported, cause }) => {
            assert_eq!(imported, 4);
            assert!(cause.contains("connection reset"));
        }
        other => panic!("expected batch failure, got {:?}", other),
    }

    // Batches before the failure stay, nothing after it is attempted.
    assert_eq!(sink.inserted.lock().unwrap().len(), 4);
    assert_eq!(*sink.calls.lock().unwrap(), 3);
}
