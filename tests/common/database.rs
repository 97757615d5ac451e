//! Test database setup
#![allow(dead_code)]

use sea_orm::{DatabaseConnection, DbErr};

/// Fresh in-memory SQLite database with the full schema.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = portal_desa::db::init_db("sqlite::memory:", 1).await?;
    portal_desa::db::sync_schema(&db).await?;

    // Ids restart for every database; drop public pages cached by earlier tests.
    portal_desa::website::cache::clear();

    Ok(db)
}

/// SQLite database in a file, shared by a pool of `max_connections`.
pub async fn setup_file_database(
    path: &std::path::Path,
    max_connections: u32,
) -> Result<DatabaseConnection, DbErr> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = portal_desa::db::init_db(&url, max_connections).await?;
    portal_desa::db::sync_schema(&db).await?;
    portal_desa::website::cache::clear();

    Ok(db)
}
