//! Database connection and schema bootstrap.

use crate::orm;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};
use std::time::Duration;

/// Opens a connection pool to `url`.
pub async fn init_db(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    log::info!("Connected to database ({:?})", db.get_database_backend());
    Ok(db)
}

/// Insert or update refused by a unique constraint or index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("UNIQUE constraint failed")
        || message.contains("duplicate key value")
        || message.contains("Duplicate entry")
}

/// Transaction failed because another one held the lock or won a
/// serialization conflict. Running it again may succeed.
pub fn is_lock_contention(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("SQLITE_BUSY")
        || message.contains("could not serialize access")
        || message.contains("deadlock detected")
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Creates every table that does not exist yet.
///
/// Parents are created before the tables that reference them.
pub async fn sync_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    create_table(db, orm::villages::Entity).await?;
    create_table(db, orm::users::Entity).await?;
    create_table(db, orm::citizens::Entity).await?;
    create_table(db, orm::letter_requests::Entity).await?;
    create_table(db, orm::letter_sequences::Entity).await?;
    create_table(db, orm::village_regulations::Entity).await?;
    create_table(db, orm::village_decisions::Entity).await?;
    create_table(db, orm::website_contents::Entity).await?;
    create_table(db, orm::news::Entity).await?;
    create_table(db, orm::services::Entity).await?;
    create_table(db, orm::website_settings::Entity).await?;
    create_table(db, orm::activity_logs::Entity).await?;

    // At most one village admin per village.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_one_admin_per_village \
         ON users (village_id) WHERE role = 'admin_desa'"
            .to_owned(),
    ))
    .await?;

    log::debug!("Schema synchronised");
    Ok(())
}
