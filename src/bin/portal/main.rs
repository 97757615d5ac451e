use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{time, Key, SameSite};
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use portal_desa::db::{init_db, sync_schema};
use portal_desa::middleware::ClientCtx;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::DatabaseConnection;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    init_our_mods();

    let database = portal_desa::app_config::database();
    let database_url = std::env::var("DATABASE_URL").unwrap_or(database.url);
    let db = init_db(&database_url, database.max_connections).await?;

    if database.auto_migrate {
        sync_schema(&db).await?;
    }

    bootstrap_admin(&db).await?;

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid. Reason: {:?}\r\nThis means the key used for signing session cookies will invalidate every time the application is restarted. A secret key must be at least 64 bytes to be accepted.\r\n\r\nNeed a key? How about:\r\n{}", other.map(|k| format!("only {} bytes", k.len())), random_string);
            Key::from(random_string.as_bytes())
        }
    };

    let security = portal_desa::app_config::security();
    let server = portal_desa::app_config::server();
    let session_ttl = time::Duration::minutes(security.session_timeout_minutes as i64);
    let db = Data::new(db);

    log::info!(
        "Listening on {}:{}",
        server.bind_address,
        server.port
    );

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(db.clone())
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("X-XSS-Protection", "0")) // Disable legacy XSS filter
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add((
                        "Permissions-Policy",
                        "geolocation=(), microphone=(), camera=()",
                    )),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .cookie_secure(security.cookie_secure)
                    .session_lifecycle(PersistentSession::default().session_ttl(session_ttl))
                    .build(),
            )
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(portal_desa::web::configure)
    })
    .bind((server.bind_address.as_str(), server.port))?
    .run()
    .await?;

    Ok(())
}

/// Creates the first super admin from PORTAL_BOOTSTRAP_ADMIN_* when none exists.
async fn bootstrap_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let (username, password) = match (
        std::env::var("PORTAL_BOOTSTRAP_ADMIN_USERNAME"),
        std::env::var("PORTAL_BOOTSTRAP_ADMIN_PASSWORD"),
    ) {
        (Ok(username), Ok(password)) => (username, password),
        _ => return Ok(()),
    };
    let email = std::env::var("PORTAL_BOOTSTRAP_ADMIN_EMAIL")
        .unwrap_or_else(|_| format!("{}@localhost.localdomain", username));

    let now = chrono::Utc::now().naive_utc();
    match portal_desa::account::bootstrap_super_admin(db, &username, &email, &password, now).await
    {
        Ok(Some(_)) => log::warn!("Created super admin {}, change its password", username),
        Ok(None) => log::debug!("Super admin already present, skipping bootstrap"),
        Err(e) => return Err(anyhow::anyhow!("Bootstrap admin failed: {}", e)),
    }
    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine; the environment may be set directly.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
pub fn init_our_mods() {
    portal_desa::app_config::init();
}
