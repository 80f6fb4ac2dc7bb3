use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::time::Duration;

mod access;
mod api;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod retention;
mod routes;
mod store;
mod utils;
mod verification;

use config::Config;
use db::init_db;
use retention::{CleanupScheduler, RetentionPolicy};
use store::Datastore;
use verification::VerificationService;

use crate::docs::ApiDoc;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Absensi API"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    // `absensi migrate` runs the one-shot store copy and exits: every
    // employee, user, and attendance row from SOURCE_DATABASE_URL is
    // copied into DATABASE_URL with ids preserved.
    if std::env::args().nth(1).as_deref() == Some("migrate") {
        let source_url =
            std::env::var("SOURCE_DATABASE_URL").expect("SOURCE_DATABASE_URL must be set");
        let src = Datastore::mysql(init_db(&source_url).await);
        let dst = Datastore::mysql(init_db(&config.database_url).await);
        let report = store::migrate::copy_all(&src, &dst)
            .await
            .expect("store migration failed");
        println!(
            "Migrated {} employees, {} users, {} attendance records",
            report.employees, report.users, report.attendance
        );
        return Ok(());
    }

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;
    let store = Datastore::mysql(pool);

    let policy = RetentionPolicy::new(store.attendance.clone());
    let verification = VerificationService::new(
        store.attendance.clone(),
        store.users.clone(),
        config.tz_offset_minutes,
    );
    let scheduler = Data::new(CleanupScheduler::new(
        store.attendance.clone(),
        Duration::from_secs(config.cleanup_interval_hours * 3600),
    ));

    if config.cleanup_autostart {
        scheduler.start();
        info!("Cleanup automation started at boot");
    }

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(policy.clone()))
            .app_data(Data::new(verification.clone()))
            .app_data(scheduler.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
