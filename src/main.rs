// src/main.rs

use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::{PgPool, postgres::PgPoolOptions};
use survey_backend::config::Config;
use survey_backend::handlers::auth::seed_admin;
use survey_backend::routes;
use survey_backend::state::AppState;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CONNECT_ATTEMPTS: u32 = 5;

/// Logs to stdout and to a daily-rotated file under `logs/`.
/// The returned guard must live as long as the process.
fn init_tracing(config: &Config) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily("logs", "survey.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.rust_log))
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

/// The database may come up after the service (e.g. under compose).
async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                attempt += 1;
                tracing::warn!("Database not ready ({}), retrying in 2s... (Attempt {})", e, attempt);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::from_env();
    let _guard = init_tracing(&config);

    let pool = connect_with_retry(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connected...");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            if let Err(e) = seed_admin(&pool, username, password).await {
                tracing::error!("Failed to seed admin account: {:?}", e);
            }
        }
        _ => tracing::warn!("ADMIN_USERNAME/ADMIN_PASSWORD not set; admin account left unchanged"),
    }

    if config.allow_multiple_responses {
        tracing::warn!("Response deduplication is disabled (ALLOW_MULTIPLE_RESPONSES)");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = routes::create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
