use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod app;
mod auth;
mod catalog;
mod config;
mod error;
mod extract;
mod images;
mod recipes;
mod state;
mod storage;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("recipebox=debug,axum=info,tower_http=info"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    if let Some(admin) = &app_state.config.admin {
        auth::services::bootstrap_superuser(&app_state.db, admin).await?;
    }

    app::serve(app::build_app(app_state)).await
}
