use anyhow::Context;

mod app;
mod clients;
mod config;
mod inventory;
mod products;
mod recipes;
mod scan;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "pantrytrack=debug,axum=info,tower_http=info".to_string());
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

    let config = config::AppConfig::from_env().context("load configuration")?;
    let addr = config.listen_addr().context("APP_HOST/APP_PORT")?;
    let app_state = state::AppState::init(config)?;
    app::serve(app::build_app(app_state), addr).await
}
