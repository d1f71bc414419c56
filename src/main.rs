use std::sync::Arc;

use brandhub_api::config;
use brandhub_api::state::AppState;
use brandhub_api::store::PgStore;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config().clone();
    tracing::info!("Starting brandhub-api in {:?} mode", config.environment);

    let store = match PgStore::connect(&config.database).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = store.migrate().await {
        eprintln!("failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let port = config.api.port;
    let state = AppState::new(Arc::new(store), config);
    let app = brandhub_api::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 Brandhub content API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
