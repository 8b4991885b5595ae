use std::sync::Arc;
use toh_heroes::api;
use toh_heroes::orm::{Db, auto_migrate};
use toh_heroes::router::{AppState, Router};
use toh_heroes::settings::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let settings = Settings::from_env();
    if settings.debug {
        log::debug!("Loaded settings: {:?}", settings);
    }

    let db = Arc::new(Db::connect(&settings.database_url).await?);
    auto_migrate(db.clone()).await?;

    let mut router = Router::new();
    api::register(&mut router, &settings);

    let result = router.run(AppState::new(db.clone(), settings)).await;
    db.close().await;
    result
}
