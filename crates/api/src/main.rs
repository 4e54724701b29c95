use std::sync::Arc;

use anyhow::Context;

use kitroom_api::app::{self, services::AppServices};
use kitroom_infra::{AppConfig, Clock, InMemoryStorage, SystemClock, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    kitroom_observability::init(config.log_format);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app = match config.database_url.as_deref() {
        Some(url) => {
            let storage = db::connect(url, &config)
                .await
                .context("connecting to postgres")?;
            app::build_app(
                AppServices::new(Arc::new(storage), clock, &config),
                &config.cors_origin_list(),
            )
        }
        None => {
            tracing::warn!("database_url not set; using the in-memory store (data is lost on exit)");
            app::build_app(
                AppServices::new(Arc::new(InMemoryStorage::new()), clock, &config),
                &config.cors_origin_list(),
            )
        }
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
