use anyhow::{Context, Result};
use api::{AppConfig, AppState, router};
use extract::OllamaClient;
use ingest::FileReader;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(problems) => {
            for problem in &problems.0 {
                tracing::error!(%problem, "invalid configuration");
            }
            return Err(problems.into());
        }
    };

    let client = OllamaClient::new(
        config.ollama_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("Failed to build summarization client")?;

    let bind_addr = config.bind_addr.clone();
    tracing::info!(
        papers_dir = %config.papers_dir.display(),
        output_dir = %config.output_dir.display(),
        workers = config.runner.concurrency,
        model = %config.provider.model,
        backend = %client.base_url(),
        "configuration loaded"
    );

    let state = AppState::new(config, Arc::new(FileReader), Arc::new(client));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to
/// structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
