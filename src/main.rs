//! Dataverse Events Gateway
//!
//! Entry point: wires configuration, token provider, OData client, and the
//! HTTP router together.

use dataverse_events_gateway::config::Config;
use dataverse_events_gateway::gateway::EventsGateway;
use dataverse_events_gateway::http;
use dataverse_events_gateway::{ODataClient, TokenProvider};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Dataverse events gateway...");

    let config = Config::load_default()?;
    let runtime_config = config.to_runtime()?;

    tracing::info!("Configured for {}", runtime_config.dataverse_url);

    let auth = Arc::new(TokenProvider::new(
        runtime_config.tenant_id.clone(),
        runtime_config.client_id.clone(),
        runtime_config.client_secret.clone(),
        runtime_config.dataverse_url.clone(),
    ));

    let client = Arc::new(ODataClient::new(auth, runtime_config.api_endpoint())?);
    let gateway = Arc::new(EventsGateway::new(
        client,
        runtime_config.event_filters.clone(),
    ));

    let app = http::router(gateway);
    let listener = tokio::net::TcpListener::bind(&runtime_config.listen).await?;
    tracing::info!("Listening on {}", runtime_config.listen);

    axum::serve(listener, app).await?;
    Ok(())
}
