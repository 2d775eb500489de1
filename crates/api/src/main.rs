use std::sync::Arc;

use gatehouse_backend::{HostedAuthClient, HostedConfig, HostedRestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let config = HostedConfig::from_env()?;
    let settings = gatehouse_api::context::GateSettings::from_env();

    let ctx = gatehouse_api::context::AdminContext::new(
        Arc::new(HostedAuthClient::new(config.clone())),
        Arc::new(HostedRestStore::new(config)),
        settings,
    );

    let app = gatehouse_api::app::build_router(ctx);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
    Ok(())
}
