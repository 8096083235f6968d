use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = qraft_server::RuntimeConfig::from_env()?;
    let mut server = qraft_server::start_server_with_config(config).await?;
    tracing::info!(addr = %server.addr, "qraft_server listening");

    tokio::select! {
        result = server.serve() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("shutdown requested");
        }
    }
    server.shutdown().await
}
