use wsrelay_config::ConfigManager;
use wsrelay_observability::LogManager;
use wsrelay_server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // built-in defaults apply when ~/.wsrelay/config.json does not exist
    let manager = ConfigManager::load_default().await?;
    let config = manager.config().clone();

    let _logs = LogManager::init(&config.logging)?;
    tracing::info!("Config loaded from {:?}", manager.path());

    // ring is the only provider compiled in; install it for wss:// upstreams
    let _ = rustls::crypto::ring::default_provider().install_default();

    run_server(config).await
}
