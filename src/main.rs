//! Pairwire 시그널링 서버

use pairwire_signaling::{config::Config, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 로깅 초기화 (RUST_LOG 우선)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = server::run(config).await {
        tracing::error!(error = ?e, "Server stopped with error");
        std::process::exit(1);
    }
}
