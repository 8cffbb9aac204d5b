use mcp_chat_bridge::config::ServerConfig;
use mcp_chat_bridge::server::McpServer;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("mcp-chat-bridge: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let server = match McpServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("mcp-chat-bridge: startup error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("mcp-chat-bridge: fatal error: {e}");
        std::process::exit(1);
    }
}

/// Human-readable logs on stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
