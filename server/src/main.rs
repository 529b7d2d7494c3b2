use marble_server::config::ServerConfig;
use marble_server::ws::{router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        tracing::error!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let app = router(AppState::new(&config));

    tracing::info!("Starting marble server on {}", config.listen_addr);
    println!("Marble server listening on {}", config.listen_addr);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
