use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Main-method of the server.
/// Parses command-line arguments, binds both sockets and runs until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::parse();

    info!(
        "Starting server on {} (TCP) and {} (UDP) at {} Hz",
        config.tcp_addr(),
        config.udp_addr(),
        config.tick_rate
    );

    let mut server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind server sockets: {}", e);
            return Err(e);
        }
    };

    let handle = server.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                handle.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    Ok(())
}
