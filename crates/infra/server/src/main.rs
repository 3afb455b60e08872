//! Outbox relay binary.

use outbox_relay_server::{init_tracing, load_from_env, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = load_from_env()?;

    // Initialize tracing
    init_tracing(&config.server.log_level);

    // Create and run server
    let server = RelayServer::new(config);
    server.run().await?;

    Ok(())
}
