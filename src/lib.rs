//! Orchestrates the smtp-sink application startup and lifecycle.
//!
//! This library crate initializes configuration, starts the SMTP sink
//! server, and polls its capture queue until shutdown is requested.

pub mod config;
pub mod smtp;

use anyhow::Result;
use log::info;

/// Runs the smtp-sink application.
///
/// Loads configuration, starts the sink server, then polls the capture
/// queue until a `ctrl_c` signal arrives, printing each captured message
/// as it drains. Returns once the server has fully stopped.
///
/// # Errors
///
/// Returns an `Err` if configuration loading fails or the listener
/// cannot be bound.
pub async fn run() -> Result<()> {
    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = config::Config::from_env()?;
    let server = smtp::Server::start(config).await?;
    info!("smtp sink bound to port {}", server.port());

    let received = server.received();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, stopping smtp sink");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {
                while let Some(message) = received.poll() {
                    println!(
                        "received '{}' from: {} to: {}",
                        message.header_value("Subject").unwrap_or_default(),
                        message.header_value("From").unwrap_or_default(),
                        message.header_value("To").unwrap_or_default(),
                    );
                }
            }
        }
    }

    server.stop().await;
    Ok(())
}
