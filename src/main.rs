//! jokebox: a multi-client knock-knock joke server
//!
//! Clients connect over TCP and are walked through a scripted knock-knock
//! dialogue, one line per turn:
//!
//! ```text
//! Server: Knock knock! <input>
//! Client: Who's there?
//! Server: <setup> <input>
//! Client: <setup> who?
//! Server: <punchline>
//! Server: Would you like to listen to another? (Y/N) <input>
//! ```
//!
//! Features:
//! - Wrong replies are corrected in-band and the joke restarts; the session
//!   never terminates over a protocol mistake
//! - Jokes are picked at random without repeats per session
//! - One concurrent task per client, unbounded by anything but the OS
//! - Automatic shutdown after a sustained period with no sessions
//! - Configuration via CLI arguments or TOML file

mod catalog;
mod config;
mod dialogue;
mod protocol;
mod server;
mod session;
mod transport;

use catalog::Catalog;
use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // An empty or unreadable catalog is fatal before any connection.
    let catalog = Catalog::load(&config.jokes_path)?;

    info!(
        listen = %config.listen,
        jokes = catalog.len(),
        idle_grace_secs = config.idle_grace,
        "Starting jokebox server"
    );

    let server = Server::new(config, catalog);

    // SIGINT/SIGTERM stop the accept loop; in-flight sessions finish.
    let cancel = server.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing in-flight sessions");
        cancel.cancel();
    });

    server.run().await?;
    info!("Server shut down");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
