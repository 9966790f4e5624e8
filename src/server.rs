//! TCP server for the knock-knock dialogue.
//!
//! Accepts connections and spawns one task per client, each running the
//! session loop to completion. The accept loop multiplexes three events:
//! an external shutdown request, a one-second housekeeping tick that feeds
//! the idle-shutdown timer, and the accept itself. Shutdown of either kind
//! stops accepting but lets in-flight sessions finish.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::session::{run_session, Session};

/// Interval between housekeeping passes of the accept loop.
const TICK: Duration = Duration::from_secs(1);

/// How often the drain loop re-checks the live-session count.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Server instance
pub struct Server {
    config: Config,
    catalog: Arc<Catalog>,
    active_sessions: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config, catalog: Catalog) -> Self {
        Server {
            config,
            catalog: Arc::new(catalog),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the accept loop when cancelled. In-flight sessions
    /// are never severed; the server exits once they finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bind the configured endpoint and serve until shutdown.
    pub async fn run(&self) -> io::Result<()> {
        let listener = bind_listener(&self.config.listen, self.config.backlog)?;
        info!(
            address = %self.config.listen,
            backlog = self.config.backlog,
            "Server listening"
        );
        self.serve(listener).await;
        Ok(())
    }

    /// Accept loop. Returns after a shutdown request or an idle timeout,
    /// once every live session has drained.
    async fn serve(&self, listener: TcpListener) {
        let mut idle = IdleTimer::new(Duration::from_secs(self.config.idle_grace));
        let mut tick = tokio::time::interval(TICK);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, waiting for sessions to finish");
                    break;
                }

                _ = tick.tick() => {
                    let active = self.active_sessions.load(Ordering::SeqCst);
                    if idle.check(active, Instant::now()) {
                        info!(
                            grace_secs = self.config.idle_grace,
                            "No sessions for the grace period, shutting down"
                        );
                        break;
                    }
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            idle.reset();
                            self.spawn_session(stream, peer);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        // No new connections from here on.
        drop(listener);
        self.drain().await;
    }

    /// Launch the worker task for one accepted connection.
    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let catalog = Arc::clone(&self.catalog);
        let active = Arc::clone(&self.active_sessions);
        let idle_grace = self.config.idle_grace;

        let count = active.fetch_add(1, Ordering::SeqCst) + 1;
        info!(peer = %peer, active = count, "Client connected");

        tokio::spawn(async move {
            let mut session = Session::new(stream);
            run_session(&catalog, &mut session).await;

            let left = active.fetch_sub(1, Ordering::SeqCst) - 1;
            info!(peer = %peer, active = left, "Client disconnected");
            if left == 0 {
                info!(
                    grace_secs = idle_grace,
                    "No active sessions, idle shutdown armed"
                );
            }
        });
    }

    /// Wait for the live-session count to reach zero.
    async fn drain(&self) {
        while self.active_sessions.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}

/// Build the listening socket: reuse-addr, configured backlog, nonblocking,
/// handed to tokio. The backlog sizes the OS pending queue only; accepted
/// sessions are unbounded.
fn bind_listener(listen: &str, backlog: u32) -> io::Result<TcpListener> {
    let addr: SocketAddr = listen.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid listen address '{listen}': {e}"),
        )
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;

    TcpListener::from_std(socket.into())
}

/// Two-state idle timer: armed while the live-session count stays at zero,
/// cleared by any non-zero observation or an accepted connection.
struct IdleTimer {
    grace: Duration,
    zero_since: Option<Instant>,
}

impl IdleTimer {
    fn new(grace: Duration) -> Self {
        IdleTimer {
            grace,
            zero_since: None,
        }
    }

    /// Stop the timer. Called when a connection is accepted.
    fn reset(&mut self) {
        self.zero_since = None;
    }

    /// Observe the live-session count at `now`. True once the count has
    /// been zero for the full grace period.
    fn check(&mut self, active: usize, now: Instant) -> bool {
        if active > 0 {
            self.zero_since = None;
            return false;
        }
        match self.zero_since {
            None => {
                self.zero_since = Some(now);
                false
            }
            Some(since) => now.duration_since(since) >= self.grace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Joke;
    use crate::protocol;
    use crate::transport::LineStream;
    use tokio::task::JoinHandle;

    fn one_joke_catalog() -> Catalog {
        Catalog::new(vec![Joke {
            setup: "Tank".to_string(),
            punchline: "You're welcome!".to_string(),
        }])
        .unwrap()
    }

    fn test_config(idle_grace: u64) -> Config {
        Config {
            listen: "127.0.0.1:0".to_string(),
            jokes_path: "jokes.toml".into(),
            backlog: 16,
            idle_grace,
            log_level: "info".to_string(),
        }
    }

    /// Bind an ephemeral port and run the accept loop in the background.
    fn start_server(
        catalog: Catalog,
        idle_grace: u64,
    ) -> (Arc<Server>, SocketAddr, JoinHandle<()>) {
        let server = Arc::new(Server::new(test_config(idle_grace), catalog));
        let listener = bind_listener("127.0.0.1:0", 16).unwrap();
        let addr = listener.local_addr().unwrap();

        let srv = Arc::clone(&server);
        let handle = tokio::spawn(async move { srv.serve(listener).await });
        (server, addr, handle)
    }

    async fn read(client: &mut LineStream<TcpStream>) -> String {
        client.read_line().await.unwrap().expect("unexpected EOF")
    }

    /// Answer one full joke correctly over a live connection.
    async fn complete_joke(client: &mut LineStream<TcpStream>) -> String {
        assert_eq!(read(client).await, protocol::KNOCK_PROMPT);
        client.write_line(protocol::WHO_IS_THERE).await.unwrap();

        let setup_line = read(client).await;
        let setup = setup_line.strip_suffix(" <input>").unwrap().to_string();
        client.write_line(&protocol::who_ack(&setup)).await.unwrap();

        read(client).await
    }

    #[test]
    fn test_idle_timer_arms_and_fires() {
        let mut timer = IdleTimer::new(Duration::from_secs(10));
        let start = Instant::now();

        // First zero observation arms the timer, nothing fires yet.
        assert!(!timer.check(0, start));
        assert!(!timer.check(0, start + Duration::from_secs(9)));
        // Grace elapsed with the count still zero.
        assert!(timer.check(0, start + Duration::from_secs(10)));
    }

    #[test]
    fn test_idle_timer_clears_on_activity() {
        let mut timer = IdleTimer::new(Duration::from_secs(10));
        let start = Instant::now();

        assert!(!timer.check(0, start));
        // A live session stops the countdown entirely.
        assert!(!timer.check(1, start + Duration::from_secs(9)));
        // Counting starts over from the next zero observation.
        assert!(!timer.check(0, start + Duration::from_secs(20)));
        assert!(!timer.check(0, start + Duration::from_secs(29)));
        assert!(timer.check(0, start + Duration::from_secs(30)));
    }

    #[test]
    fn test_idle_timer_reset_on_accept() {
        let mut timer = IdleTimer::new(Duration::from_secs(10));
        let start = Instant::now();

        assert!(!timer.check(0, start));
        timer.reset();
        assert!(!timer.check(0, start + Duration::from_secs(15)));
        assert!(timer.check(0, start + Duration::from_secs(25)));
    }

    #[test]
    fn test_bind_listener_rejects_bad_address() {
        let result = bind_listener("not-an-address", 16);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let (server, addr, handle) = start_server(one_joke_catalog(), 600);

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = LineStream::new(stream);

        let punchline = complete_joke(&mut client).await;
        assert_eq!(punchline, "You're welcome!");

        assert_eq!(read(&mut client).await, protocol::ANOTHER_PROMPT);
        client.write_line("N").await.unwrap();

        // The server closes without further lines.
        assert_eq!(client.read_line().await.unwrap(), None);

        server.cancel_token().cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (server, addr, handle) = start_server(one_joke_catalog(), 600);

        let run_client = |wrong_first: bool| async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut client = LineStream::new(stream);

            assert_eq!(read(&mut client).await, protocol::KNOCK_PROMPT);
            if wrong_first {
                // This client's mistake must not leak into the other session.
                client.write_line("Who there?").await.unwrap();
                assert_eq!(
                    read(&mut client).await,
                    protocol::correction(protocol::WHO_IS_THERE)
                );
                assert_eq!(read(&mut client).await, protocol::KNOCK_PROMPT);
            }
            client.write_line(protocol::WHO_IS_THERE).await.unwrap();

            let setup_line = read(&mut client).await;
            let setup = setup_line.strip_suffix(" <input>").unwrap().to_string();
            client.write_line(&protocol::who_ack(&setup)).await.unwrap();
            let punchline = read(&mut client).await;

            assert_eq!(read(&mut client).await, protocol::ANOTHER_PROMPT);
            client.write_line("no").await.unwrap();
            assert_eq!(client.read_line().await.unwrap(), None);
            punchline
        };

        let (a, b) = tokio::join!(run_client(true), run_client(false));
        assert_eq!(a, "You're welcome!");
        assert_eq!(b, "You're welcome!");

        server.cancel_token().cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_accepting() {
        let (server, addr, handle) = start_server(one_joke_catalog(), 600);

        server.cancel_token().cancel();
        handle.await.unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_idle_shutdown_after_grace() {
        let (_server, addr, handle) = start_server(one_joke_catalog(), 1);

        // A connection inside the grace period is accepted.
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = LineStream::new(stream);
        assert_eq!(read(&mut client).await, protocol::KNOCK_PROMPT);
        drop(client);

        // With zero sessions for the full grace period the server exits,
        // and a late connection attempt is refused.
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("server did not shut down after idle grace")
            .unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
