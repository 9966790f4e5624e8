//! Per-connection session state and the conversation loop.
//!
//! A session owns its line stream, the set of joke indices already told to
//! this client, and a private random source. Sessions never share mutable
//! state with each other; the dialogue for one connection is strictly
//! sequential.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::catalog::Catalog;
use crate::dialogue::{self, JokeOutcome};
use crate::protocol;
use crate::transport::LineStream;

/// State for one client connection.
pub struct Session<S> {
    stream: LineStream<S>,
    /// Joke indices already told. Grows only; an index is inserted before
    /// the joke's first prompt, so a restarted joke is never re-picked.
    pub told: HashSet<usize>,
    /// Private random source for joke selection.
    pub rng: StdRng,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(stream: S) -> Self {
        Session {
            stream: LineStream::new(stream),
            told: HashSet::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Send one line. `false` means the connection is gone; the session
    /// must end, there is no retry.
    pub async fn send(&mut self, line: &str) -> bool {
        self.stream.write_line(line).await.is_ok()
    }

    /// Read one reply line. `None` on EOF or any I/O failure, both of
    /// which mean connection loss.
    pub async fn recv(&mut self) -> Option<String> {
        self.stream.read_line().await.ok().flatten()
    }
}

/// Drive one session to completion: jokes until the client declines, the
/// catalog runs dry, or the connection fails.
pub async fn run_session<S>(catalog: &Catalog, session: &mut Session<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match dialogue::run_joke(catalog, session).await {
            JokeOutcome::Completed => {}
            JokeOutcome::Exhausted => {
                debug!("Catalog exhausted, ending session");
                return;
            }
            JokeOutcome::ConnectionLost => {
                debug!("Connection lost mid-joke");
                return;
            }
        }

        // Ask until we get a valid Y/N; anything else re-prompts in place.
        loop {
            if !session.send(protocol::ANOTHER_PROMPT).await {
                return;
            }
            let Some(reply) = session.recv().await else {
                return;
            };

            if protocol::is_no(&reply) {
                debug!("Client declined another joke");
                return;
            }
            if protocol::is_yes(&reply) {
                break;
            }

            if !session.send(protocol::YN_REMINDER).await {
                return;
            }
        }
    }
}
