//! The per-joke dialogue engine.
//!
//! Drives one complete knock-knock exchange against a session:
//!
//! ```text
//! Select -> AwaitKnockAck -> AwaitWhoAck -> Delivered
//! ```
//!
//! A wrong reply never ends the exchange. In `AwaitKnockAck` the server
//! corrects and re-prompts in place; in `AwaitWhoAck` it corrects and
//! restarts the whole knock/who exchange for the same joke. Restarts are
//! explicit loops, so a client answering wrong forever costs no stack.

use rand::seq::IndexedRandom;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

use crate::catalog::Catalog;
use crate::protocol;
use crate::session::Session;

/// How a single joke run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JokeOutcome {
    /// Punchline delivered.
    Completed,
    /// Every catalog entry has already been told to this session.
    Exhausted,
    /// Read or write failed; the session is over.
    ConnectionLost,
}

/// Tell one joke to completion.
///
/// Picks uniformly at random among the jokes this session has not heard.
/// The chosen index goes into `told` before the first prompt, so mid-joke
/// restarts cannot re-select it.
pub async fn run_joke<S>(catalog: &Catalog, session: &mut Session<S>) -> JokeOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let untold: Vec<usize> = (0..catalog.len())
        .filter(|index| !session.told.contains(index))
        .collect();

    let Some(&index) = untold.choose(&mut session.rng) else {
        let _ = session.send(protocol::NO_MORE_JOKES).await;
        return JokeOutcome::Exhausted;
    };
    session.told.insert(index);

    let joke = catalog.get(index);
    let setup_prompt = protocol::setup_prompt(&joke.setup);
    let who_ack = protocol::who_ack(&joke.setup);
    trace!(index, setup = %joke.setup, "Selected joke");

    // One iteration per knock/who attempt; a wrong second reply starts the
    // next iteration with the same joke.
    loop {
        // AwaitKnockAck: correct and re-prompt in place until the client
        // answers "Who's there?".
        if !session.send(protocol::KNOCK_PROMPT).await {
            return JokeOutcome::ConnectionLost;
        }
        loop {
            let Some(reply) = session.recv().await else {
                return JokeOutcome::ConnectionLost;
            };
            if protocol::replies_match(&reply, protocol::WHO_IS_THERE) {
                break;
            }
            if !session.send(&protocol::correction(protocol::WHO_IS_THERE)).await {
                return JokeOutcome::ConnectionLost;
            }
            if !session.send(protocol::KNOCK_PROMPT).await {
                return JokeOutcome::ConnectionLost;
            }
        }

        // AwaitWhoAck: a wrong reply restarts the whole exchange.
        if !session.send(&setup_prompt).await {
            return JokeOutcome::ConnectionLost;
        }
        let Some(reply) = session.recv().await else {
            return JokeOutcome::ConnectionLost;
        };
        if !protocol::replies_match(&reply, &who_ack) {
            if !session.send(&protocol::correction(&who_ack)).await {
                return JokeOutcome::ConnectionLost;
            }
            continue;
        }

        // Delivered.
        if !session.send(&joke.punchline).await {
            return JokeOutcome::ConnectionLost;
        }
        return JokeOutcome::Completed;
    }
}
