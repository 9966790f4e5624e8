//! Wire protocol for the knock-knock dialogue.
//!
//! The protocol is plain text: `\n`-terminated lines, UTF-8, `\r` tolerated.
//! Lines containing the `<input>` marker expect exactly one reply line from
//! the peer; every other line is informational. This module owns the literal
//! server lines and the reply matcher so the dialogue engine never hand-rolls
//! protocol text.

/// Marker embedded in any server line that expects one reply line.
pub const INPUT_MARKER: &str = "<input>";

/// Opening prompt of every joke exchange.
pub const KNOCK_PROMPT: &str = "Knock knock! <input>";

/// The reply expected after the knock prompt.
pub const WHO_IS_THERE: &str = "Who's there?";

/// Continuation prompt sent after each delivered punchline.
pub const ANOTHER_PROMPT: &str = "Would you like to listen to another? (Y/N) <input>";

/// Reminder sent when the continuation reply is neither yes nor no.
pub const YN_REMINDER: &str = "Please reply with Y or N.";

/// Sent when every catalog entry has been told to this session.
pub const NO_MORE_JOKES: &str = "I have no more jokes to tell.";

/// The setup line of a joke, expecting the `"<setup> who?"` reply.
pub fn setup_prompt(setup: &str) -> String {
    format!("{setup} {INPUT_MARKER}")
}

/// The reply expected after a setup prompt.
pub fn who_ack(setup: &str) -> String {
    format!("{setup} who?")
}

/// Correction line naming the exact expected reply.
pub fn correction(expected: &str) -> String {
    format!("You are supposed to say, \"{expected}\". Let's try again.")
}

/// Reply comparison: case-insensitive after trimming surrounding whitespace.
/// Spelling-sensitive; there is no fuzzy matching.
pub fn replies_match(reply: &str, expected: &str) -> bool {
    reply.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// Affirmative continuation reply (`Y` or `yes`, any case).
pub fn is_yes(reply: &str) -> bool {
    replies_match(reply, "y") || replies_match(reply, "yes")
}

/// Negative continuation reply (`N` or `no`, any case).
pub fn is_no(reply: &str) -> bool {
    replies_match(reply, "n") || replies_match(reply, "no")
}
