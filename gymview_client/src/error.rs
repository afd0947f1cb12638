//! Failure taxonomy for the client surface.

use thiserror::Error;

/// Errors surfaced by the HTTP collaborators and the session store.
///
/// Channel-side failures (malformed frames, transport errors, reconnect
/// exhaustion) never appear here: they degrade to logging and, for
/// exhaustion, a terminal event on the update queue.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP transport failed before the backend produced an answer.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend rejected the request ({status}): {detail}")]
    Backend { status: u16, detail: String },

    /// The operation requires an active session and none exists.
    #[error("no active training session")]
    NoSession,
}
