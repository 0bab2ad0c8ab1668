// This is the session registry - it tracks which client streams are alive.
//
// A "session" is one long-lived server-to-client stream plus the opaque id
// the client uses to tag requests on the side channel. The registry owns the
// whole lifecycle: it mints the id, holds the write half of the stream, and
// removes the entry on close or on the first failed write.
//
// The registry hands out plain mpsc channel ends; the HTTP layer decides how
// to turn the receiving half into an actual event stream.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// How many outbound messages may queue per session before the session is
/// considered dead. A healthy client drains the stream far faster than the
/// proxy produces responses, so a full buffer means nobody is reading.
const OUTBOUND_BUFFER: usize = 32;

/// Opaque identifier for one live client connection.
///
/// Generated server-side at stream-open time; the client learns it from the
/// handshake event and echoes it back on every side-channel request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an id received from the wire (e.g. the `sessionId` query param).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message pushed down a session's stream: an already-serialized JSON-RPC
/// response. The registry does not inspect it.
pub type OutboundMessage = serde_json::Value;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The id is absent from the registry - never opened, or already closed.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The client's receiving half is gone. The registry has already evicted
    /// the entry by the time this is returned.
    #[error("session {0} stream closed")]
    StreamClosed(SessionId),
}

struct SessionEntry {
    tx: mpsc::Sender<OutboundMessage>,
    opened_at: DateTime<Utc>,
}

/// In-memory mapping from session id to the write half of its stream.
///
/// Constructed once in `main` and shared via `Arc` - deliberately not a
/// process global, so tests can build a fresh one per case.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Allocate a fresh session: a unique id plus the receiving half of its
    /// outbound stream. The write half stays in the registry.
    pub fn open(&self) -> (SessionId, mpsc::Receiver<OutboundMessage>) {
        let id = SessionId::generate();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                tx,
                opened_at: Utc::now(),
            },
        );
        tracing::info!(
            session_id = %id,
            open_sessions = self.sessions.len(),
            "session opened"
        );
        (id, rx)
    }

    /// Is this id bound to a live stream right now? Non-blocking.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Push one message down a session's stream.
    ///
    /// Never blocks. A closed receiver means the client disconnected; a full
    /// buffer means the client stopped reading. Both are treated as an
    /// implicit close: the entry is evicted and subsequent lookups for the
    /// same id miss. Without the eviction, a stalled stream would pin every
    /// dispatch task that tries to answer on it.
    pub fn send(&self, id: &SessionId, message: OutboundMessage) -> Result<(), SessionError> {
        // Clone the sender out of the map first: `close` below removes the
        // same key, and dashmap deadlocks on remove-under-read of one shard.
        let tx = match self.sessions.get(id) {
            Some(entry) => entry.tx.clone(),
            None => return Err(SessionError::NotFound(id.clone())),
        };

        if let Err(err) = tx.try_send(message) {
            match err {
                TrySendError::Full(_) => {
                    tracing::warn!(session_id = %id, "stream buffer full, closing session")
                }
                TrySendError::Closed(_) => {
                    tracing::warn!(session_id = %id, "stream write failed, closing session")
                }
            }
            self.close(id);
            return Err(SessionError::StreamClosed(id.clone()));
        }
        Ok(())
    }

    /// Mark a session closed and release its stream.
    ///
    /// Idempotent: closing an unknown or already-closed session is a no-op.
    pub fn close(&self, id: &SessionId) {
        if let Some((_, entry)) = self.sessions.remove(id) {
            tracing::info!(
                session_id = %id,
                opened_at = %entry.opened_at,
                open_sessions = self.sessions.len(),
                "session closed"
            );
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
