// The streaming half of the transport: GET /sse.
//
// Connecting here moves the session from Idle to StreamOpen: the registry
// allocates an id, and the very first event tells the client where to POST
// requests and which session id correlates them with this stream. The client
// cannot race the handshake - it does not know the id until the event arrives.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::session::{OutboundMessage, SessionId, SessionRegistry};
use crate::http::routes::AppState;

/// GET /sse - establish the long-lived server-to-client stream.
pub async fn sse_handler(State(state): State<AppState>) -> Sse<KeepAliveStream<SessionStream>> {
    let (session_id, rx) = state.registry.open();

    let stream = SessionStream {
        registry: Arc::clone(&state.registry),
        endpoint: Some(format!("/messages?sessionId={session_id}")),
        session_id,
        rx: ReceiverStream::new(rx),
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Event stream for one session: the handshake event first, then whatever
/// the registry pushes, until the channel closes.
///
/// Dropping this stream - client disconnect, server shutdown, or a transport
/// error - is the unrecoverable end of the session, so the registry entry is
/// released in `Drop`. That reaches the Closed state no matter which path
/// got us there.
pub struct SessionStream {
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
    endpoint: Option<String>,
    rx: ReceiverStream<OutboundMessage>,
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(endpoint) = this.endpoint.take() {
            return Poll::Ready(Some(Ok(Event::default().event("endpoint").data(endpoint))));
        }

        match Pin::new(&mut this.rx).poll_next(cx) {
            Poll::Ready(Some(message)) => Poll::Ready(Some(Ok(Event::default()
                .event("message")
                .data(message.to_string())))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.registry.close(&self.session_id);
    }
}
