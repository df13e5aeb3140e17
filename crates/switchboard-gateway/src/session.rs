//! Per-client streaming sessions.
//!
//! A session is a one-way, status-only channel: a registry snapshot at open,
//! then periodic heartbeats. Tool call results never travel here — they go
//! back to whoever issued the call. Each session owns its own heartbeat task
//! and cancels it deterministically on close or drop; sessions never touch
//! in-flight tool calls.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use switchboard_types::{ProviderSummary, StreamEvent};

/// Buffered events per session. Heartbeats beyond this are dropped for a
/// stalled consumer rather than queued — delivery is best-effort.
const SESSION_BUFFER: usize = 16;

/// Handle to one open streaming session.
///
/// Dropping the handle (or the stream made from it) cancels the heartbeat
/// task; no event is emitted after close is observed.
pub struct StreamSession {
    id: String,
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl StreamSession {
    /// Open a session over the given registry snapshot. The `connection`
    /// event is already in the channel when this returns.
    pub fn open(snapshot: Vec<ProviderSummary>, heartbeat_interval: Duration) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, events) = mpsc::channel(SESSION_BUFFER);
        let cancel = CancellationToken::new();

        // Fresh channel with capacity > 0: this cannot fail.
        let _ = tx.try_send(StreamEvent::Connection {
            servers: snapshot,
            timestamp: Utc::now(),
        });

        tokio::spawn(heartbeat_loop(
            id.clone(),
            tx,
            heartbeat_interval,
            cancel.clone(),
        ));

        debug!(session = %id, "Streaming session opened");
        Self {
            id,
            events,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event on this session, or `None` once the session is closed
    /// and drained.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop the heartbeat task. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Adapt the session into a `Stream` of events (for the SSE surface).
    /// The session still cancels when the stream is dropped.
    pub fn into_stream(self) -> SessionStream {
        SessionStream {
            inner: ReceiverStream::new(self.events),
            _guard: self._guard,
        }
    }
}

/// Stream adapter over a session's events; cancels the session on drop.
pub struct SessionStream {
    inner: ReceiverStream<StreamEvent>,
    _guard: DropGuard,
}

impl Stream for SessionStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

async fn heartbeat_loop(
    session_id: String,
    tx: mpsc::Sender<StreamEvent>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the connection event already
    // covers "immediately", so consume it.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match tx.try_send(StreamEvent::Heartbeat { timestamp: Utc::now() }) {
                    Ok(()) => {}
                    // Consumer stalled: skip this beat rather than queue forever.
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }
    }

    debug!(session = %session_id, "Streaming session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_types::ProviderStatus;

    fn snapshot() -> Vec<ProviderSummary> {
        vec![ProviderSummary {
            id: "database".into(),
            name: "Database Provider".into(),
            status: ProviderStatus::Connected,
            tool_count: 4,
        }]
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_event_emitted_immediately() {
        let mut session = StreamSession::open(snapshot(), Duration::from_secs(30));

        match session.next_event().await {
            Some(StreamEvent::Connection { servers, .. }) => {
                assert_eq!(servers.len(), 1);
                assert_eq!(servers[0].id, "database");
            }
            other => panic!("expected connection event, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_after_interval() {
        let mut session = StreamSession::open(snapshot(), Duration::from_secs(30));

        let first = session.next_event().await;
        assert!(matches!(first, Some(StreamEvent::Connection { .. })));

        // Exactly one connection event: everything after is a heartbeat.
        let second = session.next_event().await;
        assert!(matches!(second, Some(StreamEvent::Heartbeat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timestamps_monotonic() {
        let mut session = StreamSession::open(snapshot(), Duration::from_secs(30));
        session.next_event().await; // connection

        let Some(StreamEvent::Heartbeat { timestamp: t1 }) = session.next_event().await else {
            panic!("expected heartbeat");
        };
        let Some(StreamEvent::Heartbeat { timestamp: t2 }) = session.next_event().await else {
            panic!("expected heartbeat");
        };
        assert!(t2 >= t1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_events_after_close() {
        let mut session = StreamSession::open(snapshot(), Duration::from_secs(30));
        session.next_event().await; // connection

        session.close();
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let mut a = StreamSession::open(snapshot(), Duration::from_secs(30));
        let mut b = StreamSession::open(snapshot(), Duration::from_secs(30));
        assert_ne!(a.id(), b.id());

        a.next_event().await; // connection
        b.next_event().await; // connection
        a.close();
        assert!(a.next_event().await.is_none());

        // b keeps beating after a closed
        assert!(matches!(
            b.next_event().await,
            Some(StreamEvent::Heartbeat { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_adapter_yields_events() {
        use futures::StreamExt;

        let session = StreamSession::open(snapshot(), Duration::from_secs(30));
        let mut stream = session.into_stream();

        let first = stream.next().await;
        assert!(matches!(first, Some(StreamEvent::Connection { .. })));
        let second = stream.next().await;
        assert!(matches!(second, Some(StreamEvent::Heartbeat { .. })));
    }
}
