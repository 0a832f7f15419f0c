use super::{CloseReason, SessionAdapter, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// At most one pending reconnect. Scheduling again or cancelling drops the
/// previous one before it fires.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    pending: Option<CancellationToken>,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// Restart the session after `delay`, replacing any pending reconnect.
    ///
    /// A failed restart is fed back as `Closed(ConnectionLost)` so the
    /// supervisor schedules the next attempt.
    pub fn schedule(
        &mut self,
        delay: Duration,
        adapter: Arc<dyn SessionAdapter>,
        events: mpsc::Sender<SessionEvent>,
    ) {
        self.cancel();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Fired: no longer pending.
            cancelled.cancel();

            tracing::info!("Session: reconnecting");
            adapter.stop().await;
            if let Err(e) = adapter.start(events.clone()).await {
                tracing::error!("Session: reconnect failed: {}", e);
                let reason = CloseReason::ConnectionLost(e.to_string());
                let _ = events.send(SessionEvent::Closed(reason)).await;
            }
        });

        self.pending = Some(token);
    }
}
