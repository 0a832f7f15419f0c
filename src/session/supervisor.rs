use super::{CloseReason, ReconnectTimer, SessionAdapter, SessionEvent, qr_image_url};
use crate::capture::{MessageHandler, jid_user};
use crate::error::Result;
use crate::status::StatusTracker;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 256;

/// Owns the session lifecycle: applies events to the status tracker, hands
/// message batches to the capture handler and schedules reconnects.
pub struct SessionSupervisor {
    adapter: Arc<dyn SessionAdapter>,
    status: Arc<StatusTracker>,
    handler: MessageHandler,
    reconnect_delay: Duration,
}

impl SessionSupervisor {
    pub fn new(
        adapter: Arc<dyn SessionAdapter>,
        status: Arc<StatusTracker>,
        handler: MessageHandler,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            adapter,
            status,
            handler,
            reconnect_delay,
        }
    }

    /// Start the session and process its events until `shutdown` fires.
    ///
    /// Fails only when the very first start fails; later failures are retried.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        self.adapter.start(tx.clone()).await?;
        tracing::info!("Session: started, waiting for connection");

        let mut reconnect = ReconnectTimer::new();
        let mut batches = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event, &tx, &mut reconnect, &mut batches).await,
                    None => break,
                },
                Some(joined) = batches.join_next(), if !batches.is_empty() => {
                    match joined {
                        Ok(report) => tracing::debug!("Session: batch done {:?}", report),
                        Err(e) => tracing::error!("Session: message batch task failed: {}", e),
                    }
                }
            }
        }

        tracing::info!("Session: shutting down");
        reconnect.cancel();
        self.adapter.stop().await;
        while let Some(joined) = batches.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Session: message batch task failed: {}", e);
            }
        }
        Ok(())
    }

    async fn handle_event(
        &self,
        event: SessionEvent,
        events: &mpsc::Sender<SessionEvent>,
        reconnect: &mut ReconnectTimer,
        batches: &mut JoinSet<crate::capture::BatchReport>,
    ) {
        match event {
            SessionEvent::QrAvailable(code) => {
                self.status.set_awaiting_pairing(qr_image_url(&code)).await;
                tracing::info!("Session: QR code ready, open /qr to scan it");
            }
            SessionEvent::Connected => {
                reconnect.cancel();
                self.status.set_connected(Utc::now()).await;
                tracing::info!("Session: connected");
                if let Some(account) = self.adapter.account_id().await {
                    tracing::info!("Session: account number {}", jid_user(&account));
                }
            }
            SessionEvent::Closed(CloseReason::LoggedOut) => {
                reconnect.cancel();
                self.status.set_logged_out().await;
                tracing::error!("Session: logged out, scan a new QR code to pair again");
            }
            SessionEvent::Closed(CloseReason::ConnectionLost(reason)) => {
                self.status.set_disconnected().await;
                tracing::warn!(
                    "Session: connection closed ({}), reconnecting in {:.1}s",
                    reason,
                    self.reconnect_delay.as_secs_f64()
                );
                reconnect.schedule(self.reconnect_delay, self.adapter.clone(), events.clone());
            }
            SessionEvent::CredentialsChanged => {
                if let Err(e) = self.adapter.save_credentials().await {
                    tracing::error!("Session: failed to save credentials: {}", e);
                }
            }
            SessionEvent::MessageBatch { kind, messages } => {
                let handler = self.handler.clone();
                let account = self.adapter.account_id().await;
                batches.spawn(async move {
                    handler
                        .handle_batch(kind, &messages, account.as_deref())
                        .await
                });
            }
        }
    }
}
