//! Message Capture
//!
//! Turns inbound message batches into webhook records: drops history
//! backfills, self-sent messages, group chats, messages to the account's own
//! number and empty stubs, then forwards each remaining contact and counts it.

mod message;

pub use message::{
    BatchKind, InboundMessage, MEDIA_PLACEHOLDER, MessageContent, SkipReason, extract_text,
    is_group_jid, jid_user,
};

use crate::error::Result;
use crate::status::StatusTracker;
use crate::webhook::WebhookForwarder;
use chrono::Utc;
use std::sync::Arc;

/// Counts from one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub captured: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Forwards captured contacts and updates the capture counters.
#[derive(Clone)]
pub struct MessageHandler {
    forwarder: WebhookForwarder,
    status: Arc<StatusTracker>,
}

impl MessageHandler {
    pub fn new(forwarder: WebhookForwarder, status: Arc<StatusTracker>) -> Self {
        Self { forwarder, status }
    }

    /// Process one upsert. Only [`BatchKind::Notify`] batches are captured.
    ///
    /// `account_id` is the logged-in account's JID, used to drop messages
    /// addressed to the operator's own number.
    pub async fn handle_batch(
        &self,
        kind: BatchKind,
        messages: &[InboundMessage],
        account_id: Option<&str>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        if kind != BatchKind::Notify {
            tracing::debug!("Capture: ignoring {} backfilled message(s)", messages.len());
            return report;
        }

        let own_number = account_id.map(jid_user);

        for msg in messages {
            if let Some(reason) = msg.skip_reason(own_number) {
                tracing::debug!("Capture: skipping message from {} ({:?})", msg.remote_jid, reason);
                report.skipped += 1;
                continue;
            }

            match self.capture(msg).await {
                Ok(()) => report.captured += 1,
                Err(e) => {
                    tracing::error!("Capture: failed to process message from {}: {}", msg.remote_jid, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn capture(&self, msg: &InboundMessage) -> Result<()> {
        let record = msg.to_record()?;
        let captured_at = Utc::now();

        let preview: String = record.first_message.chars().take(50).collect();
        tracing::info!(
            "Capture: new contact {} ({}): {}",
            record.name,
            record.number,
            preview
        );

        // Counted once per message whatever the delivery outcome; redelivery runs detached.
        self.forwarder.forward(&record).await;
        self.status.record_capture(captured_at).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::RetryPolicy;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    const ACCOUNT: &str = "5511000000000:7@s.whatsapp.net";

    fn text_message(jid: &str, name: &str, text: &str) -> InboundMessage {
        InboundMessage {
            remote_jid: jid.to_string(),
            from_me: false,
            push_name: Some(name.to_string()),
            content: Some(MessageContent {
                conversation: Some(text.to_string()),
                ..Default::default()
            }),
        }
    }

    fn handler(url: String, max_retries: u32) -> (MessageHandler, Arc<StatusTracker>) {
        let policy = RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(20),
        };
        let forwarder =
            WebhookForwarder::new(url, "test-agent", Duration::from_secs(5), policy).unwrap();
        let status = Arc::new(StatusTracker::new());
        (MessageHandler::new(forwarder, status.clone()), status)
    }

    #[tokio::test]
    async fn test_history_batch_is_ignored() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/hook").expect(0).create_async().await;
        let (handler, status) = handler(format!("{}/hook", server.url()), 0);

        let batch = vec![text_message("5511999999999@s.whatsapp.net", "Ana", "Hi")];
        let report = handler.handle_batch(BatchKind::Append, &batch, Some(ACCOUNT)).await;

        assert_eq!(report, BatchReport::default());
        assert_eq!(status.snapshot().await.total_messages_captured, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_filtered_messages_never_reach_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/hook").expect(0).create_async().await;
        let (handler, status) = handler(format!("{}/hook", server.url()), 0);

        let mut from_me = text_message("5511999999999@s.whatsapp.net", "Ana", "Hi");
        from_me.from_me = true;
        let group = text_message("120363025246125486@g.us", "Group", "Hello all");
        let own = text_message("5511000000000@s.whatsapp.net", "Me", "note to self");
        let mut stub = text_message("5511777777777@s.whatsapp.net", "Bo", "");
        stub.content = None;

        let report = handler
            .handle_batch(BatchKind::Notify, &[from_me, group, own, stub], Some(ACCOUNT))
            .await;

        assert_eq!(report.skipped, 4);
        assert_eq!(report.captured, 0);
        assert_eq!(status.snapshot().await.total_messages_captured, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_successful_capture_updates_counters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(json!({
                "name": "Ana",
                "number": "5511999999999",
                "firstMessage": "Hi"
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let (handler, status) = handler(format!("{}/hook", server.url()), 0);

        let before = Utc::now();
        let batch = vec![text_message("5511999999999@s.whatsapp.net", "Ana", "Hi")];
        let report = handler.handle_batch(BatchKind::Notify, &batch, Some(ACCOUNT)).await;

        assert_eq!(report.captured, 1);
        let snapshot = status.snapshot().await;
        assert_eq!(snapshot.total_messages_captured, 1);
        let last = snapshot.last_message_time.expect("capture time recorded");
        assert!(last >= before && last <= Utc::now());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_delivery_still_counted_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let (handler, status) = handler(format!("{}/hook", server.url()), 1);

        let batch = vec![text_message("5511999999999@s.whatsapp.net", "Ana", "Hi")];
        handler.handle_batch(BatchKind::Notify, &batch, Some(ACCOUNT)).await;
        assert_eq!(status.snapshot().await.total_messages_captured, 1);

        // Let the detached retry run; the counter must not move again.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(status.snapshot().await.total_messages_captured, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_message_does_not_abort_batch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let (handler, status) = handler(format!("{}/hook", server.url()), 0);

        let batch = vec![
            text_message("@s.whatsapp.net", "Nobody", "?"),
            text_message("5511999999999@s.whatsapp.net", "Ana", "Hi"),
        ];
        let report = handler.handle_batch(BatchKind::Notify, &batch, None).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.captured, 1);
        assert_eq!(status.snapshot().await.total_messages_captured, 1);
        mock.assert_async().await;
    }
}
