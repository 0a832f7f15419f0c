use crate::capture::{BatchKind, InboundMessage, MessageContent};
use crate::error::{Error, Result};
use crate::session::{CloseReason, SessionAdapter, SessionEvent};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use waproto::whatsapp as wa;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

const SESSION_DB: &str = "session.db";

/// WhatsApp Web session persisted to `<auth_dir>/session.db`.
///
/// An existing store reconnects silently; a fresh one emits a pairing QR.
pub struct WhatsAppSession {
    db_path: PathBuf,
    client: Arc<Mutex<Option<Arc<Client>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppSession {
    pub fn new(auth_dir: &Path) -> Self {
        Self {
            db_path: auth_dir.join(SESSION_DB),
            client: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionAdapter for WhatsAppSession {
    async fn start(&self, events: mpsc::Sender<SessionEvent>) -> Result<()> {
        let backend = SqliteStore::new(self.db_path.to_string_lossy().as_ref())
            .await
            .map_err(|e| Error::Session(format!("failed to open session store: {e}")))?;

        let client_slot = self.client.clone();
        let mut bot = Bot::builder()
            .with_backend(Arc::new(backend))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, client| {
                let events = events.clone();
                let client_slot = client_slot.clone();
                async move {
                    if let Some(event) = translate(event, client, &client_slot).await
                        && events.send(event).await.is_err()
                    {
                        tracing::debug!("WhatsApp: supervisor gone, dropping event");
                    }
                }
            })
            .build()
            .await
            .map_err(|e| Error::Session(format!("failed to build client: {e}")))?;

        let handle = bot
            .run()
            .await
            .map_err(|e| Error::Session(format!("failed to start client: {e}")))?;

        tracing::info!("WhatsApp: client started (store {})", self.db_path.display());
        if let Some(previous) = self.task.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            client.disconnect().await;
        }
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }

    async fn account_id(&self) -> Option<String> {
        let client = self.client.lock().await.clone()?;
        client.get_pn().await.map(|jid| jid.to_string())
    }
}

async fn translate(
    event: Event,
    client: Arc<Client>,
    client_slot: &Mutex<Option<Arc<Client>>>,
) -> Option<SessionEvent> {
    // Held until `stop` so the session can be closed cleanly.
    client_slot.lock().await.get_or_insert(client);

    match event {
        Event::PairingQrCode { ref code, .. } => {
            tracing::info!("WhatsApp: QR code available (scan with your phone)");
            print_terminal_qr(code);
            Some(SessionEvent::QrAvailable(code.clone()))
        }
        Event::PairSuccess(_) => {
            tracing::info!("WhatsApp: pairing successful");
            Some(SessionEvent::CredentialsChanged)
        }
        Event::Connected(_) => Some(SessionEvent::Connected),
        Event::LoggedOut(_) => Some(SessionEvent::Closed(CloseReason::LoggedOut)),
        Event::Disconnected(_) => Some(SessionEvent::Closed(CloseReason::ConnectionLost(
            "disconnected from WhatsApp".to_string(),
        ))),
        Event::Message(msg, info) => Some(SessionEvent::MessageBatch {
            kind: BatchKind::Notify,
            messages: vec![inbound_message(&msg, &info)],
        }),
        _ => None,
    }
}

fn inbound_message(msg: &wa::Message, info: &MessageInfo) -> InboundMessage {
    InboundMessage {
        remote_jid: info.source.chat.to_string(),
        from_me: info.source.is_from_me,
        push_name: Some(info.push_name.clone()).filter(|n| !n.is_empty()),
        content: message_body(msg),
    }
}

/// Readable content, or `None` for protocol-only payloads (key distribution,
/// revokes, history sync notices) that carry nothing for the webhook.
fn message_body(msg: &wa::Message) -> Option<MessageContent> {
    let mut payload = msg.clone();
    payload.protocol_message = None;
    payload.sender_key_distribution_message = None;
    payload.message_context_info = None;
    (payload != wa::Message::default()).then(|| message_content(msg))
}

fn message_content(msg: &wa::Message) -> MessageContent {
    MessageContent {
        conversation: msg.conversation.clone(),
        extended_text: msg
            .extended_text_message
            .as_ref()
            .and_then(|m| m.text.clone()),
        image_caption: msg.image_message.as_ref().and_then(|m| m.caption.clone()),
        video_caption: msg.video_message.as_ref().and_then(|m| m.caption.clone()),
    }
}

fn print_terminal_qr(code: &str) {
    match qrcode::QrCode::new(code.as_bytes()) {
        Ok(qr) => {
            let rendered = qr
                .render::<qrcode::render::unicode::Dense1x2>()
                .quiet_zone(true)
                .build();
            println!("\n{rendered}\n");
        }
        Err(e) => tracing::warn!("WhatsApp: could not render QR in terminal: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MEDIA_PLACEHOLDER, SkipReason, extract_text};

    fn inbound(msg: &wa::Message) -> InboundMessage {
        InboundMessage {
            remote_jid: "5511999999999@s.whatsapp.net".to_string(),
            from_me: false,
            push_name: Some("Ana".to_string()),
            content: message_body(msg),
        }
    }

    #[test]
    fn test_empty_message_is_skipped() {
        let msg = inbound(&wa::Message::default());
        assert!(msg.content.is_none());
        assert_eq!(msg.skip_reason(None), Some(SkipReason::NoContent));
    }

    #[test]
    fn test_media_message_is_captured() {
        let msg = inbound(&wa::Message {
            image_message: Some(Box::new(wa::message::ImageMessage::default())),
            ..Default::default()
        });
        assert_eq!(msg.skip_reason(None), None);
        assert_eq!(msg.to_record().unwrap().first_message, MEDIA_PLACEHOLDER);
    }

    #[test]
    fn test_message_content_prefers_conversation() {
        let msg = wa::Message {
            conversation: Some("Oi".to_string()),
            image_message: Some(Box::new(wa::message::ImageMessage {
                caption: Some("photo".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(extract_text(&message_content(&msg)), "Oi");
    }

    #[test]
    fn test_message_content_reads_captions() {
        let msg = wa::Message {
            video_message: Some(Box::new(wa::message::VideoMessage {
                caption: Some("clip".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let content = message_content(&msg);
        assert_eq!(content.video_caption.as_deref(), Some("clip"));
        assert_eq!(extract_text(&content), "clip");
    }

    #[test]
    fn test_media_without_caption_uses_placeholder() {
        let msg = wa::Message {
            image_message: Some(Box::new(wa::message::ImageMessage::default())),
            ..Default::default()
        };
        assert_eq!(extract_text(&message_content(&msg)), MEDIA_PLACEHOLDER);
    }

    #[test]
    fn test_session_db_lives_in_auth_dir() {
        let session = WhatsAppSession::new(Path::new("auth_info"));
        assert_eq!(session.db_path, Path::new("auth_info").join("session.db"));
    }
}
