use crate::error::{Error, Result};
use crate::webhook::CapturedMessage;

/// Text sent to the webhook when a message carries no readable text.
pub const MEDIA_PLACEHOLDER: &str = "[Mídia sem texto]";

const GROUP_SERVER: &str = "g.us";

/// Whether an upsert carries live messages or a history backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Live delivery; the only kind that gets captured.
    Notify,
    /// Backfill of already-seen history.
    Append,
}

/// Text-bearing parts of a message. Everything else (stickers, audio,
/// documents) leaves all fields empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text: Option<String>,
    pub image_caption: Option<String>,
    pub video_caption: Option<String>,
}

/// One inbound message as reported by the session adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat JID, e.g. `5511999999999@s.whatsapp.net`.
    pub remote_jid: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    /// `None` for protocol-only stubs (receipts, key distribution, ...).
    pub content: Option<MessageContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FromMe,
    Group,
    OwnNumber,
    NoContent,
}

/// User part of a JID: `5511999999999:12@s.whatsapp.net` -> `5511999999999`.
pub fn jid_user(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or_default();
    user.split(':').next().unwrap_or_default()
}

pub fn is_group_jid(jid: &str) -> bool {
    jid.split_once('@')
        .is_some_and(|(_, server)| server == GROUP_SERVER)
}

/// First non-empty text among conversation, extended text, image caption and
/// video caption, else [`MEDIA_PLACEHOLDER`].
pub fn extract_text(content: &MessageContent) -> String {
    [
        &content.conversation,
        &content.extended_text,
        &content.image_caption,
        &content.video_caption,
    ]
    .into_iter()
    .flatten()
    .find(|text| !text.is_empty())
    .cloned()
    .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string())
}

impl InboundMessage {
    /// Why this message must not be captured, if at all.
    ///
    /// `own_number` is the account holder's user part, when known.
    pub fn skip_reason(&self, own_number: Option<&str>) -> Option<SkipReason> {
        if self.from_me {
            return Some(SkipReason::FromMe);
        }
        if is_group_jid(&self.remote_jid) {
            return Some(SkipReason::Group);
        }
        if let Some(own) = own_number
            && !own.is_empty()
            && jid_user(&self.remote_jid) == own
        {
            return Some(SkipReason::OwnNumber);
        }
        if self.content.is_none() {
            return Some(SkipReason::NoContent);
        }
        None
    }

    /// Build the webhook record. Callers filter with [`skip_reason`](Self::skip_reason) first.
    pub fn to_record(&self) -> Result<CapturedMessage> {
        let number = jid_user(&self.remote_jid);
        if number.is_empty() {
            return Err(Error::InvalidJid(self.remote_jid.clone()));
        }

        let name = self
            .push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(number);

        let first_message = self
            .content
            .as_ref()
            .map(extract_text)
            .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string());

        Ok(CapturedMessage {
            name: name.to_string(),
            number: number.to_string(),
            first_message,
        })
    }
}
