//! Messaging Session
//!
//! The protocol client (pairing, encryption, transport) is an external
//! collaborator behind [`SessionAdapter`]. Adapters push [`SessionEvent`]s
//! into a channel; the [`SessionSupervisor`] consumes them one at a time,
//! drives the connection status and reconnects after recoverable drops.

mod reconnect;
mod supervisor;

pub use reconnect::ReconnectTimer;
pub use supervisor::SessionSupervisor;

use crate::capture::{BatchKind, InboundMessage};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Why the session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The account unlinked this device; a new pairing is required.
    LoggedOut,
    /// Any recoverable drop (network, stream error, server restart).
    ConnectionLost(String),
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Pairing code ready to be shown as a QR image.
    QrAvailable(String),
    Connected,
    Closed(CloseReason),
    /// Credentials changed and should be persisted.
    CredentialsChanged,
    MessageBatch {
        kind: BatchKind,
        messages: Vec<InboundMessage>,
    },
}

/// Capability exposed by a messaging protocol client.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Open a session and begin emitting events on `events`.
    ///
    /// Returns once the connection attempt is under way; the outcome is
    /// reported as [`SessionEvent::Connected`] or [`SessionEvent::Closed`].
    async fn start(&self, events: mpsc::Sender<SessionEvent>) -> Result<()>;

    /// Tear down the current session, if any. Must be safe to call twice.
    async fn stop(&self);

    /// JID of the logged-in account, once known.
    async fn account_id(&self) -> Option<String>;

    /// Persist the current credentials.
    async fn save_credentials(&self) -> Result<()> {
        Ok(())
    }
}

const QR_IMAGE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/?size=400x400&data=";

/// Image URL rendering `code` as a 400x400 QR code.
pub fn qr_image_url(code: &str) -> String {
    format!("{}{}", QR_IMAGE_ENDPOINT, urlencoding::encode(code))
}
