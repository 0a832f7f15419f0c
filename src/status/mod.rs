//! Connection Status
//!
//! Process-wide record of the session phase and capture counters. Written by
//! the session supervisor and the capture handler, read by the HTTP surface.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Lifecycle phase of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    AwaitingPairing,
    Connected,
    /// Terminal until the account is paired again.
    LoggedOut,
}

/// Snapshot served by `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub state: ConnectionPhase,
    pub last_connection: Option<DateTime<Utc>>,
    pub total_messages_captured: u64,
    pub last_message_time: Option<DateTime<Utc>>,
    /// Renderable pairing image URL while awaiting a scan.
    pub qr_code: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    inner: RwLock<ConnectionStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ConnectionStatus {
        self.inner.read().await.clone()
    }

    pub async fn phase(&self) -> ConnectionPhase {
        self.inner.read().await.state
    }

    pub async fn set_awaiting_pairing(&self, qr_url: String) {
        let mut status = self.inner.write().await;
        status.qr_code = Some(qr_url);
        status.connected = false;
        status.state = ConnectionPhase::AwaitingPairing;
    }

    pub async fn set_connected(&self, at: DateTime<Utc>) {
        let mut status = self.inner.write().await;
        status.connected = true;
        status.state = ConnectionPhase::Connected;
        status.last_connection = Some(at);
        status.qr_code = None;
    }

    pub async fn set_disconnected(&self) {
        let mut status = self.inner.write().await;
        status.connected = false;
        status.state = ConnectionPhase::Disconnected;
    }

    pub async fn set_logged_out(&self) {
        let mut status = self.inner.write().await;
        status.connected = false;
        status.state = ConnectionPhase::LoggedOut;
    }

    /// Count one captured message.
    pub async fn record_capture(&self, at: DateTime<Utc>) {
        let mut status = self.inner.write().await;
        status.total_messages_captured += 1;
        status.last_message_time = Some(at);
    }
}
