//! WhatsApp Integration
//!
//! [`SessionAdapter`](crate::session::SessionAdapter) backed by a WhatsApp
//! Web client. Pairing, encryption and transport live in `whatsapp-rust`;
//! this module only maps its events onto session events.

mod session;

pub use session::WhatsAppSession;
