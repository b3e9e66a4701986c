//! Outbound messaging transport.

pub mod whatsapp;

pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};

use async_trait::async_trait;

use crate::error::ChannelError;

/// A channel able to deliver text to an address.
///
/// The core only consumes this: the webhook handler calls it after the
/// router produces a reply. Send failures are logged, never fatal.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, to: &str, text: &str) -> Result<(), ChannelError>;
}
