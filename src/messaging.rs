/*!
 * # Messaging Gateway
 *
 * Transport abstraction for outbound supplier/staff messages. The engine
 * never speaks a provider protocol directly; it hands the dispatcher a
 * rendered message and an address, and the gateway reports success or
 * failure per attempt.
 */

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::entities::outbound_notification::Channel;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Provider rejected the message: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Reference assigned by the provider, when one is returned
    pub provider_ref: Option<String>,
}

/// An outbound message as handed to the transport.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub address: String,
    pub channel: Channel,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Messaging gateway trait for different transports.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<DeliveryResult, GatewayError>;
}

/// Gateway that logs instead of delivering; the default until a real
/// provider is wired in deployment configuration.
#[derive(Debug, Default)]
pub struct LoggingGateway;

#[async_trait]
impl MessagingGateway for LoggingGateway {
    async fn send(&self, message: OutboundMessage) -> Result<DeliveryResult, GatewayError> {
        info!(
            channel = message.channel.as_str(),
            address = %message.address,
            subject = %message.subject,
            "outbound message (logging gateway)"
        );
        Ok(DeliveryResult { provider_ref: None })
    }
}

/// In-memory recording gateway for tests: captures every message and can
/// be told to fail the next N attempts.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// The next `n` send attempts will fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }
}

#[async_trait]
impl MessagingGateway for InMemoryGateway {
    async fn send(&self, message: OutboundMessage) -> Result<DeliveryResult, GatewayError> {
        {
            let mut remaining = self.fail_next.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GatewayError::Transport("simulated failure".to_string()));
            }
        }
        self.sent.lock().unwrap().push(message);
        Ok(DeliveryResult {
            provider_ref: Some(format!("mem-{}", self.sent.lock().unwrap().len())),
        })
    }
}
