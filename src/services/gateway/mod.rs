pub mod fake;
pub mod smsc;

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::models::{DeliveryStatus, SmsMessage};

/// What the gateway hands back after accepting a mailing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub vendor_id: String,
    pub accepted: u32,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, GatewayError>;

    /// Raw vendor status code for one recipient of a mailing.
    async fn query_status(&self, vendor_id: &str, phone: &str) -> Result<i32, GatewayError>;
}

/// Maps smsc.ru status codes to local delivery states.
/// See https://smsc.ru/api/http/status_messages/statuses/
pub fn map_vendor_status(code: i32) -> DeliveryStatus {
    match code {
        1 | 2 | 4 => DeliveryStatus::Delivered,
        -1 | 0 => DeliveryStatus::Pending,
        _ => DeliveryStatus::Failed,
    }
}
