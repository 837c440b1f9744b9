use crate::errors::GatewayError;
use crate::models::{DeliveryStatus, SmsMessage};
use crate::services::gateway::{map_vendor_status, SendReceipt, SmsGateway};

#[derive(Debug)]
pub struct RecipientStatus {
    pub phone: String,
    pub code: Result<i32, GatewayError>,
}

impl RecipientStatus {
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        self.code.as_ref().ok().map(|code| map_vendor_status(*code))
    }
}

#[derive(Debug)]
pub struct DispatchReport {
    pub receipt: SendReceipt,
    pub recipients: Vec<RecipientStatus>,
}

/// Sends one mailing and immediately asks the gateway where each recipient
/// stands. Nothing is persisted. A failed status query is kept in the
/// report rather than aborting the rest.
pub async fn send_and_check(
    gateway: &dyn SmsGateway,
    message: &SmsMessage,
) -> Result<DispatchReport, GatewayError> {
    let receipt = gateway.send(message).await?;
    tracing::info!(
        mailing_id = %receipt.vendor_id,
        accepted = receipt.accepted,
        "mailing accepted by gateway"
    );

    let mut recipients = Vec::with_capacity(message.phones.len());
    for phone in &message.phones {
        let code = gateway.query_status(&receipt.vendor_id, phone).await;
        if let Err(e) = &code {
            tracing::warn!(mailing_id = %receipt.vendor_id, phone = %phone, error = %e, "status query failed");
        }
        recipients.push(RecipientStatus {
            phone: phone.clone(),
            code,
        });
    }

    Ok(DispatchReport {
        receipt,
        recipients,
    })
}
