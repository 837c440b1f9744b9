use serde::{Deserialize, Serialize};

use super::mailing::{DeliveryStatus, Mailing};

pub const STATUS_MSG_TYPE: &str = "SMSMailingStatus";

/// Per-mailing counters pushed to dashboard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailingSummary {
    pub timestamp: i64,
    #[serde(rename = "SMSText")]
    pub sms_text: String,
    #[serde(rename = "mailingId")]
    pub mailing_id: String,
    #[serde(rename = "totalSMSAmount")]
    pub total_sms_amount: usize,
    #[serde(rename = "deliveredSMSAmount")]
    pub delivered_sms_amount: usize,
    #[serde(rename = "failedSMSAmount")]
    pub failed_sms_amount: usize,
}

impl From<&Mailing> for MailingSummary {
    fn from(mailing: &Mailing) -> Self {
        Self {
            timestamp: mailing.created_at.and_utc().timestamp(),
            sms_text: mailing.text.clone(),
            mailing_id: mailing.id.clone(),
            total_sms_amount: mailing.phones_count(),
            delivered_sms_amount: mailing.count(DeliveryStatus::Delivered),
            failed_sms_amount: mailing.count(DeliveryStatus::Failed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    #[serde(rename = "msgType")]
    pub msg_type: String,
    #[serde(rename = "SMSMailings")]
    pub sms_mailings: Vec<MailingSummary>,
}

impl StatusMessage {
    pub fn from_mailings(mailings: &[Mailing]) -> Self {
        Self {
            msg_type: STATUS_MSG_TYPE.to_string(),
            sms_mailings: mailings.iter().map(MailingSummary::from).collect(),
        }
    }
}
