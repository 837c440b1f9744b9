use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

/// One broadcast: a vendor-assigned id, the text and the fixed set of
/// recipients with their current delivery status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mailing {
    pub id: String,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub phones: BTreeMap<String, DeliveryStatus>,
}

impl Mailing {
    pub fn phones_count(&self) -> usize {
        self.phones.len()
    }

    pub fn count(&self, status: DeliveryStatus) -> usize {
        self.phones.values().filter(|s| **s == status).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub mailing_id: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub mailing_id: String,
    pub phone: String,
    pub status: DeliveryStatus,
}

impl StatusUpdate {
    pub fn new(mailing_id: impl Into<String>, phone: impl Into<String>, status: DeliveryStatus) -> Self {
        Self {
            mailing_id: mailing_id.into(),
            phone: phone.into(),
            status,
        }
    }
}
