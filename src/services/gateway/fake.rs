use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;

use super::{SendReceipt, SmsGateway};
use crate::db::queries;
use crate::errors::{GatewayError, StoreError};
use crate::models::SmsMessage;

const FIRST_VENDOR_ID: u64 = 430;

/// In-process gateway for local runs and tests. Hands out sequential mailing
/// ids and answers status queries from a scripted table.
pub struct FakeGateway {
    next_id: AtomicU64,
    default_status: i32,
    statuses: Mutex<HashMap<String, i32>>,
    unreachable: Mutex<HashSet<String>>,
    send_error: Mutex<Option<(i64, String)>>,
    sent: Mutex<Vec<SmsMessage>>,
}

impl FakeGateway {
    pub fn new(default_status: i32) -> Self {
        Self {
            next_id: AtomicU64::new(FIRST_VENDOR_ID),
            default_status,
            statuses: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
            send_error: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose ids continue after the highest one already in the
    /// store, so restarts against a persistent store do not reuse ids.
    pub fn for_store(conn: &Connection, default_status: i32) -> Result<Self, StoreError> {
        let gateway = Self::new(default_status);
        if let Some(last) = queries::max_numeric_mailing_id(conn)? {
            gateway.next_id.fetch_max(last.saturating_add(1), Ordering::SeqCst);
        }
        Ok(gateway)
    }

    pub fn set_status(&self, phone: &str, code: i32) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(phone.to_string(), code);
        }
    }

    /// Status queries for `phone` fail until cleared.
    pub fn set_unreachable(&self, phone: &str, unreachable: bool) {
        if let Ok(mut set) = self.unreachable.lock() {
            if unreachable {
                set.insert(phone.to_string());
            } else {
                set.remove(phone);
            }
        }
    }

    pub fn fail_sends(&self, code: i64, message: &str) {
        if let Ok(mut err) = self.send_error.lock() {
            *err = Some((code, message.to_string()));
        }
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, GatewayError> {
        if let Some((code, msg)) = self.send_error.lock().ok().and_then(|e| e.clone()) {
            return Err(GatewayError::Vendor { code, message: msg });
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(vendor_id = id, phones = message.phones.len(), "fake gateway accepted mailing");

        Ok(SendReceipt {
            vendor_id: id.to_string(),
            accepted: message.phones.len() as u32,
        })
    }

    async fn query_status(&self, _vendor_id: &str, phone: &str) -> Result<i32, GatewayError> {
        let unreachable = self
            .unreachable
            .lock()
            .map(|set| set.contains(phone))
            .unwrap_or(false);
        if unreachable {
            return Err(GatewayError::HttpStatus(503));
        }

        Ok(self
            .statuses
            .lock()
            .ok()
            .and_then(|s| s.get(phone).copied())
            .unwrap_or(self.default_status))
    }
}
