use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::db::{self, queries};
use crate::errors::StoreError;
use crate::models::{StatusMessage, StatusUpdate};
use crate::services::gateway::{map_vendor_status, SmsGateway};
use crate::services::status;
use crate::state::AppState;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Background task that polls the gateway for every pending recipient,
/// writes resolved statuses back and publishes a summary to subscribers.
/// One instance serves all websocket connections.
pub struct StatusReconciler {
    db: Arc<Mutex<Connection>>,
    gateway: Arc<dyn SmsGateway>,
    status_tx: broadcast::Sender<StatusMessage>,
    interval: Duration,
}

impl StatusReconciler {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        gateway: Arc<dyn SmsGateway>,
        status_tx: broadcast::Sender<StatusMessage>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            status_tx,
            interval,
        }
    }

    pub fn from_state(state: &Arc<AppState>) -> Self {
        Self::new(
            Arc::clone(&state.db),
            Arc::clone(&state.gateway),
            state.status_tx.clone(),
            state.config.poll_interval,
        )
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "status reconciler started");

        loop {
            ticker.tick().await;
            match self.reconcile_once().await {
                Ok(report) if report.polled > 0 => {
                    tracing::debug!(
                        polled = report.polled,
                        updated = report.updated,
                        failed = report.failed,
                        "reconciliation cycle finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "reconciliation cycle aborted");
                }
            }
        }
    }

    /// A single pass. A recipient whose status query fails is logged and
    /// left pending for the next pass; store errors abort the pass.
    pub async fn reconcile_once(&self) -> Result<CycleReport, StoreError> {
        let pending = db::with_conn(&self.db, queries::get_pending_entries)?;

        let mut report = CycleReport {
            polled: pending.len(),
            ..CycleReport::default()
        };
        let mut batch = Vec::new();

        for entry in &pending {
            match self.gateway.query_status(&entry.mailing_id, &entry.phone).await {
                Ok(code) => {
                    let status = map_vendor_status(code);
                    if status.is_terminal() {
                        batch.push(StatusUpdate::new(
                            entry.mailing_id.as_str(),
                            entry.phone.as_str(),
                            status,
                        ));
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        mailing_id = %entry.mailing_id,
                        phone = %entry.phone,
                        error = %e,
                        "status query failed, will retry next cycle"
                    );
                }
            }
        }

        if !batch.is_empty() {
            report.updated = db::with_conn(&self.db, |conn| queries::update_status_bulk(conn, &batch))?;
        }

        let message = status::snapshot(&self.db)?;
        // No receivers is fine
        let _ = self.status_tx.send(message);

        Ok(report)
    }
}
