use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::StoreError;
use crate::models::StatusMessage;
use crate::state::AppState;

/// Summary of every stored mailing, in insertion order.
pub fn snapshot(db: &Mutex<Connection>) -> Result<StatusMessage, StoreError> {
    let mailings = db::with_conn(db, queries::get_all_mailings)?;
    Ok(StatusMessage::from_mailings(&mailings))
}

/// Pushes a fresh snapshot to websocket subscribers, if there are any.
pub fn publish_snapshot(state: &Arc<AppState>) {
    match snapshot(&state.db) {
        Ok(message) => {
            // No receivers is fine
            let _ = state.status_tx.send(message);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to build mailing status snapshot");
        }
    }
}
