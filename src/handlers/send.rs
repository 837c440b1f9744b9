use std::sync::Arc;

use axum::extract::State;
use axum::{Form, Json};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::errors::{AppError, ValidationError};
use crate::models::message::parse_valid_hours;
use crate::models::{PendingEntry, SmsMessage};
use crate::services::phones::parse_phone_list;
use crate::services::status;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendForm {
    pub text: String,
    /// Overrides the phone list configured at startup.
    pub phones: Option<String>,
    /// Overrides the configured message lifetime, in hours.
    pub valid: Option<String>,
}

fn build_message(form: &SendForm, config: &AppConfig) -> Result<SmsMessage, ValidationError> {
    let phones = match form.phones.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => parse_phone_list(raw)?,
        None => config.phones.clone(),
    };
    let valid = match form.valid.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_valid_hours(raw)?,
        None => config.valid_hours,
    };
    SmsMessage::new(phones, &form.text, valid)
}

// POST /send/
pub async fn send_mailing(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SendForm>,
) -> Result<Json<Vec<PendingEntry>>, AppError> {
    let message = build_message(&form, &state.config).inspect_err(|e| {
        tracing::warn!(error = %e, "rejected send request");
    })?;

    let receipt = state.gateway.send(&message).await.inspect_err(|e| {
        tracing::error!(error = %e, "gateway refused mailing");
    })?;

    tracing::info!(
        mailing_id = %receipt.vendor_id,
        accepted = receipt.accepted,
        phones = message.phones.len(),
        "mailing accepted by gateway"
    );

    db::with_conn(&state.db, |conn| {
        queries::add_mailing(conn, &receipt.vendor_id, &message.phones, &message.text)
    })
    .map_err(|source| {
        tracing::error!(
            mailing_id = %receipt.vendor_id,
            error = %source,
            "mailing sent but not recorded"
        );
        AppError::Unrecorded {
            vendor_id: receipt.vendor_id.clone(),
            source,
        }
    })?;

    let pending = db::with_conn(&state.db, queries::get_pending_entries)?;

    tracing::debug!(pending = pending.len(), "recipients awaiting delivery status");

    status::publish_snapshot(&state);

    Ok(Json(pending))
}
