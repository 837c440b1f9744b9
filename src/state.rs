use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::StatusMessage;
use crate::services::gateway::SmsGateway;

pub const STATUS_CHANNEL_CAPACITY: usize = 64;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub gateway: Arc<dyn SmsGateway>,
    pub status_tx: broadcast::Sender<StatusMessage>,
}
