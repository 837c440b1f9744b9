use std::env;
use std::fmt;
use std::time::Duration;

use crate::services::gateway::smsc::SMSC_HOST;

#[derive(Clone)]
pub struct SmscCredentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for SmscCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmscCredentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub smsc: SmscCredentials,
    pub smsc_host: String,
    /// Message lifetime in hours handed to the gateway.
    pub valid_hours: i64,
    /// Default recipients for `POST /send/`.
    pub phones: Vec<String>,
    pub poll_interval: Duration,
    pub fake_gateway: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "mailings.db".to_string()),
            smsc: SmscCredentials {
                login: env::var("SMSC_LOGIN").unwrap_or_default(),
                password: env::var("SMSC_PSW").unwrap_or_default(),
            },
            smsc_host: env::var("SMSC_HOST").unwrap_or_else(|_| SMSC_HOST.to_string()),
            valid_hours: env::var("SMSC_VALID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            phones: Vec::new(),
            poll_interval: Duration::from_secs(
                env::var("SMSC_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(5),
            ),
            fake_gateway: false,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
