use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{SendReceipt, SmsGateway};
use crate::config::SmscCredentials;
use crate::errors::GatewayError;
use crate::models::SmsMessage;

pub const SMSC_HOST: &str = "https://smsc.ru";
const SEND_PATH: &str = "/rest/send/";
const STATUS_PATH: &str = "/sys/status.php";
/// Ask the status endpoint for a JSON body.
const STATUS_FORMAT_JSON: &str = "3";

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<serde_json::Value>,
    cnt: Option<u32>,
    error: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<i32>,
    error: Option<String>,
    error_code: Option<i64>,
}

pub struct SmscGateway {
    credentials: SmscCredentials,
    host: String,
    client: reqwest::Client,
}

impl SmscGateway {
    pub fn new(credentials: SmscCredentials, host: String) -> Self {
        Self {
            credentials,
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

fn vendor_error(error_code: Option<i64>, error: Option<String>) -> Option<GatewayError> {
    match (error_code, error) {
        (Some(0), _) | (None, None) => None,
        (code, error) => Some(GatewayError::Vendor {
            code: code.unwrap_or(0),
            message: error.unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

#[async_trait]
impl SmsGateway for SmscGateway {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt, GatewayError> {
        let body = json!({
            "login": self.credentials.login,
            "psw": self.credentials.password,
            "phones": message.joined_phones(),
            "mes": message.text,
            "valid": message.valid_hours,
        });

        let resp = self.client.post(self.url(SEND_PATH)).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::HttpStatus(status.as_u16()));
        }

        let data: SendResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        tracing::info!(http_status = %status, response = ?data, "smsc send response");

        if let Some(err) = vendor_error(data.error_code, data.error) {
            return Err(err);
        }

        let vendor_id = match data.id {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            other => {
                return Err(GatewayError::Decode(format!("missing mailing id: {other:?}")));
            }
        };

        Ok(SendReceipt {
            vendor_id,
            accepted: data.cnt.unwrap_or(0),
        })
    }

    async fn query_status(&self, vendor_id: &str, phone: &str) -> Result<i32, GatewayError> {
        let resp = self
            .client
            .get(self.url(STATUS_PATH))
            .query(&[
                ("login", self.credentials.login.as_str()),
                ("psw", self.credentials.password.as_str()),
                ("phone", phone),
                ("id", vendor_id),
                ("fmt", STATUS_FORMAT_JSON),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::HttpStatus(status.as_u16()));
        }

        let data: StatusResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if let Some(err) = vendor_error(data.error_code, data.error) {
            return Err(err);
        }

        data.status
            .ok_or_else(|| GatewayError::Decode("missing status in response".to_string()))
    }
}
