use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("phone numbers must contain 10-11 digits, optionally prefixed with '+', separated by ';' or ','")]
    InvalidPhones,

    #[error("phone list is empty")]
    EmptyPhoneList,

    #[error("message text must be at least {min} characters long")]
    TextTooShort { min: usize },

    #[error("message validity must be between {min} and {max} hours, got '{got}'")]
    InvalidValidity { min: u8, max: u8, got: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("lost connection to SMS gateway: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SMS gateway returned HTTP {0}")]
    HttpStatus(u16),

    #[error("SMS gateway error {code}: {message}")]
    Vendor { code: i64, message: String },

    #[error("unexpected SMS gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("mailing {0} already exists")]
    DuplicateMailing(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("mailing store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("SMS mailing {vendor_id} was sent but could not be recorded: {source}")]
    Unrecorded { vendor_id: String, source: StoreError },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(StoreError::DuplicateMailing(_)) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unrecorded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "errorMessage": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
