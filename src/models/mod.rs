pub mod mailing;
pub mod message;
pub mod status;

pub use mailing::{DeliveryStatus, Mailing, PendingEntry, StatusUpdate};
pub use message::SmsMessage;
pub use status::{MailingSummary, StatusMessage};
