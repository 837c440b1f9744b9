pub mod dispatch;
pub mod gateway;
pub mod phones;
pub mod reconciler;
pub mod status;
