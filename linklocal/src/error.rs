// Error types for link-local negotiation

use alloc::string::String;
use thiserror::Error;

/// Errors raised by the link-local negotiation and its transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkLocalError {
    #[error("Network link is down")]
    LinkDown,

    #[error("Raw channel already open")]
    ChannelBusy,

    #[error("Raw channel not open")]
    ChannelClosed,

    #[error("No frame data available")]
    NoData,

    #[error("Refusing to send an empty frame")]
    EmptyFrame,

    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Conflict table full")]
    ConflictTableFull,

    #[error("Failed to apply negotiated configuration: {0}")]
    ConfigApplyFailed(String),
}

impl LinkLocalError {
    pub fn driver_error(msg: &str) -> Self {
        LinkLocalError::DriverError(String::from(msg))
    }

    pub fn invalid_config(msg: &str) -> Self {
        LinkLocalError::InvalidConfig(String::from(msg))
    }

    pub fn apply_failed(msg: &str) -> Self {
        LinkLocalError::ConfigApplyFailed(String::from(msg))
    }
}
