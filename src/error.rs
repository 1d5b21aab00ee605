use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Gateway rejected the request: {message}")]
    GatewayRejected {
        code: Option<String>,
        message: String,
        details: Value,
    },
    #[error("Order {0} already exists at the gateway")]
    DuplicateOrder(String),
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Unexpected gateway response: {0}")]
    GatewayProtocolError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Coarse classification of a [`PaymentError`].
///
/// Callers decide between retrying and aborting on this value, never on the
/// error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Rejected,
    Unavailable,
    Protocol,
    Configuration,
    Internal,
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::ValidationError(_) => ErrorKind::Validation,
            PaymentError::GatewayRejected { .. } | PaymentError::DuplicateOrder(_) => {
                ErrorKind::Rejected
            }
            PaymentError::GatewayUnavailable(_) => ErrorKind::Unavailable,
            PaymentError::GatewayProtocolError(_) => ErrorKind::Protocol,
            PaymentError::ConfigurationError(_) => ErrorKind::Configuration,
            PaymentError::IoError(_) => ErrorKind::Internal,
        }
    }

    /// Only transport-level failures are safe to retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// HTTP status code shared by every request adapter.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Rejected => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Protocol => 502,
            ErrorKind::Configuration | ErrorKind::Internal => 500,
        }
    }

    /// Structured details forwarded to the caller, when the gateway supplied any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            PaymentError::GatewayRejected { details, .. } if !details.is_null() => Some(details),
            _ => None,
        }
    }
}
