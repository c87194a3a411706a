//! Error types of the provisioning stack.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Why a credential string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ValidationError {
    #[error("value is empty")]
    Empty,
    #[error("value is {len} bytes long, at most {max} are allowed")]
    TooLong { len: usize, max: usize },
    #[error("value contains non-ASCII characters")]
    NotAscii,
}

/// Which credential failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialField {
    Ssid,
    Password,
}

impl std::fmt::Display for CredentialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ssid => write!(f, "SSID"),
            Self::Password => write!(f, "password"),
        }
    }
}

/// GATT attribute that discovery could not find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeKind {
    Service,
    Characteristic,
    Descriptor,
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Characteristic => write!(f, "characteristic"),
            Self::Descriptor => write!(f, "descriptor"),
        }
    }
}

/// Errors raised by the BLE transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluest::Error),
    #[error("peripheral {0} is not known to the adapter")]
    UnknownPeripheral(String),
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("link is closed")]
    Closed,
    #[error("operation timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

/// Reason carried by a `Failed` connection event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    ConnectFailed,
    MissingAttribute(AttributeKind),
    OperationFailed,
    Timeout,
    LinkLost,
}

/// Errors surfaced to callers of the provisioning API
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid {field}: {source}")]
    InvalidCredential {
        field: CredentialField,
        #[source]
        source: ValidationError,
    },
    #[error("a command is already pending")]
    Busy,
    #[error("no peripheral is connected")]
    NotConnected,
    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("{0} not found on the peripheral")]
    MissingAttribute(AttributeKind),
    #[error("GATT operation failed: {0}")]
    OperationFailed(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl ProvisionError {
    /// The validation error behind this error, if any
    pub fn validation(&self) -> Option<ValidationError> {
        match self {
            Self::InvalidCredential { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// Reason reported in the `Failed` event for errors that end a session
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::ConnectFailed(_) => Some(FailureReason::ConnectFailed),
            Self::MissingAttribute(kind) => Some(FailureReason::MissingAttribute(*kind)),
            Self::OperationFailed(_) => Some(FailureReason::OperationFailed),
            Self::Timeout(_) => Some(FailureReason::Timeout),
            _ => None,
        }
    }
}
