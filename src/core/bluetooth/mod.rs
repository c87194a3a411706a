//! Bluetooth functionality for Wi-Fi provisioning
//! This module handles all bluetooth operations including scanning,
//! connecting, and driving the provisioning command chain on the peripheral.

mod availability;
mod commands;
mod connection;
pub mod constants;
mod credentials;
mod driver;
mod errors;
mod events;
mod manager;
mod notification;
mod provisioner;
mod scanner;
mod session;
mod status;
mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use availability::{AdapterAvailability, AlwaysAvailable, BluestAvailability};
pub use commands::Command;
pub use connection::{ConnectionManager, GattSession};
pub use credentials::{validate, Credential, Credentials};
pub use driver::{CommandLink, DriverPhase, DriverSnapshot, ProtocolDriver};
pub use errors::{
    AttributeKind, CredentialField, FailureReason, ProvisionError, TransportError, ValidationError,
};
pub use events::{EventEmitter, EventReceiver, ProvisionerEvent};
pub use manager::ProvisioningManager;
pub use notification::NotificationHandler;
pub use provisioner::Provisioner;
pub use scanner::{advertises_service, extract_mac_address, BluetoothScanner};
pub use session::{SessionHandle, SessionReady};
pub use status::{decode_status, decode_status_with, StatusReport, StatusRevision};
pub use transport::{BluestAttribute, BluestTransport, GattAttribute, GattTransport};
pub use types::{ConnectionEvent, ConnectionState, PeripheralRef};
