//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;

use crate::core::bluetooth::errors::FailureReason;

/// Represents a discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRef {
    /// Platform-specific unique identifier for the device (especially important on macOS)
    pub id: String,
    /// The address of the device (MAC address on most platforms, "N/A" when the platform hides it)
    pub address: String,
    /// The advertised local name, if available
    pub name: Option<String>,
    /// The signal strength (RSSI) of the advertisement
    pub rssi: Option<i16>,
    /// Whether the advertisement listed the provisioning service
    pub advertises_service: bool,
}

impl PeripheralRef {
    /// Creates a new PeripheralRef instance
    pub fn new(
        id: String,
        address: String,
        name: Option<String>,
        rssi: Option<i16>,
        advertises_service: bool,
    ) -> Self {
        Self {
            id,
            address,
            name,
            rssi,
            advertises_service,
        }
    }

    /// Name for display, falling back to the address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Lifecycle of a single GATT connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    DiscoveringServices,
    SubscribingNotifications,
    Ready,
}

/// Connection-state events published to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionEvent {
    Disconnected,
    Connecting,
    DiscoveringServices,
    SubscribingNotifications,
    Ready,
    Failed(FailureReason),
}

impl From<ConnectionState> for ConnectionEvent {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::Disconnected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::DiscoveringServices => Self::DiscoveringServices,
            ConnectionState::SubscribingNotifications => Self::SubscribingNotifications,
            ConnectionState::Ready => Self::Ready,
        }
    }
}
