//! Bluetooth connection handling for the provisioning peripheral
//! This module takes a link from `Disconnected` to `Ready`: connect, discover
//! the Wi-Fi characteristic, read the initial status and enable notifications.
//! Any failure along the way tears the link down again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};

use crate::config::ble_config::BleConfig;
use crate::config::timeout_config::TimeoutConfig;
use crate::core::bluetooth::errors::{AttributeKind, ProvisionError, TransportError};
use crate::core::bluetooth::events::EventEmitter;
use crate::core::bluetooth::transport::{GattAttribute, GattTransport};
use crate::core::bluetooth::types::{ConnectionEvent, ConnectionState, PeripheralRef};

/// A link that reached `Ready`
pub struct GattSession<A: GattAttribute> {
    pub peripheral: PeripheralRef,
    /// The Wi-Fi command/status characteristic
    pub characteristic: A,
    /// Notification payloads; closes when the link goes away
    pub notifications: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Value returned by the read issued right after discovery
    pub initial_value: Vec<u8>,
}

/// Connection manager for one peripheral
pub struct ConnectionManager<T: GattTransport> {
    transport: Arc<T>,
    ble: BleConfig,
    timeouts: TimeoutConfig,
    events: EventEmitter,
    state: watch::Sender<ConnectionState>,
    peripheral: Option<PeripheralRef>,
}

impl<T: GattTransport> ConnectionManager<T> {
    pub fn new(
        transport: Arc<T>,
        ble: BleConfig,
        timeouts: TimeoutConfig,
        events: EventEmitter,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            ble,
            timeouts,
            events,
            state,
            peripheral: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connects to the peripheral and brings the link to `Ready`.
    pub async fn connect(
        &mut self,
        peripheral: PeripheralRef,
    ) -> Result<GattSession<T::Attribute>, ProvisionError> {
        if self.state() != ConnectionState::Disconnected {
            warn!("Connect requested while {:?}, dropping the old link first", self.state());
            self.disconnect().await;
        }

        info!(
            "Device details - ID: {}, Name: {:?}, Address: {}",
            peripheral.id, peripheral.name, peripheral.address
        );
        self.peripheral = Some(peripheral.clone());
        self.transition(ConnectionState::Connecting);

        let transport = self.transport.clone();
        let connected = bounded(
            self.timeouts.connect(),
            "connect",
            transport.connect(&peripheral),
        )
        .await;
        if let Err(e) = connected {
            return Err(self.fail(to_connect_error(e)).await);
        }

        info!("Connection successful, discovering services...");
        self.transition(ConnectionState::DiscoveringServices);
        let discovered = bounded(
            self.timeouts.connect(),
            "service discovery",
            transport.discover(&peripheral, self.ble.service_uuid, self.ble.characteristic_uuid),
        )
        .await;
        let characteristic = match discovered {
            Ok(characteristic) => characteristic,
            Err(e) => return Err(self.fail(to_discovery_error(e)).await),
        };

        let initial_value = match bounded(
            self.timeouts.operation(),
            "initial read",
            characteristic.read(),
        )
        .await
        {
            Ok(value) => value,
            Err(e) => return Err(self.fail(to_operation_error("initial read", e)).await),
        };
        debug!("Initial characteristic value: {:?}", initial_value);

        self.transition(ConnectionState::SubscribingNotifications);
        let has_cccd = bounded(
            self.timeouts.operation(),
            "descriptor discovery",
            characteristic.has_descriptor(self.ble.cccd_uuid),
        )
        .await;
        match has_cccd {
            Ok(true) => {}
            Ok(false) => {
                warn!("Descriptor {} not found", self.ble.cccd_uuid);
                return Err(self.fail(ProvisionError::MissingAttribute(AttributeKind::Descriptor)).await);
            }
            Err(e) => return Err(self.fail(to_operation_error("descriptor discovery", e)).await),
        }

        let notifications = match bounded(
            self.timeouts.operation(),
            "notification subscription",
            characteristic.subscribe(),
        )
        .await
        {
            Ok(notifications) => notifications,
            Err(e) => {
                return Err(self.fail(to_operation_error("notification subscription", e)).await);
            }
        };

        self.transition(ConnectionState::Ready);
        info!("Connection and setup process completed successfully");

        Ok(GattSession {
            peripheral,
            characteristic,
            notifications,
            initial_value,
        })
    }

    /// Drops the link. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.state() == ConnectionState::Disconnected && self.peripheral.is_none() {
            debug!("Already disconnected");
            return;
        }

        if let Some(peripheral) = self.peripheral.take() {
            let result = bounded(
                self.timeouts.connect(),
                "disconnect",
                self.transport.disconnect(&peripheral),
            )
            .await;
            if let Err(e) = result {
                warn!("Failed to disconnect from {}: {}", peripheral.id, e);
            }
        }
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Connection state: {:?} -> {:?}", previous, next);
        }
        self.events.connection(ConnectionEvent::from(next));
    }

    async fn fail(&mut self, error: ProvisionError) -> ProvisionError {
        warn!("Connection failed: {}", error);
        if let Some(reason) = error.failure_reason() {
            self.events.connection(ConnectionEvent::Failed(reason));
        }
        self.disconnect().await;
        error
    }
}

/// Result of a bounded transport step
enum StepError {
    Transport(TransportError),
    Elapsed(&'static str),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{}", e),
            Self::Elapsed(step) => write!(f, "{} timed out", step),
        }
    }
}

async fn bounded<F, V>(limit: Duration, step: &'static str, fut: F) -> Result<V, StepError>
where
    F: Future<Output = Result<V, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StepError::Transport),
        Err(_) => Err(StepError::Elapsed(step)),
    }
}

fn to_connect_error(e: StepError) -> ProvisionError {
    match e {
        StepError::Elapsed(step) => ProvisionError::Timeout(step),
        StepError::Transport(e) => ProvisionError::ConnectFailed(e.to_string()),
    }
}

fn to_discovery_error(e: StepError) -> ProvisionError {
    match e {
        StepError::Elapsed(step) => ProvisionError::Timeout(step),
        StepError::Transport(TransportError::ServiceNotFound(_)) => {
            ProvisionError::MissingAttribute(AttributeKind::Service)
        }
        StepError::Transport(TransportError::CharacteristicNotFound(_)) => {
            ProvisionError::MissingAttribute(AttributeKind::Characteristic)
        }
        StepError::Transport(e) => ProvisionError::OperationFailed(e.to_string()),
    }
}

fn to_operation_error(step: &str, e: StepError) -> ProvisionError {
    match e {
        StepError::Elapsed(step) => ProvisionError::Timeout(step),
        StepError::Transport(e) => ProvisionError::OperationFailed(format!("{}: {}", step, e)),
    }
}
