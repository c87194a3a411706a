//! Transport-independent provisioning facade.
//! Owns at most one session and forwards requests to it.

use std::sync::Arc;

use log::info;

use crate::config::AppConfig;
use crate::core::bluetooth::availability::AdapterAvailability;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::driver::DriverSnapshot;
use crate::core::bluetooth::errors::ProvisionError;
use crate::core::bluetooth::events::EventEmitter;
use crate::core::bluetooth::session::SessionHandle;
use crate::core::bluetooth::transport::GattTransport;
use crate::core::bluetooth::types::{ConnectionState, PeripheralRef};

pub struct Provisioner<T: GattTransport> {
    transport: Arc<T>,
    config: AppConfig,
    events: EventEmitter,
    session: Option<SessionHandle>,
}

impl<T: GattTransport> Provisioner<T> {
    pub fn new(transport: Arc<T>, config: AppConfig, events: EventEmitter) -> Self {
        Self {
            transport,
            config,
            events,
            session: None,
        }
    }

    /// Connects to `peripheral`, replacing any previous session.
    pub async fn connect(
        &mut self,
        peripheral: PeripheralRef,
        availability: &dyn AdapterAvailability,
    ) -> Result<(), ProvisionError> {
        availability.ensure_available().await?;
        self.disconnect().await;

        let connection = ConnectionManager::new(
            self.transport.clone(),
            self.config.ble.clone(),
            self.config.timeouts.clone(),
            self.events.clone(),
        );
        let (session, ready) = SessionHandle::spawn(
            connection,
            peripheral,
            self.config.ble.status_revision,
            self.config.timeouts.operation(),
            self.events.clone(),
        );
        // Stored before the link is up so that `disconnect` can abort the attempt.
        self.session = Some(session);

        match ready.await {
            Ok(Ok(())) => {
                if let Some(session) = &self.session {
                    info!("Connected to {}", session.peripheral().display_name());
                }
                Ok(())
            }
            Ok(Err(e)) => {
                self.disconnect().await;
                Err(e)
            }
            Err(_) => {
                self.disconnect().await;
                Err(ProvisionError::NotConnected)
            }
        }
    }

    /// Disconnects the current session, if any. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from {}", session.peripheral().display_name());
            session.disconnect().await;
        }
    }

    pub async fn request_start_provisioning(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<(), ProvisionError> {
        self.active()?.request_start_provisioning(ssid, password).await
    }

    pub async fn request_stop(&self) -> Result<(), ProvisionError> {
        self.active()?.request_stop().await
    }

    pub async fn request_status(&self) -> Result<(), ProvisionError> {
        self.active()?.request_status().await
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot, ProvisionError> {
        self.active()?.snapshot().await
    }

    /// Whether the peripheral last reported a running station
    pub async fn is_wifi_running(&self) -> bool {
        self.snapshot().await.is_ok_and(|s| s.wifi_running())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(|s| s.connection_state())
            .unwrap_or_default()
    }

    pub fn connected_peripheral(&self) -> Option<&PeripheralRef> {
        self.session
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.peripheral())
    }

    fn active(&self) -> Result<&SessionHandle, ProvisionError> {
        self.session
            .as_ref()
            .filter(|s| s.is_active())
            .ok_or(ProvisionError::NotConnected)
    }
}
